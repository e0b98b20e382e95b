//! Line-oriented UART transport
//!
//! Requests arrive as newline-terminated lines; responses are written back
//! the same way.

use defmt::*;
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx};
use embassy_time::{with_timeout, Duration};
use embedded_io_async::{Read, Write};

use duty_core::command::Response;
use duty_protocol::{Line, LineBuffer, LineError, MAX_LINE_LEN};

/// Bytes pulled from the UART per read
const RX_CHUNK: usize = 64;

/// Encoded response capacity
const TX_BUF_SIZE: usize = MAX_LINE_LEN;

/// Splits the receive stream into request lines
pub struct LineReader {
    rx: BufferedUartRx,
    framer: LineBuffer,
    chunk: [u8; RX_CHUNK],
    start: usize,
    end: usize,
}

impl LineReader {
    pub fn new(rx: BufferedUartRx) -> Self {
        Self {
            rx,
            framer: LineBuffer::new(),
            chunk: [0; RX_CHUNK],
            start: 0,
            end: 0,
        }
    }

    /// Next complete line, waiting at most `wait` for more bytes
    ///
    /// Returns `None` when no line completed in time. Bytes already read
    /// but not yet framed are kept for the next call.
    pub async fn next_line(&mut self, wait: Duration) -> Option<Result<Line, LineError>> {
        loop {
            while self.start < self.end {
                let byte = self.chunk[self.start];
                self.start += 1;
                match self.framer.feed(byte) {
                    Ok(Some(line)) => return Some(Ok(line)),
                    Ok(None) => {}
                    Err(e) => return Some(Err(e)),
                }
            }

            match with_timeout(wait, self.rx.read(&mut self.chunk)).await {
                Ok(Ok(n)) if n > 0 => {
                    trace!("RX: {} bytes", n);
                    self.start = 0;
                    self.end = n;
                }
                Ok(Ok(_)) => return None,
                Ok(Err(e)) => {
                    warn!("UART read error: {:?}", e);
                    return None;
                }
                Err(_) => return None,
            }
        }
    }
}

/// Encodes and sends response lines
pub struct ResponseWriter {
    tx: BufferedUartTx,
    buf: [u8; TX_BUF_SIZE],
}

impl ResponseWriter {
    pub fn new(tx: BufferedUartTx) -> Self {
        Self {
            tx,
            buf: [0; TX_BUF_SIZE],
        }
    }

    /// Write one response line
    pub async fn send(&mut self, response: &Response) {
        let len = match response.encode(&mut self.buf) {
            Ok(len) => len,
            Err(e) => {
                error!("Response does not fit the TX buffer: {:?}", e);
                return;
            }
        };
        if let Err(e) = self.tx.write_all(&self.buf[..len]).await {
            warn!("UART write error: {:?}", e);
        }
    }

    /// Wait until everything written has left the UART
    pub async fn flush(&mut self) {
        if let Err(e) = self.tx.flush().await {
            warn!("UART flush error: {:?}", e);
        }
    }
}
