//! Line framing for the serial transport.
//!
//! Line format:
//! - payload bytes (at most [`MAX_LINE_LEN`])
//! - optional `\r`
//! - `\n` terminator
//!
//! Blank lines are skipped. A line that does not fit is reported once and
//! then discarded up to its terminator, so the next line starts clean.

use heapless::Vec;

/// Line terminator
pub const LINE_END: u8 = b'\n';

/// Maximum line length in bytes, excluding the terminator
pub const MAX_LINE_LEN: usize = 512;

/// A complete received line, without its terminator
pub type Line = Vec<u8, MAX_LINE_LEN>;

/// Errors that can occur while assembling lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    /// Line exceeded [`MAX_LINE_LEN`] and is being discarded
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    /// Collecting payload bytes
    Collecting,
    /// Dropping the remainder of an oversized line
    Discarding,
}

/// State machine assembling bytes into lines
#[derive(Debug, Clone)]
pub struct LineBuffer {
    state: LineState,
    buffer: Line,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    /// Create an empty line buffer
    pub const fn new() -> Self {
        Self {
            state: LineState::Collecting,
            buffer: Vec::new(),
        }
    }

    /// Drop any partially received line
    pub fn reset(&mut self) {
        self.state = LineState::Collecting;
        self.buffer.clear();
    }

    /// Number of bytes buffered for the current line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feed a single byte
    ///
    /// Returns `Ok(Some(line))` when a terminator completes a non-blank
    /// line, `Ok(None)` when more bytes are needed, or
    /// `Err(LineError::Overflow)` on the byte that overflowed the buffer.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Line>, LineError> {
        match self.state {
            LineState::Discarding => {
                if byte == LINE_END {
                    self.reset();
                }
                Ok(None)
            }
            LineState::Collecting => {
                if byte == LINE_END {
                    if self.buffer.last() == Some(&b'\r') {
                        self.buffer.pop();
                    }
                    if self.buffer.iter().all(u8::is_ascii_whitespace) {
                        self.buffer.clear();
                        return Ok(None);
                    }
                    let line = self.buffer.clone();
                    self.buffer.clear();
                    return Ok(Some(line));
                }

                if self.buffer.push(byte).is_err() {
                    self.buffer.clear();
                    self.state = LineState::Discarding;
                    return Err(LineError::Overflow);
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed_all(buffer: &mut LineBuffer, bytes: &[u8]) -> std::vec::Vec<Result<Line, LineError>> {
        bytes
            .iter()
            .filter_map(|&b| buffer.feed(b).transpose())
            .collect()
    }

    #[test]
    fn test_single_line() {
        let mut buffer = LineBuffer::new();
        let lines = feed_all(&mut buffer, b"[\"ping\"]\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_ref().unwrap().as_slice(), b"[\"ping\"]");
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut buffer = LineBuffer::new();
        let lines = feed_all(&mut buffer, b"[\"ping\"]\r\n");
        assert_eq!(lines[0].as_ref().unwrap().as_slice(), b"[\"ping\"]");
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut buffer = LineBuffer::new();
        let lines = feed_all(&mut buffer, b"\n\r\n  \n[\"get-value\"]\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_ref().unwrap().as_slice(), b"[\"get-value\"]");
    }

    #[test]
    fn test_partial_line_waits() {
        let mut buffer = LineBuffer::new();
        assert!(feed_all(&mut buffer, b"[\"pi").is_empty());
        assert_eq!(buffer.pending(), 4);
        let lines = feed_all(&mut buffer, b"ng\"]\n");
        assert_eq!(lines[0].as_ref().unwrap().as_slice(), b"[\"ping\"]");
    }

    #[test]
    fn test_overflow_reported_once_then_recovers() {
        let mut buffer = LineBuffer::new();
        let mut data = std::vec![b'x'; MAX_LINE_LEN + 40];
        data.push(b'\n');
        data.extend_from_slice(b"[\"ping\"]\n");

        let results = feed_all(&mut buffer, &data);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], Err(LineError::Overflow));
        assert_eq!(results[1].as_ref().unwrap().as_slice(), b"[\"ping\"]");
    }

    #[test]
    fn test_line_at_capacity_is_accepted() {
        let mut buffer = LineBuffer::new();
        let mut data = std::vec![b'a'; MAX_LINE_LEN];
        data.push(b'\n');
        let results = feed_all(&mut buffer, &data);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap().len(), MAX_LINE_LEN);
    }

    #[test]
    fn test_reset_drops_partial_line() {
        let mut buffer = LineBuffer::new();
        feed_all(&mut buffer, b"garbage");
        buffer.reset();
        let lines = feed_all(&mut buffer, b"[\"ping\"]\n");
        assert_eq!(lines[0].as_ref().unwrap().as_slice(), b"[\"ping\"]");
    }

    proptest! {
        #[test]
        fn prop_lines_never_contain_terminator(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let mut buffer = LineBuffer::new();
            for line in feed_all(&mut buffer, &bytes).into_iter().flatten() {
                prop_assert!(!line.contains(&LINE_END));
                prop_assert!(line.len() <= MAX_LINE_LEN);
                prop_assert!(!line.is_empty());
            }
        }
    }
}
