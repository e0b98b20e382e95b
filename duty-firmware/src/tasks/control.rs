//! Control loop task
//!
//! Owns the controller and the UART. One iteration applies the live values
//! to the outputs and waits briefly for a request line. A line that arrives
//! is handled to completion before the next iteration starts.
//!
//! Requests that persist configuration block here for the duration of the
//! flash write; outputs are not refreshed until it completes.

use defmt::*;
use embassy_time::Duration;

use duty_core::command::Response;
use duty_core::output::ProvisionReport;
use duty_core::Handled;
use duty_protocol::{messages, LineError, ResponseCode};

use crate::board::{BoardController, LOOP_POLL_MS};
use crate::serial::{LineReader, ResponseWriter};

#[embassy_executor::task]
pub async fn control_task(
    mut controller: BoardController,
    mut reader: LineReader,
    mut writer: ResponseWriter,
) {
    info!("Control task started");

    let poll = Duration::from_millis(LOOP_POLL_MS);

    loop {
        let written = controller.apply_outputs();
        if written > 0 {
            trace!("Updated {} outputs", written);
        }

        let line = match reader.next_line(poll).await {
            Some(Ok(line)) => line,
            Some(Err(LineError::Overflow)) => {
                warn!("Request line too long, discarded");
                writer.send(&Response::error(messages::BAD_JSON)).await;
                continue;
            }
            None => continue,
        };

        let handled = controller.handle_line(&line).await;
        log_handled(&handled);
        writer.send(&handled.response).await;
    }
}

fn log_handled(handled: &Handled) {
    match handled.request {
        Ok(verb) if handled.fallback => debug!("Unknown verb, answered as {:?}", verb),
        Ok(verb) => debug!("Request {:?}", verb),
        Err(e) => warn!("Rejected request line: {:?}", e),
    }

    if let Some(Err(e)) = &handled.persisted {
        warn!("Configuration not saved: {:?}", e);
    }

    if let Some(report) = &handled.provision {
        log_provision(report);
    }

    if handled.response.code() == ResponseCode::Err {
        debug!("Request rejected");
    }
}

/// Log what a provisioning pass did, warning about ports left undriven
pub fn log_provision(report: &ProvisionReport) {
    info!("Provisioned {} outputs", report.provisioned);
    if report.truncated > 0 {
        warn!("{} ports beyond the channel limit ignored", report.truncated);
    }
    for (port, reason) in report.rejected.iter() {
        warn!("GPIO{} not driven: {:?}", port, reason);
    }
}
