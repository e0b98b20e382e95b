//! Duty - serial-controlled PWM output firmware
//!
//! A host sends JSON requests over UART0 to configure which GPIOs carry a
//! PWM output and what duty each output runs at. The port layout and
//! default values are kept in flash across power cycles.
//!
//! Boot sequence:
//! 1. Report a preceding watchdog reset
//! 2. Factory reset if GPIO0 is held high (never after a watchdog reset)
//! 3. Mount storage, load the configuration, provision the outputs
//! 4. Hand everything to the control task

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pin, Pull};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_rp::watchdog::{ResetReason, Watchdog};
use embassy_time::{Duration, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use duty_core::command::Response;
use duty_core::config::{BootReport, ConfigSource, MountStatus};
use duty_core::Controller;
use duty_hal_rp2040::flash::Rp2040FlashStorage;
use duty_hal_rp2040::pwm::{PwmSlices, Rp2040Pwm};
use duty_protocol::messages;

use crate::board::{BoardController, BLINK_MS, BOARD_INFO, EXTRA_RESERVED_PINS, PWM_DIVIDER};
use crate::serial::{LineReader, ResponseWriter};

mod board;
mod serial;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 512]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 512]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Duty firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let watchdog = Watchdog::new(p.WATCHDOG);

    // UART and reset input pins never carry PWM
    let fixed_pins = [p.PIN_16.pin(), p.PIN_17.pin(), p.PIN_0.pin()];
    let after_watchdog = matches!(watchdog.reset_reason(), Some(ResetReason::TimedOut));

    // Setup UART0 for the host link
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = board::UART_BAUDRATE;

    let tx_buf = TX_BUF.init([0u8; 512]);
    let rx_buf = RX_BUF.init([0u8; 512]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_16, p.PIN_17, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();
    let mut writer = ResponseWriter::new(tx);
    let reader = LineReader::new(rx);
    info!("UART initialized at {} baud", board::UART_BAUDRATE);

    if after_watchdog {
        info!("Previous reset was caused by the watchdog");
        writer.send(&Response::info(messages::AFTER_HW_RESET)).await;
    }

    let storage = Rp2040FlashStorage::new(p.FLASH, p.DMA_CH0);
    let slices = PwmSlices {
        slice0: p.PWM_SLICE0,
        slice1: p.PWM_SLICE1,
        slice2: p.PWM_SLICE2,
        slice3: p.PWM_SLICE3,
        slice4: p.PWM_SLICE4,
        slice5: p.PWM_SLICE5,
        slice6: p.PWM_SLICE6,
        slice7: p.PWM_SLICE7,
    };
    let reserved = fixed_pins.into_iter().chain(EXTRA_RESERVED_PINS);
    let pwm = Rp2040Pwm::new(slices, reserved, PWM_DIVIDER);
    let mut controller: BoardController = Controller::new(storage, pwm, BOARD_INFO);

    // Maintenance input is only honoured on a cold boot so a held button
    // cannot loop through factory resets
    if !after_watchdog {
        let reset_pin = Input::new(p.PIN_0, Pull::Down);
        Timer::after_micros(100).await;
        if reset_pin.is_high() {
            let led = Output::new(p.PIN_25, Level::Low);
            factory_reset(&mut controller, &mut writer, watchdog, led).await;
        }
    }

    let (boot, provision) = controller.boot().await;
    report_boot(&boot, &mut writer).await;
    tasks::control::log_provision(&provision);
    info!(
        "Configuration: {} ports, update time {} ms",
        controller.config().len(),
        controller.config().update_time()
    );

    spawner.spawn(tasks::control_task(controller, reader, writer)).unwrap();
    info!("Control task spawned, firmware running");
}

/// Wipe storage and wait for the watchdog to reboot the chip
///
/// Never returns. The LED blinks until the unfed watchdog fires.
async fn factory_reset(
    controller: &mut BoardController,
    writer: &mut ResponseWriter,
    mut watchdog: Watchdog,
    mut led: Output<'static>,
) -> ! {
    warn!("Factory reset requested, wiping configuration");

    match controller.wipe().await {
        Ok(()) => {
            info!("Storage wiped");
            writer.send(&Response::info(messages::CLEAR_OK)).await;
        }
        Err(e) => error!("Storage wipe failed: {:?}", e),
    }
    writer.flush().await;

    watchdog.start(Duration::from_millis(board::WATCHDOG_MS));
    loop {
        led.toggle();
        Timer::after_millis(BLINK_MS).await;
    }
}

/// Log the boot report and forward it to the host
async fn report_boot(boot: &BootReport, writer: &mut ResponseWriter) {
    match boot.mount {
        MountStatus::Mounted => debug!("Storage mounted"),
        MountStatus::Formatted => {
            warn!("Storage was unreadable and has been formatted");
            writer.send(&Response::info(messages::STORAGE_FORMATTED)).await;
        }
        MountStatus::Unavailable(e) => {
            error!("Storage unavailable after formatting: {:?}", e);
            writer.send(&Response::info(messages::STORAGE_UNAVAILABLE)).await;
        }
    }

    match boot.source {
        ConfigSource::Flash => info!("Loaded configuration from flash"),
        ConfigSource::Defaults(reason) => {
            info!("No usable stored configuration ({:?}), using defaults", reason);
            writer
                .send(&Response::info(messages::LOADING_DEFAULT_CONFIG))
                .await;
        }
    }
}
