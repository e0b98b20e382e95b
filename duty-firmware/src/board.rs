//! Board constants and concrete hardware types
//!
//! Values come from board.toml through build.rs. Pin assignments are fixed
//! for the Raspberry Pi Pico layout:
//!
//! - UART0: GPIO16 (TX), GPIO17 (RX)
//! - Factory reset input: GPIO0, active high
//! - Status LED: GPIO25
//!
//! `main` reserves the UART and reset pins from the peripherals it hands
//! out, so they cannot be provisioned as outputs whatever board.toml says.

use duty_core::command::BoardInfo;
use duty_core::config::MAX_PORTS;
use duty_core::Controller;
use duty_hal_rp2040::flash::Rp2040FlashStorage;
use duty_hal_rp2040::pwm::Rp2040Pwm;

include!(concat!(env!("OUT_DIR"), "/board_config.rs"));

/// Capabilities reported by `board-info`
pub const BOARD_INFO: BoardInfo = BoardInfo {
    max_ports: MAX_PORTS,
    board_name: BOARD_NAME,
};

/// Controller bound to the RP2040 drivers
pub type BoardController = Controller<Rp2040FlashStorage<'static>, Rp2040Pwm<'static>>;
