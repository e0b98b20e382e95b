//! Build script for duty-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates board.toml at compile time
//! - Generates `board_config.rs` with the board constants

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Highest GPIO number on the RP2040
const MAX_GPIO: i64 = 29;

/// Longest watchdog period the RP2040 supports
const MAX_WATCHDOG_MS: i64 = 8_388;

/// Extra reserved pins board.toml may list
///
/// The driver holds eight; the UART and reset input pins take three.
const MAX_EXTRA_RESERVED: usize = 5;

/// Validated contents of board.toml
struct Board {
    name: String,
    baudrate: u32,
    loop_poll_ms: u64,
    watchdog_ms: u64,
    blink_ms: u64,
    pwm_divider: u8,
    reserved_pins: Vec<u8>,
}

fn main() {
    setup_linker();
    let board = validate_board();
    generate_board_config(&board);
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");

    // Linker scripts for cortex-m-rt and defmt
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    if env::var_os("CARGO_FEATURE_DEFMT").is_some() {
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
}

/// Print a boxed error report and abort the build
fn fail(title: &str, errors: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Look up `section.key` as an integer within `range`
fn integer(
    config: &toml::Value,
    section: &str,
    key: &str,
    range: std::ops::RangeInclusive<i64>,
    errors: &mut Vec<String>,
) -> i64 {
    match config.get(section).and_then(|s| s.get(key)) {
        Some(toml::Value::Integer(v)) if range.contains(v) => *v,
        Some(toml::Value::Integer(_)) => {
            errors.push(format!(
                "[{}] {} must be {}-{}",
                section,
                key,
                range.start(),
                range.end()
            ));
            *range.start()
        }
        Some(_) => {
            errors.push(format!("[{}] {} must be an integer", section, key));
            *range.start()
        }
        None => {
            errors.push(format!("[{}] missing '{}'", section, key));
            *range.start()
        }
    }
}

/// Validate board.toml and extract its values
fn validate_board() -> Board {
    println!("cargo:rerun-if-changed=board.toml");

    let path = Path::new("board.toml");
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => fail("Failed to read board.toml", &[e.to_string()]),
    };

    let config: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            let lines: Vec<String> = e
                .to_string()
                .lines()
                .map(|line| line.chars().take(60).collect())
                .collect();
            fail("Invalid TOML syntax in board.toml", &lines)
        }
    };

    let mut errors = Vec::new();

    let name = match config.get("board").and_then(|b| b.get("name")) {
        Some(toml::Value::String(name)) if !name.is_empty() && name.len() <= 32 => name.clone(),
        Some(toml::Value::String(_)) => {
            errors.push("[board] name must be 1-32 characters".to_string());
            String::new()
        }
        _ => {
            errors.push("[board] missing 'name'".to_string());
            String::new()
        }
    };

    let baudrate = integer(&config, "serial", "baudrate", 1_200..=921_600, &mut errors);
    let loop_poll_ms = integer(&config, "timing", "loop_poll_ms", 1..=1_000, &mut errors);
    let watchdog_ms = integer(&config, "timing", "watchdog_ms", 1..=MAX_WATCHDOG_MS, &mut errors);
    let blink_ms = integer(&config, "timing", "blink_ms", 1..=1_000, &mut errors);
    let pwm_divider = integer(&config, "pwm", "divider", 1..=255, &mut errors);

    if blink_ms >= watchdog_ms {
        errors.push("[timing] blink_ms must be shorter than watchdog_ms".to_string());
    }

    let mut reserved_pins = Vec::new();
    match config.get("pwm").and_then(|p| p.get("reserved_pins")) {
        Some(toml::Value::Array(pins)) => {
            if pins.len() > MAX_EXTRA_RESERVED {
                errors.push(format!("[pwm] at most {} reserved_pins", MAX_EXTRA_RESERVED));
            }
            for pin in pins {
                match pin {
                    toml::Value::Integer(p) if (0..=MAX_GPIO).contains(p) => {
                        reserved_pins.push(*p as u8)
                    }
                    _ => errors.push(format!("[pwm] reserved pin {} is not a GPIO 0-29", pin)),
                }
            }
        }
        Some(_) => errors.push("[pwm] reserved_pins must be an array".to_string()),
        None => {}
    }

    if !errors.is_empty() {
        fail("Invalid board configuration", &errors);
    }

    println!("cargo:warning=board.toml validated successfully");

    Board {
        name,
        baudrate: baudrate as u32,
        loop_poll_ms: loop_poll_ms as u64,
        watchdog_ms: watchdog_ms as u64,
        blink_ms: blink_ms as u64,
        pwm_divider: pwm_divider as u8,
        reserved_pins,
    }
}

/// Write the board constants to `$OUT_DIR/board_config.rs`
fn generate_board_config(board: &Board) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let pins = board
        .reserved_pins
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let source = format!(
        "// Generated from board.toml by build.rs\n\
         pub const BOARD_NAME: &str = {:?};\n\
         pub const UART_BAUDRATE: u32 = {};\n\
         pub const LOOP_POLL_MS: u64 = {};\n\
         pub const WATCHDOG_MS: u64 = {};\n\
         pub const BLINK_MS: u64 = {};\n\
         pub const PWM_DIVIDER: u8 = {};\n\
         pub const EXTRA_RESERVED_PINS: [u8; {}] = [{}];\n",
        board.name,
        board.baudrate,
        board.loop_poll_ms,
        board.watchdog_ms,
        board.blink_ms,
        board.pwm_divider,
        board.reserved_pins.len(),
        pins,
    );

    fs::write(out_dir.join("board_config.rs"), source).unwrap();
}
