//! Runtime-routed PWM outputs for RP2040
//!
//! The port list comes from configuration at runtime, so pins are routed to
//! the PWM block by GPIO number through the PAC instead of through typed
//! `embassy_rp::pwm::Pwm` handles.
//!
//! Every GPIO maps to one slice output: slice = (gpio / 2) % 8, channel A for
//! even pins and B for odd pins. GPIO 0 and 16 therefore share slice 0 A, and
//! only one of them can be driven at a time.

use duty_hal::{PwmDriver, PwmError};
use embassy_rp::pac;
use embassy_rp::peripherals::{
    PWM_SLICE0, PWM_SLICE1, PWM_SLICE2, PWM_SLICE3, PWM_SLICE4, PWM_SLICE5, PWM_SLICE6,
    PWM_SLICE7,
};
use embassy_rp::Peri;
use heapless::Vec;

/// Highest GPIO number on the RP2040
pub const MAX_GPIO: u8 = 29;

/// Number of PWM slices
pub const SLICE_COUNT: usize = 8;

/// Pins that can be marked reserved
pub const MAX_RESERVED: usize = 8;

const FUNCSEL_PWM: u8 = 4;
const FUNCSEL_NULL: u8 = 31;

/// Ownership of all PWM slices
///
/// The driver reprograms slices by index, so it takes all of them to keep
/// other code from configuring a slice behind its back.
pub struct PwmSlices<'d> {
    pub slice0: Peri<'d, PWM_SLICE0>,
    pub slice1: Peri<'d, PWM_SLICE1>,
    pub slice2: Peri<'d, PWM_SLICE2>,
    pub slice3: Peri<'d, PWM_SLICE3>,
    pub slice4: Peri<'d, PWM_SLICE4>,
    pub slice5: Peri<'d, PWM_SLICE5>,
    pub slice6: Peri<'d, PWM_SLICE6>,
    pub slice7: Peri<'d, PWM_SLICE7>,
}

/// Slice output a GPIO is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Output {
    slice: usize,
    channel_b: bool,
}

impl Output {
    fn of(pin: u8) -> Self {
        Self {
            slice: ((pin >> 1) as usize) % SLICE_COUNT,
            channel_b: pin & 1 == 1,
        }
    }

    fn index(self) -> usize {
        self.slice * 2 + self.channel_b as usize
    }
}

/// RP2040 PWM driver addressing pins by GPIO number
pub struct Rp2040Pwm<'d> {
    _slices: PwmSlices<'d>,
    reserved: Vec<u8, MAX_RESERVED>,
    divider: u8,
    /// GPIO currently driving each slice output
    claims: [Option<u8>; SLICE_COUNT * 2],
}

impl<'d> Rp2040Pwm<'d> {
    /// Create the driver
    ///
    /// `reserved` lists GPIOs owned by other peripherals (UART, ...); at
    /// most [`MAX_RESERVED`] distinct pins are kept. The system clock is
    /// divided by `divider` before the counter.
    pub fn new(
        slices: PwmSlices<'d>,
        reserved: impl IntoIterator<Item = u8>,
        divider: u8,
    ) -> Self {
        let mut list: Vec<u8, MAX_RESERVED> = Vec::new();
        for pin in reserved {
            if !list.contains(&pin) && list.push(pin).is_err() {
                break;
            }
        }
        Self {
            _slices: slices,
            reserved: list,
            divider: divider.max(1),
            claims: [None; SLICE_COUNT * 2],
        }
    }

    fn slice_in_use(&self, slice: usize) -> bool {
        self.claims[slice * 2].is_some() || self.claims[slice * 2 + 1].is_some()
    }

    fn route(pin: u8, funcsel: u8) {
        let n = pin as usize;
        pac::PADS_BANK0.gpio(n).modify(|w| {
            w.set_od(false);
            w.set_ie(false);
        });
        pac::IO_BANK0.gpio(n).ctrl().write(|w| w.set_funcsel(funcsel));
    }
}

impl<'d> PwmDriver for Rp2040Pwm<'d> {
    fn attach(&mut self, pin: u8, top: u16) -> Result<(), PwmError> {
        if pin > MAX_GPIO {
            return Err(PwmError::InvalidPin);
        }
        if self.reserved.contains(&pin) {
            return Err(PwmError::Reserved);
        }

        let output = Output::of(pin);
        match self.claims[output.index()] {
            Some(owner) if owner != pin => return Err(PwmError::ChannelInUse),
            _ => {}
        }

        let ch = pac::PWM.ch(output.slice);
        if !self.slice_in_use(output.slice) {
            ch.csr().write(|w| w.set_en(false));
            ch.div().write(|w| {
                w.set_int(self.divider);
                w.set_frac(0);
            });
            ch.top().write(|w| w.set_top(top));
            ch.ctr().write(|w| w.set_ctr(0));
            ch.cc().write(|w| {
                w.set_a(0);
                w.set_b(0);
            });
            ch.csr().write(|w| w.set_en(true));
        }

        self.claims[output.index()] = Some(pin);
        Self::route(pin, FUNCSEL_PWM);
        Ok(())
    }

    fn detach(&mut self, pin: u8) {
        if pin > MAX_GPIO {
            return;
        }
        let output = Output::of(pin);
        if self.claims[output.index()] != Some(pin) {
            return;
        }

        Self::route(pin, FUNCSEL_NULL);
        self.claims[output.index()] = None;

        let ch = pac::PWM.ch(output.slice);
        if output.channel_b {
            ch.cc().modify(|w| w.set_b(0));
        } else {
            ch.cc().modify(|w| w.set_a(0));
        }
        if !self.slice_in_use(output.slice) {
            ch.csr().write(|w| w.set_en(false));
        }
    }

    fn reset(&mut self) {
        for pin in self.claims.iter_mut().filter_map(|c| c.take()) {
            Self::route(pin, FUNCSEL_NULL);
        }

        pac::RESETS.reset().modify(|w| w.set_pwm(true));
        pac::RESETS.reset().modify(|w| w.set_pwm(false));
        while !pac::RESETS.reset_done().read().pwm() {}
    }

    fn set_level(&mut self, pin: u8, level: u16) {
        if pin > MAX_GPIO {
            return;
        }
        let output = Output::of(pin);
        if self.claims[output.index()] != Some(pin) {
            return;
        }

        let ch = pac::PWM.ch(output.slice);
        if output.channel_b {
            ch.cc().modify(|w| w.set_b(level));
        } else {
            ch.cc().modify(|w| w.set_a(level));
        }
    }
}
