//! PWM output channels
//!
//! Maps configured ports onto PWM hardware and turns percent values into
//! compare levels.

mod channels;

pub use channels::{reconcile, Channel, OutputChannels, ProvisionReport, MAX_CHANNELS};

use crate::config::MAX_VALUE;

/// Counter resolution in bits
pub const PWM_RESOLUTION_BITS: u8 = 10;

/// Counter wrap value for [`PWM_RESOLUTION_BITS`]
pub const fn duty_top() -> u16 {
    (1u16 << PWM_RESOLUTION_BITS) - 1
}

/// Compare level for a percent value
///
/// Values above [`MAX_VALUE`] are clamped. The result rounds down, so
/// `0` maps to `0` and `100` maps to `top`.
pub fn duty_level(value: u8, top: u16) -> u16 {
    let value = value.min(MAX_VALUE) as u32;
    (value * top as u32 / MAX_VALUE as u32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_duty_top_is_ten_bit() {
        assert_eq!(duty_top(), 1023);
    }

    #[test]
    fn test_duty_level_endpoints() {
        assert_eq!(duty_level(0, 1023), 0);
        assert_eq!(duty_level(100, 1023), 1023);
        assert_eq!(duty_level(50, 1023), 511);
        assert_eq!(duty_level(1, 1023), 10);
    }

    #[test]
    fn test_duty_level_clamps() {
        assert_eq!(duty_level(255, 1023), 1023);
    }

    proptest! {
        #[test]
        fn test_duty_level_monotonic(a in 0u8..=100, b in 0u8..=100) {
            let top = duty_top();
            if a <= b {
                prop_assert!(duty_level(a, top) <= duty_level(b, top));
            }
            prop_assert!(duty_level(a, top) <= top);
        }
    }
}
