//! Presentation helpers. Amounts stay [`U256`] everywhere else and only become
//! strings here.

use alloy_primitives::utils::{parse_ether, UnitsError};
use alloy_primitives::{Address, U256};

const DISPLAY_DECIMALS: usize = 4;

/// Render a wei amount as ether with four decimals, rounding half up.
///
/// `10^18` becomes `"1.0000"`.
pub fn format_reward(wei: U256) -> String {
    // 10^18 / 10^4
    let step = U256::from(100_000_000_000_000u64);
    let half = step / U256::from(2u8);
    let scale = U256::from(10_000u64);

    let scaled = wei.saturating_add(half) / step;
    let whole = scaled / scale;
    let frac = (scaled % scale).to_string();

    format!("{whole}.{frac:0>width$}", width = DISPLAY_DECIMALS)
}

/// Parse a decimal ether amount such as `"0.05"` into wei.
pub fn parse_reward(ether: &str) -> Result<U256, UnitsError> {
    parse_ether(ether.trim())
}

/// `0x1234...abcd` form used in listings.
pub fn short_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

pub fn time_left(deadline: u64, now: u64) -> String {
    if deadline <= now {
        return "Expired".to_string();
    }

    let remaining = deadline - now;
    let days = remaining / 86_400;
    let hours = (remaining % 86_400) / 3_600;

    if days > 0 {
        format!("{days} days left")
    } else {
        format!("{hours} hours left")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_ether_has_four_decimals() {
        let wei = U256::from(1_000_000_000_000_000_000u128);
        assert_eq!(format_reward(wei), "1.0000");
    }

    #[test]
    fn small_and_fractional_amounts() {
        assert_eq!(format_reward(U256::ZERO), "0.0000");
        assert_eq!(format_reward(U256::from(50_000_000_000_000_000u128)), "0.0500");
        assert_eq!(format_reward(U256::from(1_234_500_000_000_000_000u128)), "1.2345");
    }

    #[test]
    fn rounds_half_up_at_the_fifth_decimal() {
        assert_eq!(format_reward(U256::from(1_000_050_000_000_000_000u128)), "1.0001");
        assert_eq!(format_reward(U256::from(1_000_049_999_999_999_999u128)), "1.0000");
        assert_eq!(format_reward(U256::from(999_950_000_000_000_000u128)), "1.0000");
    }

    #[test]
    fn large_rewards_keep_full_precision() {
        let wei = U256::from(123_456_789u64) * U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(format_reward(wei), "123456789.0000");
    }

    #[test]
    fn parses_decimal_ether() {
        assert_eq!(
            parse_reward(" 0.5 ").unwrap(),
            U256::from(500_000_000_000_000_000u128)
        );
        assert!(parse_reward("half").is_err());
    }

    #[test]
    fn shortens_addresses() {
        assert_eq!(short_address(&Address::ZERO), "0x0000...0000");
    }

    #[test]
    fn time_left_buckets() {
        assert_eq!(time_left(100, 100), "Expired");
        assert_eq!(time_left(100 + 2 * 86_400 + 3_600, 100), "2 days left");
        assert_eq!(time_left(100 + 5 * 3_600 + 59, 100), "5 hours left");
    }
}
