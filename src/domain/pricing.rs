//! Price configuration and exact display-unit <-> base-unit conversion.
//!
//! Amounts are parsed from their decimal string form straight into integer base units so
//! `8` USDC at 6 decimals is exactly `8_000_000`, with no float rounding. Digits beyond the
//! token precision are truncated, never rounded up.

use crate::error::{CheckoutError, CheckoutResult};
use solana_sdk::pubkey::Pubkey;

/// Decimal precision of the native currency (1 SOL = 10^9 lamports).
pub const LAMPORTS_DECIMALS: u8 = 9;

/// Parses a display amount such as `"8"`, `"0.025"` or `"12.5"` into base units.
pub fn parse_display_amount(input: &str, decimals: u8) -> CheckoutResult<u64> {
    let s = input.trim();
    if s.is_empty() {
        return Err(CheckoutError::Configuration("empty amount".to_string()));
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(CheckoutError::Configuration(format!(
            "invalid amount '{}': expected a non-negative decimal number",
            input
        )));
    }

    let scale = 10u64.checked_pow(decimals as u32).ok_or_else(|| {
        CheckoutError::Configuration(format!("unsupported decimal precision {}", decimals))
    })?;
    let overflow = || CheckoutError::Configuration(format!("amount '{}' is too large", input));

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().map_err(|_| overflow())?
    };

    // Truncate to the token precision, then right-pad to it.
    let kept: String = frac.chars().take(decimals as usize).collect();
    let frac_units = if kept.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", kept, width = decimals as usize);
        padded.parse::<u64>().map_err(|_| overflow())?
    };

    whole_units
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or_else(overflow)
}

/// Formats base units back into a trimmed display string (`25_000_000` @ 9 -> `"0.025"`).
pub fn format_base_units(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let scale = match 10u64.checked_pow(decimals as u32) {
        Some(s) => s,
        None => return amount.to_string(),
    };
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}

/// What a pass costs and in which token it is paid.
#[derive(Debug, Clone)]
pub struct PriceConfig {
    pub payment_mint: Pubkey,
    pub payment_decimals: u8,
    pub payment_symbol: String,
    token_amount: u64,
    rent_lamports: u64,
    fee_buffer_lamports: u64,
}

impl PriceConfig {
    pub fn new(
        payment_mint: Pubkey,
        payment_decimals: u8,
        payment_symbol: impl Into<String>,
        price: &str,
        rent_cost: &str,
        fee_buffer: &str,
    ) -> CheckoutResult<Self> {
        let token_amount = parse_display_amount(price, payment_decimals)?;
        if token_amount == 0 {
            return Err(CheckoutError::Configuration(format!(
                "price '{}' is zero at {} decimals",
                price, payment_decimals
            )));
        }
        let rent_lamports = parse_display_amount(rent_cost, LAMPORTS_DECIMALS)?;
        let fee_buffer_lamports = parse_display_amount(fee_buffer, LAMPORTS_DECIMALS)?;
        rent_lamports
            .checked_add(fee_buffer_lamports)
            .ok_or_else(|| CheckoutError::Configuration("rent + fee buffer overflows".into()))?;

        Ok(Self {
            payment_mint,
            payment_decimals,
            payment_symbol: payment_symbol.into(),
            token_amount,
            rent_lamports,
            fee_buffer_lamports,
        })
    }

    /// Price in payment-token base units.
    pub fn token_amount(&self) -> u64 {
        self.token_amount
    }

    /// Lamports the buyer forwards to the authority to fund asset creation rent.
    pub fn rent_lamports(&self) -> u64 {
        self.rent_lamports
    }

    pub fn fee_buffer_lamports(&self) -> u64 {
        self.fee_buffer_lamports
    }

    /// Minimum native balance the buyer must hold: rent plus fee buffer.
    pub fn native_required(&self) -> u64 {
        // Overflow is rejected in `new`.
        self.rent_lamports.saturating_add(self.fee_buffer_lamports)
    }

    /// Human-readable summary of what the buyer owes.
    pub fn summary(&self, pass_name: &str) -> String {
        format!(
            "Purchase your {} for {} {} + {} SOL (NFT rent + fees)",
            pass_name,
            format_base_units(self.token_amount, self.payment_decimals),
            self.payment_symbol,
            format_base_units(self.native_required(), LAMPORTS_DECIMALS)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(parse_display_amount("8", 6).unwrap(), 8_000_000);
        assert_eq!(parse_display_amount("0.025", 9).unwrap(), 25_000_000);
        assert_eq!(parse_display_amount(".5", 2).unwrap(), 50);
        assert_eq!(parse_display_amount("3.", 2).unwrap(), 300);
    }

    #[test]
    fn truncates_excess_precision() {
        // 1.2345678 at 6 decimals keeps 1.234567, never rounds to 1.234568.
        assert_eq!(parse_display_amount("1.2345678", 6).unwrap(), 1_234_567);
        assert_eq!(parse_display_amount("0.0000009", 6).unwrap(), 0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_display_amount("", 6).is_err());
        assert!(parse_display_amount("-1", 6).is_err());
        assert!(parse_display_amount("1e3", 6).is_err());
        assert!(parse_display_amount(".", 6).is_err());
        assert!(parse_display_amount("99999999999999999999", 6).is_err());
    }

    #[test]
    fn formats_trimmed() {
        assert_eq!(format_base_units(25_000_000, 9), "0.025");
        assert_eq!(format_base_units(10_000_000, 9), "0.01");
        assert_eq!(format_base_units(8_000_000, 6), "8");
        assert_eq!(format_base_units(42, 0), "42");
    }

    #[test]
    fn summary_mentions_both_currencies() {
        let price = PriceConfig::new(Pubkey::new_unique(), 6, "USDC", "8", "0.02", "0.005").unwrap();
        assert_eq!(price.native_required(), 25_000_000);
        assert_eq!(
            price.summary("Pivat Platform Pass"),
            "Purchase your Pivat Platform Pass for 8 USDC + 0.025 SOL (NFT rent + fees)"
        );
    }
}
