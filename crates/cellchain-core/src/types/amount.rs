//! Fixed-point amount scaling between user-facing 256-bit values and the
//! 64-bit units the governance contract stores.

use ethnum::U256;

use crate::error::CoreError;

/// One internal unit equals this many base units of the native token.
pub const AMOUNT_SCALE: u64 = 1_000_000_000;

/// Scale a 256-bit amount down to 64-bit units.
///
/// Amounts with a nonzero remainder under the scale are rejected, never
/// rounded.
pub fn encode_amount(amount: U256) -> Result<u64, CoreError> {
    let scale = U256::from(AMOUNT_SCALE);
    if amount % scale != U256::ZERO {
        return Err(CoreError::DustAmount(amount.to_string()));
    }
    let quotient = amount / scale;
    if quotient > U256::from(u64::MAX) {
        return Err(CoreError::AmountTooLarge(amount.to_string()));
    }
    Ok(quotient.as_u64())
}

/// Scale 64-bit units back up to a 256-bit amount.
pub fn decode_amount(units: u64) -> U256 {
    U256::from(units) * U256::from(AMOUNT_SCALE)
}

/// Parse a decimal string into a 256-bit amount.
pub fn parse_amount(s: &str) -> Result<U256, CoreError> {
    let trimmed = s.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::InvalidAmount(s.to_string()));
    }
    U256::from_str_radix(trimmed, 10).map_err(|e| CoreError::InvalidAmount(format!("{}: {}", s, e)))
}

/// Serde adapter encoding a [`U256`] as a decimal string.
pub mod decimal {
    use ethnum::U256;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_amount(&s).map_err(D::Error::custom)
    }
}
