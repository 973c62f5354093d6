//! Narrowing-conversion rules.
//!
//! [`OverflowConfig`] holds the per-column fail-on-overflow flag. The free
//! functions are the range checks applied when an Ion value is narrowed
//! into a fixed-width row-model primitive. Each is a pure function of the
//! value and the target width or length:
//!
//! - `fail = true`: out-of-range input is an error, never truncated
//! - `fail = false`: native narrowing (two's-complement wrap, `as f32`,
//!   character truncation)

use std::collections::HashMap;
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode};
use num_bigint::{BigInt, Sign};
use num_traits::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::{IonSerdeError, IonSerdeResult};

/// Per-column fail-on-overflow flags with a table-wide default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverflowConfig {
    default_fail: bool,
    per_column: HashMap<String, bool>,
}

impl Default for OverflowConfig {
    fn default() -> Self {
        Self::new(true)
    }
}

impl OverflowConfig {
    /// Creates a config with the given table-wide default.
    #[must_use]
    pub fn new(default_fail: bool) -> Self {
        Self {
            default_fail,
            per_column: HashMap::new(),
        }
    }

    /// Sets a per-column override.
    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>, fail: bool) -> Self {
        self.per_column.insert(column.into(), fail);
        self
    }

    /// Whether narrowing violations in `column` are errors.
    #[must_use]
    pub fn fail_on_overflow(&self, column: &str) -> bool {
        self.per_column
            .get(column)
            .copied()
            .unwrap_or(self.default_fail)
    }

    /// Table-wide default.
    #[must_use]
    pub fn default_fail(&self) -> bool {
        self.default_fail
    }

    pub(crate) fn overridden_columns(&self) -> impl Iterator<Item = &str> {
        self.per_column.keys().map(String::as_str)
    }
}

/// Minimal storage class of an Ion integer, as reported by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntegerSize {
    /// Fits in 32 bits.
    Int,
    /// Fits in 64 bits.
    Long,
    /// Needs arbitrary precision.
    BigInteger,
}

impl IntegerSize {
    /// Minimal storage class of `value`.
    #[must_use]
    pub fn of(value: &BigInt) -> Self {
        if value.to_i32().is_some() {
            Self::Int
        } else if value.to_i64().is_some() {
            Self::Long
        } else {
            Self::BigInteger
        }
    }

    fn for_width(width: u32) -> Self {
        if width <= 32 {
            Self::Int
        } else {
            Self::Long
        }
    }
}

fn width_name(width: u32) -> &'static str {
    match width {
        8 => "tinyint",
        16 => "smallint",
        32 => "int",
        _ => "bigint",
    }
}

fn width_bounds(width: u32) -> (i64, i64) {
    match width {
        8 => (i64::from(i8::MIN), i64::from(i8::MAX)),
        16 => (i64::from(i16::MIN), i64::from(i16::MAX)),
        32 => (i64::from(i32::MIN), i64::from(i32::MAX)),
        _ => (i64::MIN, i64::MAX),
    }
}

/// Two's-complement truncation to the low `width` bits.
#[allow(clippy::cast_possible_truncation)]
fn wrap_to_width(value: &BigInt, width: u32) -> i64 {
    let fill = if value.sign() == Sign::Minus { 0xFF } else { 0x00 };
    let mut buf = [fill; 8];
    for (dst, src) in buf.iter_mut().zip(value.to_signed_bytes_le()) {
        *dst = src;
    }
    let raw = i64::from_le_bytes(buf);
    match width {
        8 => i64::from(raw as i8),
        16 => i64::from(raw as i16),
        32 => i64::from(raw as i32),
        _ => raw,
    }
}

/// Narrows an Ion integer into a signed integer of `width` bits.
///
/// The result is widened back to `i64`; callers cast to the target width.
///
/// # Errors
///
/// With `fail`, returns [`IonSerdeError::Overflow`] unless the value's
/// storage class fits the target and the value lies within its bounds.
pub fn narrow_int(value: &BigInt, width: u32, fail: bool) -> IonSerdeResult<i64> {
    if !fail {
        return Ok(wrap_to_width(value, width));
    }
    let overflow = || IonSerdeError::Overflow {
        value: value.to_string(),
        target: width_name(width).to_string(),
    };
    if IntegerSize::of(value) > IntegerSize::for_width(width) {
        return Err(overflow());
    }
    let v = value.to_i64().ok_or_else(overflow)?;
    let (min, max) = width_bounds(width);
    if v < min || v > max {
        return Err(overflow());
    }
    Ok(v)
}

/// Returns `value` as `f32` if the narrowing is bit-exact.
///
/// NaN is accepted: it has no exact value to lose.
///
/// # Errors
///
/// Returns [`IonSerdeError::PrecisionLoss`] when `(value as f32) as f64`
/// differs from `value`.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
pub fn exact_f32(value: f64) -> IonSerdeResult<f32> {
    let narrowed = value as f32;
    if value.is_nan() || f64::from(narrowed) == value {
        Ok(narrowed)
    } else {
        Err(IonSerdeError::PrecisionLoss {
            value: value.to_string(),
            target: "float".into(),
        })
    }
}

/// Narrows a 64-bit float into a 32-bit float.
///
/// # Errors
///
/// With `fail`, see [`exact_f32`].
#[allow(clippy::cast_possible_truncation)]
pub fn narrow_f32(value: f64, fail: bool) -> IonSerdeResult<f32> {
    if fail {
        exact_f32(value)
    } else {
        Ok(value as f32)
    }
}

/// Converts an Ion integer into a 64-bit float.
///
/// # Errors
///
/// With `fail`, returns [`IonSerdeError::Overflow`] when the result is not
/// finite and [`IonSerdeError::PrecisionLoss`] when it does not convert
/// back to `value`.
pub fn int_to_f64(value: &BigInt, fail: bool) -> IonSerdeResult<f64> {
    let converted = value.to_f64().unwrap_or(match value.sign() {
        Sign::Minus => f64::NEG_INFINITY,
        _ => f64::INFINITY,
    });
    if !fail {
        return Ok(converted);
    }
    if !converted.is_finite() {
        return Err(IonSerdeError::Overflow {
            value: value.to_string(),
            target: "double".into(),
        });
    }
    if BigInt::from_f64(converted).as_ref() != Some(value) {
        return Err(IonSerdeError::PrecisionLoss {
            value: value.to_string(),
            target: "double".into(),
        });
    }
    Ok(converted)
}

/// Converts an Ion decimal into a 64-bit float.
///
/// A strict conversion must read back as the same decimal through the
/// float's shortest text form.
///
/// # Errors
///
/// With `fail`, returns [`IonSerdeError::Overflow`] when the result is not
/// finite and [`IonSerdeError::PrecisionLoss`] when it does not read back
/// as `value`.
pub fn decimal_to_f64(value: &BigDecimal, fail: bool) -> IonSerdeResult<f64> {
    let overflow = || IonSerdeError::Overflow {
        value: value.to_string(),
        target: "double".into(),
    };
    let converted = value.to_f64().ok_or_else(overflow)?;
    if !fail {
        return Ok(converted);
    }
    if !converted.is_finite() {
        return Err(overflow());
    }
    let round_trip = BigDecimal::from_str(&converted.to_string()).ok();
    if round_trip.as_ref() != Some(value) {
        return Err(IonSerdeError::PrecisionLoss {
            value: value.to_string(),
            target: "double".into(),
        });
    }
    Ok(converted)
}

/// Checks that text fits `char(limit)` / `varchar(limit)`.
///
/// # Errors
///
/// Returns [`IonSerdeError::LengthExceeded`] when the text is longer than
/// `limit` characters.
pub fn check_text(text: &str, limit: u32) -> IonSerdeResult<()> {
    let limit_chars = usize::try_from(limit).unwrap_or(usize::MAX);
    let length = text.chars().count();
    if length > limit_chars {
        return Err(IonSerdeError::LengthExceeded { length, limit });
    }
    Ok(())
}

/// Fits text into `char(limit)` / `varchar(limit)`, counting characters.
///
/// # Errors
///
/// With `fail`, returns [`IonSerdeError::LengthExceeded`] when the text is
/// longer than `limit`; otherwise truncates.
pub fn fit_text(text: &str, limit: u32, fail: bool) -> IonSerdeResult<String> {
    let limit_chars = usize::try_from(limit).unwrap_or(usize::MAX);
    let length = text.chars().count();
    if length <= limit_chars {
        return Ok(text.to_string());
    }
    if fail {
        return Err(IonSerdeError::LengthExceeded { length, limit });
    }
    Ok(text.chars().take(limit_chars).collect())
}

/// Converts a decimal into an integer without losing its fractional part.
///
/// # Errors
///
/// Returns [`IonSerdeError::PrecisionLoss`] if the fraction is non-zero.
pub fn decimal_to_bigint(value: &BigDecimal) -> IonSerdeResult<BigInt> {
    if !value.is_integer() {
        return Err(IonSerdeError::PrecisionLoss {
            value: value.to_string(),
            target: "int".into(),
        });
    }
    let (digits, _) = value.with_scale(0).into_bigint_and_exponent();
    Ok(digits)
}

/// Coerces a decimal into a signed integer of `width` bits.
///
/// # Errors
///
/// With `fail`, returns [`IonSerdeError::PrecisionLoss`] for a non-zero
/// fraction and [`IonSerdeError::Overflow`] when the integral part does not
/// fit. Without it, the fraction is truncated toward zero and the integral
/// part wrapped.
pub fn decimal_to_int(value: &BigDecimal, width: u32, fail: bool) -> IonSerdeResult<i64> {
    if fail {
        let integral = decimal_to_bigint(value)?;
        return narrow_int(&integral, width, true);
    }
    let (integral, _) = value
        .with_scale_round(0, RoundingMode::Down)
        .into_bigint_and_exponent();
    Ok(wrap_to_width(&integral, width))
}

/// Fits a decimal into `decimal(precision, scale)`.
///
/// The value is rounded half-up to `scale` digits.
///
/// # Errors
///
/// With `fail`, returns [`IonSerdeError::Overflow`] when the rounded value
/// needs more than `precision` digits.
pub fn fit_decimal(
    value: &BigDecimal,
    precision: u8,
    scale: u8,
    fail: bool,
) -> IonSerdeResult<BigDecimal> {
    let rounded = value.with_scale_round(i64::from(scale), RoundingMode::HalfUp);
    if fail {
        let (digits, _) = rounded.as_bigint_and_exponent();
        let digit_count = digits.magnitude().to_string().len();
        if digits.sign() != Sign::NoSign && digit_count > usize::from(precision) {
            return Err(IonSerdeError::Overflow {
                value: value.to_string(),
                target: format!("decimal({precision},{scale})"),
            });
        }
    }
    Ok(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn big(v: i128) -> BigInt {
        BigInt::from(v)
    }

    #[test]
    fn test_config_lookup() {
        let cfg = OverflowConfig::new(true).with_column("n", false);
        assert!(!cfg.fail_on_overflow("n"));
        assert!(cfg.fail_on_overflow("other"));
        assert!(OverflowConfig::default().default_fail());
    }

    #[test]
    fn test_integer_size() {
        assert_eq!(IntegerSize::of(&big(5)), IntegerSize::Int);
        assert_eq!(IntegerSize::of(&big(1 << 40)), IntegerSize::Long);
        assert_eq!(IntegerSize::of(&big(i128::from(i64::MAX) + 1)), IntegerSize::BigInteger);
    }

    #[test]
    fn test_narrow_int_fail() {
        assert_eq!(narrow_int(&big(127), 8, true).unwrap(), 127);
        assert_eq!(narrow_int(&big(-128), 8, true).unwrap(), -128);
        assert!(matches!(narrow_int(&big(200), 8, true), Err(IonSerdeError::Overflow { .. })));
        assert!(narrow_int(&big(-129), 8, true).is_err());
        assert!(narrow_int(&big(40_000), 16, true).is_err());
        assert!(narrow_int(&big(1 << 31), 32, true).is_err());
        assert_eq!(narrow_int(&big(1 << 40), 64, true).unwrap(), 1 << 40);
        assert!(narrow_int(&big(i128::from(i64::MAX) + 1), 64, true).is_err());
    }

    #[test]
    fn test_narrow_int_wraps() {
        assert_eq!(narrow_int(&big(200), 8, false).unwrap(), -56);
        assert_eq!(narrow_int(&big(-129), 8, false).unwrap(), 127);
        assert_eq!(narrow_int(&big(65_537), 16, false).unwrap(), 1);
        assert_eq!(narrow_int(&big(i128::from(u32::MAX)), 32, false).unwrap(), -1);
        assert_eq!(narrow_int(&big(i128::from(u64::MAX) + 2), 64, false).unwrap(), 1);
        assert_eq!(narrow_int(&big(-5), 8, false).unwrap(), -5);
    }

    #[test]
    fn test_f32_narrowing() {
        assert_eq!(exact_f32(1.5).unwrap(), 1.5);
        assert!(exact_f32(f64::NAN).unwrap().is_nan());
        assert_eq!(exact_f32(f64::INFINITY).unwrap(), f32::INFINITY);
        assert!(matches!(exact_f32(0.1), Err(IonSerdeError::PrecisionLoss { .. })));
        assert!(exact_f32(1e300).is_err());
        #[allow(clippy::cast_possible_truncation)]
        let expected = 0.1_f64 as f32;
        assert_eq!(narrow_f32(0.1, false).unwrap(), expected);
    }

    #[test]
    fn test_int_to_f64() {
        assert_eq!(int_to_f64(&big(16_777_217), true).unwrap(), 16_777_217.0);
        assert_eq!(int_to_f64(&big(1 << 53), true).unwrap(), 9_007_199_254_740_992.0);
        assert!(matches!(
            int_to_f64(&big((1 << 53) + 1), true),
            Err(IonSerdeError::PrecisionLoss { .. })
        ));
        let huge = BigInt::from(10).pow(400);
        assert!(matches!(int_to_f64(&huge, true), Err(IonSerdeError::Overflow { .. })));
        assert_eq!(int_to_f64(&huge, false).unwrap(), f64::INFINITY);
        assert_eq!(int_to_f64(&-huge, false).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_decimal_to_f64() {
        let d = |s: &str| BigDecimal::from_str(s).unwrap();
        assert_eq!(decimal_to_f64(&d("0.1"), true).unwrap(), 0.1);
        assert_eq!(decimal_to_f64(&d("2.50"), true).unwrap(), 2.5);
        assert!(matches!(
            decimal_to_f64(&d("0.10000000000000000000001"), true),
            Err(IonSerdeError::PrecisionLoss { .. })
        ));
        assert_eq!(decimal_to_f64(&d("0.10000000000000000000001"), false).unwrap(), 0.1);
        assert!(matches!(decimal_to_f64(&d("1e400"), true), Err(IonSerdeError::Overflow { .. })));
    }

    #[test]
    fn test_check_text() {
        assert!(check_text("abc", 3).is_ok());
        assert!(check_text("hé", 2).is_ok());
        assert!(matches!(
            check_text("abcd", 3),
            Err(IonSerdeError::LengthExceeded { length: 4, limit: 3 })
        ));
    }

    #[test]
    fn test_fit_text() {
        assert_eq!(fit_text("abc", 3, true).unwrap(), "abc");
        assert!(matches!(
            fit_text("abcd", 3, true),
            Err(IonSerdeError::LengthExceeded { length: 4, limit: 3 })
        ));
        assert_eq!(fit_text("abcd", 3, false).unwrap(), "abc");
        assert_eq!(fit_text("héllo", 2, false).unwrap(), "hé");
    }

    #[test]
    fn test_decimal_to_int() {
        let d = |s: &str| BigDecimal::from_str(s).unwrap();
        assert_eq!(decimal_to_int(&d("42.000"), 32, true).unwrap(), 42);
        assert!(matches!(decimal_to_int(&d("4.5"), 32, true), Err(IonSerdeError::PrecisionLoss { .. })));
        assert!(matches!(decimal_to_int(&d("300"), 8, true), Err(IonSerdeError::Overflow { .. })));
        assert_eq!(decimal_to_int(&d("4.9"), 32, false).unwrap(), 4);
        assert_eq!(decimal_to_int(&d("-4.9"), 32, false).unwrap(), -4);
        assert_eq!(decimal_to_int(&d("200"), 8, false).unwrap(), -56);
    }

    #[test]
    fn test_fit_decimal() {
        let d = |s: &str| BigDecimal::from_str(s).unwrap();
        assert_eq!(fit_decimal(&d("1.235"), 5, 2, true).unwrap(), d("1.24"));
        assert!(fit_decimal(&d("12345.6"), 5, 2, true).is_err());
        assert_eq!(fit_decimal(&d("12345.6"), 5, 2, false).unwrap(), d("12345.60"));
        assert_eq!(fit_decimal(&d("0"), 1, 0, true).unwrap(), d("0"));
    }
}
