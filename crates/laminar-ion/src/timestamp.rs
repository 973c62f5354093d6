//! Timestamp offset configuration and normalization.
//!
//! Offset grammar: `Z`, `[+-]HH:MM`, or unsigned `HH:MM` (positive), with
//! hours in `[0,23]` and minutes in `[0,59]`.
//!
//! On write, a zone-less row timestamp is read as UTC, truncated to
//! millisecond precision, and presented at the configured offset. The
//! instant is unchanged; only its displayed offset differs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::element::IonTimestamp;
use crate::error::{IonSerdeError, IonSerdeResult};

const OFFSET_KEY: &str = "ion.timestamp.serialization_offset";

/// A fixed presentation offset, in minutes east of UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimestampOffset {
    minutes: i32,
}

impl TimestampOffset {
    /// The zero offset, `Z`.
    pub const UTC: Self = Self { minutes: 0 };

    /// Offset in minutes.
    #[must_use]
    pub fn minutes(self) -> i32 {
        self.minutes
    }

    fn fixed(self) -> IonSerdeResult<FixedOffset> {
        FixedOffset::east_opt(self.minutes * 60)
            .ok_or_else(|| IonSerdeError::config(OFFSET_KEY, format!("offset {self} out of range")))
    }

    /// Presents a UTC instant at this offset.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::Codec`] if the instant is out of range.
    pub fn present(self, utc: &NaiveDateTime) -> IonSerdeResult<IonTimestamp> {
        let millis = truncate_to_millis(utc)?;
        let instant: DateTime<FixedOffset> = millis.and_utc().with_timezone(&self.fixed()?);
        Ok(IonTimestamp::with_offset(instant))
    }
}

fn truncate_to_millis(ts: &NaiveDateTime) -> IonSerdeResult<NaiveDateTime> {
    let nanos = ts.nanosecond() / 1_000_000 * 1_000_000;
    ts.with_nanosecond(nanos)
        .ok_or_else(|| IonSerdeError::Codec(format!("timestamp {ts} out of range")))
}

/// A date as a day-precision timestamp with no offset.
#[must_use]
pub fn present_date(date: NaiveDate) -> IonTimestamp {
    IonTimestamp::day(date)
}

fn parse_two_digits(s: &str, max: i32) -> Option<i32> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let v: i32 = s.parse().ok()?;
    (v <= max).then_some(v)
}

impl FromStr for TimestampOffset {
    type Err = IonSerdeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            IonSerdeError::config(
                OFFSET_KEY,
                format!("'{s}' is not 'Z', '[+-]HH:MM' or 'HH:MM'"),
            )
        };
        if s == "Z" {
            return Ok(Self::UTC);
        }
        let (sign, body) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => (1, s),
        };
        let (hh, mm) = body.split_once(':').ok_or_else(invalid)?;
        let hours = parse_two_digits(hh, 23).ok_or_else(invalid)?;
        let minutes = parse_two_digits(mm, 59).ok_or_else(invalid)?;
        Ok(Self {
            minutes: sign * (hours * 60 + minutes),
        })
    }
}

impl fmt::Display for TimestampOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minutes == 0 {
            return f.write_str("Z");
        }
        let sign = if self.minutes < 0 { '-' } else { '+' };
        let abs = self.minutes.abs();
        write!(f, "{sign}{:02}:{:02}", abs / 60, abs % 60)
    }
}

impl TryFrom<String> for TimestampOffset {
    type Error = IonSerdeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimestampOffset> for String {
    fn from(value: TimestampOffset) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::TimestampPrecision;

    #[test]
    fn test_parse_offsets() {
        assert_eq!("+01:30".parse::<TimestampOffset>().unwrap().minutes(), 90);
        assert_eq!("-01:30".parse::<TimestampOffset>().unwrap().minutes(), -90);
        assert_eq!("01:30".parse::<TimestampOffset>().unwrap().minutes(), 90);
        assert_eq!("Z".parse::<TimestampOffset>().unwrap().minutes(), 0);
        assert_eq!("-23:59".parse::<TimestampOffset>().unwrap().minutes(), -1439);
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        for bad in ["1:30", "+1:30", "24:00", "12:60", "z", "", "+0130", "+01:30:00", "++01:30"] {
            let err = bad.parse::<TimestampOffset>().unwrap_err();
            assert!(
                matches!(err, IonSerdeError::InvalidConfiguration { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_round_trips() {
        for text in ["Z", "+01:30", "-05:00"] {
            let offset: TimestampOffset = text.parse().unwrap();
            assert_eq!(offset.to_string(), text);
        }
    }

    #[test]
    fn test_present_keeps_instant() {
        let utc = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_nano_opt(23, 0, 0, 123_456_789)
            .unwrap();
        let offset: TimestampOffset = "+01:30".parse().unwrap();
        let ts = offset.present(&utc).unwrap();
        assert_eq!(ts.offset_minutes(), Some(90));
        assert_eq!(ts.precision(), TimestampPrecision::Millisecond);
        assert_eq!(ts.epoch_millis(), utc.and_utc().timestamp_millis());
        assert_eq!(ts.to_string(), "2024-01-02T00:30:00.123+01:30");
    }

    #[test]
    fn test_present_date_has_no_offset() {
        let ts = present_date(NaiveDate::from_ymd_opt(2020, 2, 29).unwrap());
        assert_eq!(ts.offset_minutes(), None);
        assert_eq!(ts.to_string(), "2020-02-29T");
    }

    #[test]
    fn test_serde_as_string() {
        let offset: TimestampOffset = "-01:30".parse().unwrap();
        let json = serde_json::to_string(&offset).unwrap();
        assert_eq!(json, "\"-01:30\"");
        let back: TimestampOffset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, offset);
        assert!(serde_json::from_str::<TimestampOffset>("\"1:30\"").is_err());
    }
}
