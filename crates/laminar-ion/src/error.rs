//! Error types for Ion table binding, serialization, and deserialization.
//!
//! Provides [`IonSerdeError`] covering bind-time configuration failures,
//! narrowing-conversion violations, write-time structural mismatches, and
//! read-time malformed input, plus a convenience [`IonSerdeResult`] alias.

use thiserror::Error;

/// Result alias for Ion serde operations.
pub type IonSerdeResult<T> = Result<T, IonSerdeError>;

/// Errors that can occur while binding a table or converting a row.
#[derive(Debug, Error)]
pub enum IonSerdeError {
    /// Bad bind-time setup. Fails table initialization.
    #[error("invalid config key '{key}': {message}")]
    InvalidConfiguration {
        /// The configuration key (or column) at fault.
        key: String,
        /// What was wrong with the value.
        message: String,
    },

    /// An integer did not fit the target width.
    #[error("overflow: {value} does not fit in {target}")]
    Overflow {
        /// Textual rendering of the offending value.
        value: String,
        /// Target type description (e.g. `tinyint`).
        target: String,
    },

    /// A float narrowing changed the bit-exact value.
    #[error("precision loss: {value} cannot be represented exactly as {target}")]
    PrecisionLoss {
        /// Textual rendering of the offending value.
        value: String,
        /// Target type description.
        target: String,
    },

    /// Text exceeded the declared `char(n)` / `varchar(n)` length.
    #[error("length exceeded: text of {length} characters exceeds limit {limit}")]
    LengthExceeded {
        /// Actual character count.
        length: usize,
        /// Declared maximum length.
        limit: u32,
    },

    /// A map key could not be represented as text.
    #[error("invalid map key type: {0}")]
    InvalidKeyType(String),

    /// No union variant accepted the value.
    #[error("no matching union variant for {value} in {union_type}")]
    NoMatchingVariant {
        /// Runtime kind of the value.
        value: String,
        /// The union type being resolved.
        union_type: String,
    },

    /// A value's kind cannot be converted to the declared type at all.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Declared type.
        expected: String,
        /// Kind actually encountered.
        found: String,
    },

    /// The input document is structurally invalid.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Codec cursor misuse or I/O failure.
    #[error("codec error: {0}")]
    Codec(String),

    /// An Arrow error propagated from the Arrow bridge.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
}

impl IonSerdeError {
    /// Shorthand for [`IonSerdeError::InvalidConfiguration`].
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`IonSerdeError::TypeMismatch`].
    pub fn mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Returns `true` for errors an ignore-malformed table may swallow.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_configuration_display() {
        let err = IonSerdeError::config("ion.serialize_null", "unknown policy 'SOMETIMES'");
        assert_eq!(
            err.to_string(),
            "invalid config key 'ion.serialize_null': unknown policy 'SOMETIMES'"
        );
    }

    #[test]
    fn test_overflow_display() {
        let err = IonSerdeError::Overflow {
            value: "200".into(),
            target: "tinyint".into(),
        };
        assert!(err.to_string().contains("200"));
        assert!(err.to_string().contains("tinyint"));
    }

    #[test]
    fn test_is_malformed() {
        assert!(IonSerdeError::MalformedInput("truncated".into()).is_malformed());
        assert!(!IonSerdeError::Codec("step out at top level".into()).is_malformed());
        assert!(!IonSerdeError::mismatch("int", "string").is_malformed());
    }

    #[test]
    fn test_from_arrow() {
        let arrow_err = arrow_schema::ArrowError::SchemaError("bad schema".into());
        let err: IonSerdeError = arrow_err.into();
        assert!(matches!(err, IonSerdeError::Arrow(_)));
        assert!(err.to_string().contains("bad schema"));
    }
}
