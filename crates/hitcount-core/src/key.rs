//! Counter identity validation.
//!
//! Rules:
//! - Surrounding whitespace is trimmed and the identifier is lower-cased.
//! - Length (in characters) must lie in `[MIN_LENGTH, MAX_LENGTH]`.
//! - Only ASCII letters, digits and `-` `_` `.` `/` are accepted.
//!
//! `:` is never accepted: storage layers use it as a separator.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::limits::{MAX_LENGTH, MIN_LENGTH};

/// Which half of the identifier failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Namespace,
    Key,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Namespace => f.write_str("namespace"),
            Field::Key => f.write_str("key"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} too short ({len} < {min})", min = MIN_LENGTH)]
    TooShort { field: Field, len: usize },
    #[error("{field} too long ({len} > {max})", max = MAX_LENGTH)]
    TooLong { field: Field, len: usize },
    #[error("{field} contains invalid character {ch:?}")]
    InvalidCharacter { field: Field, ch: char },
}

impl ValidationError {
    /// Short machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::TooShort { .. } => "too_short",
            ValidationError::TooLong { .. } => "too_long",
            ValidationError::InvalidCharacter { .. } => "invalid_character",
        }
    }

    pub fn field(&self) -> Field {
        match self {
            ValidationError::TooShort { field, .. }
            | ValidationError::TooLong { field, .. }
            | ValidationError::InvalidCharacter { field, .. } => *field,
        }
    }
}

/// A validated, normalized counter identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterKey {
    namespace: String,
    key: String,
}

impl CounterKey {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.key)
    }
}

fn is_allowed(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/')
}

/// Normalize a single identifier component.
pub fn normalize(field: Field, raw: &str) -> Result<String, ValidationError> {
    let s = raw.trim().to_lowercase();

    let len = s.chars().count();
    if len < MIN_LENGTH {
        return Err(ValidationError::TooShort { field, len });
    }
    if len > MAX_LENGTH {
        return Err(ValidationError::TooLong { field, len });
    }
    if let Some(ch) = s.chars().find(|c| !is_allowed(*c)) {
        return Err(ValidationError::InvalidCharacter { field, ch });
    }
    Ok(s)
}

/// Validate a `(namespace, key)` pair. Pure; no I/O.
pub fn validate(namespace: &str, key: &str) -> Result<CounterKey, ValidationError> {
    Ok(CounterKey {
        namespace: normalize(Field::Namespace, namespace)?,
        key: normalize(Field::Key, key)?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_lowercases() {
        let k = validate("  MyNs ", "Page/Home").unwrap();
        assert_eq!(k.namespace(), "myns");
        assert_eq!(k.key(), "page/home");
        assert_eq!(k.to_string(), "myns/page/home");
    }

    #[test]
    fn reports_failing_field() {
        let e = validate("ok-ns", "x").unwrap_err();
        assert_eq!(e.field(), Field::Key);
        assert_eq!(e.reason(), "too_short");
    }

    #[test]
    fn length_counts_chars_not_bytes() {
        // 'é' fails the allow-list, but must be reported as such rather than as a length error.
        let e = validate("abé", "key").unwrap_err();
        assert_eq!(e, ValidationError::InvalidCharacter { field: Field::Namespace, ch: 'é' });
    }
}
