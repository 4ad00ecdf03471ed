use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_CODE_LEN: usize = 16;

/// Exchange-qualified security or index code, e.g. `600000.SH`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecurityCode(String);

impl SecurityCode {
    /// Parse and normalize a code to upper case.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyCode);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len > MAX_CODE_LEN {
            return Err(ValidationError::CodeTooLong {
                len,
                max: MAX_CODE_LEN,
            });
        }

        for (index, ch) in normalized.chars().enumerate() {
            if !(ch.is_ascii_alphanumeric() || ch == '.') {
                return Err(ValidationError::CodeInvalidChar { ch, index });
            }
        }

        let well_formed = normalized
            .split_once('.')
            .is_some_and(|(ticker, exchange)| {
                !ticker.is_empty()
                    && !exchange.is_empty()
                    && exchange.chars().all(|ch| ch.is_ascii_alphabetic())
            });
        if !well_formed {
            return Err(ValidationError::CodeMissingExchange { value: normalized });
        }

        Ok(Self(normalized))
    }

    /// Wraps a code already known to be normalized, such as a built-in default.
    pub(crate) fn from_normalized(value: &str) -> Self {
        Self(value.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SecurityCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SecurityCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for SecurityCode {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SecurityCode> for String {
    fn from(value: SecurityCode) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_code() {
        let parsed = SecurityCode::parse(" 600000.sh ").expect("code should parse");
        assert_eq!(parsed.as_str(), "600000.SH");
        assert_eq!(parsed.to_string(), "600000.SH");
    }

    #[test]
    fn rejects_codes_without_exchange() {
        let err = SecurityCode::parse("600000").expect_err("must fail");
        assert!(matches!(err, ValidationError::CodeMissingExchange { .. }));
    }

    #[test]
    fn rejects_invalid_chars() {
        let err = SecurityCode::parse("6000$0.SH").expect_err("must fail");
        assert!(matches!(err, ValidationError::CodeInvalidChar { ch: '$', index: 4 }));
    }
}
