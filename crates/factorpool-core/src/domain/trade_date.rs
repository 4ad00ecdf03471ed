use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::macros::format_description;
use time::Date;

use crate::ValidationError;

/// Calendar date in the store's fixed-width `YYYYMMDD` form.
///
/// Ordering follows the string form, which matches calendar order because every
/// value is zero-padded to eight digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradeDate {
    raw: String,
    date: Date,
}

impl TradeDate {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let raw = input.trim();
        let invalid = || ValidationError::InvalidDate {
            value: input.to_owned(),
        };

        if raw.len() != 8 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid());
        }

        let date = Date::parse(raw, format_description!("[year][month][day]"))
            .map_err(|_| invalid())?;

        Ok(Self {
            raw: raw.to_owned(),
            date,
        })
    }

    pub fn from_date(date: Date) -> Self {
        let raw = format!(
            "{:04}{:02}{:02}",
            date.year(),
            u8::from(date.month()),
            date.day()
        );
        Self { raw, date }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub const fn date(&self) -> Date {
        self.date
    }

    /// Whole days from `earlier` to `self`; negative when `earlier` is later.
    pub fn days_since(&self, earlier: &TradeDate) -> i64 {
        (self.date - earlier.date).whole_days()
    }

    pub fn next_day(&self) -> Option<Self> {
        self.date.next_day().map(Self::from_date)
    }
}

impl Display for TradeDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<&str> for TradeDate {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl Serialize for TradeDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for TradeDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}
