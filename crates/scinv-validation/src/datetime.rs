//! Timestamp validation and canonicalisation
//!
//! Inventory documents store every epoch as `YYYY-MM-DDThh:mm:ss.ffffZ`.
//! Operators may type a few looser shapes; these are accepted and converted,
//! anything else is rejected rather than guessed at.

use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

/// Human-readable form of the canonical wire format
pub const CANONICAL_FORMAT: &str = "YYYY-MM-DDThh:mm:ss.ffffZ";

const FRACTION_DIGITS: usize = 4;
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

// date, then optionally: separator, hh:mm:ss, fraction, Z. ASCII digits only.
static SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})(?:([ T])([0-9]{2}):([0-9]{2}):([0-9]{2})(?:\.([0-9]+))?(Z)?)?$")
        .expect("date-time shape pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct Components {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    /// Exactly four digits
    fraction: String,
}

/// Validates and canonicalises timestamp strings
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeNormalizer;

impl DateTimeNormalizer {
    /// True for the empty string and for any recognised shape with in-range
    /// components.
    #[must_use]
    pub fn validate(text: &str) -> bool {
        text.is_empty() || Self::components(text).is_ok()
    }

    /// Convert a recognised timestamp into the canonical wire format.
    ///
    /// Fractional seconds are truncated or zero-padded to four digits, so
    /// converting an already canonical value returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DateTime`] for empty input, unrecognised shapes and
    /// out-of-range components.
    pub fn convert(text: &str) -> Result<String> {
        if text.is_empty() {
            return Err(Error::date_time(text, "empty value"));
        }
        let c = Self::components(text)?;
        Ok(format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{}Z",
            c.year, c.month, c.day, c.hour, c.minute, c.second, c.fraction
        ))
    }

    /// Like [`convert`](Self::convert) but maps the empty string (unset) to itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DateTime`] for non-empty input that does not convert.
    pub fn normalize(text: &str) -> Result<String> {
        if text.is_empty() {
            Ok(String::new())
        } else {
            Self::convert(text)
        }
    }

    /// Parse into a chrono value for ordering comparisons.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DateTime`] when the text does not convert.
    pub fn parse(text: &str) -> Result<NaiveDateTime> {
        let c = Self::components(text)?;
        let micros: u32 = c
            .fraction
            .parse::<u32>()
            .map_err(|e| Error::date_time(text, e.to_string()))?
            * 100;
        NaiveDate::from_ymd_opt(c.year, c.month, c.day)
            .and_then(|d| d.and_hms_micro_opt(c.hour, c.minute, c.second, micros))
            .ok_or_else(|| Error::date_time(text, "not a calendar time"))
    }

    fn components(text: &str) -> Result<Components> {
        let caps = SHAPE
            .captures(text)
            .ok_or_else(|| Error::date_time(text, "unrecognised shape"))?;

        let separator = caps.get(4).map(|m| m.as_str());
        let fraction = caps.get(8).map(|m| m.as_str());
        let zulu = caps.get(9).is_some();

        // A space-separated time carries neither a fraction nor a zone marker,
        // and a fraction followed by Z is only the canonical four digits.
        let recognised = match (separator, fraction, zulu) {
            (Some(" "), None, false) | (None, _, _) | (Some("T"), _, false) => true,
            (Some("T"), None, true) => true,
            (Some("T"), Some(f), true) => f.chars().count() == FRACTION_DIGITS,
            _ => false,
        };
        if !recognised {
            return Err(Error::date_time(text, "unrecognised shape"));
        }

        let number = |idx: usize| -> Result<u32> {
            caps.get(idx).map_or(Ok(0), |m| {
                m.as_str()
                    .parse::<u32>()
                    .map_err(|e| Error::date_time(text, e.to_string()))
            })
        };

        let year = i32::try_from(number(1)?).map_err(|e| Error::date_time(text, e.to_string()))?;
        let (month, day) = (number(2)?, number(3)?);
        let (hour, minute, second) = (number(5)?, number(6)?, number(7)?);

        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(Error::date_time(
                text,
                format!("year must be between {MIN_YEAR} and {MAX_YEAR}"),
            ));
        }
        if !(1..=12).contains(&month) {
            return Err(Error::date_time(text, "month must be between 1 and 12"));
        }
        if NaiveDate::from_ymd_opt(year, month, day).is_none() {
            return Err(Error::date_time(
                text,
                format!("day {day} does not exist in {year:04}-{month:02}"),
            ));
        }
        if hour > 23 {
            return Err(Error::date_time(text, "hour must be between 0 and 23"));
        }
        if minute > 59 {
            return Err(Error::date_time(text, "minute must be between 0 and 59"));
        }
        if second > 59 {
            return Err(Error::date_time(text, "second must be below 60"));
        }

        let mut fraction: String = fraction.unwrap_or("").chars().take(FRACTION_DIGITS).collect();
        while fraction.len() < FRACTION_DIGITS {
            fraction.push('0');
        }

        Ok(Components {
            year,
            month,
            day,
            hour,
            minute,
            second,
            fraction,
        })
    }
}
