//! Validator kinds

use crate::datetime::DateTimeNormalizer;
use crate::{Error, Result};
use regex::Regex;

/// Validation rule result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleResult {
    pub is_valid: bool,
    pub message: Option<String>,
}

impl RuleResult {
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
        }
    }
}

/// A single field check. Every kind except [`Validator::Required`] accepts
/// the empty string, which stands for an unset field.
#[derive(Debug, Clone)]
pub enum Validator {
    /// Value must contain something other than whitespace
    Required,

    /// Decimal (or integer) number with optional inclusive bounds
    Numeric {
        min: Option<f64>,
        max: Option<f64>,
        integer: bool,
    },

    /// Value must be one of a fixed set
    Enumerated {
        values: Vec<String>,
        case_sensitive: bool,
    },

    /// Value must be accepted by [`DateTimeNormalizer`]
    DateTime,

    /// Value must match a regular expression
    Pattern(Regex),
}

impl Validator {
    /// Any finite number
    #[must_use]
    pub fn numeric() -> Self {
        Self::Numeric {
            min: None,
            max: None,
            integer: false,
        }
    }

    /// Finite number within `min..=max`
    #[must_use]
    pub fn range(min: f64, max: f64) -> Self {
        Self::Numeric {
            min: Some(min),
            max: Some(max),
            integer: false,
        }
    }

    /// Finite number `>= 0`
    #[must_use]
    pub fn non_negative() -> Self {
        Self::Numeric {
            min: Some(0.0),
            max: None,
            integer: false,
        }
    }

    /// Whole number `>= 0`
    #[must_use]
    pub fn count() -> Self {
        Self::Numeric {
            min: Some(0.0),
            max: None,
            integer: true,
        }
    }

    /// Case-insensitive `true` / `false`
    #[must_use]
    pub fn boolean() -> Self {
        Self::enumerated(["true", "false"], false)
    }

    pub fn enumerated<I, S>(values: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enumerated {
            values: values.into_iter().map(Into::into).collect(),
            case_sensitive,
        }
    }

    /// Compile a pattern validator
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pattern`] if `pattern` is not a valid regular expression.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| Error::pattern(pattern, e.to_string()))
    }

    /// Short kind name used in reports
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Numeric { .. } => "numeric",
            Self::Enumerated { .. } => "enumerated",
            Self::DateTime => "datetime",
            Self::Pattern(_) => "pattern",
        }
    }

    /// Check a value
    #[must_use]
    pub fn check(&self, value: &str) -> RuleResult {
        if let Self::Required = self {
            return if value.trim().is_empty() {
                RuleResult::invalid("Value is required")
            } else {
                RuleResult::valid()
            };
        }
        if value.is_empty() {
            return RuleResult::valid();
        }

        match self {
            Self::Required => RuleResult::valid(),
            Self::Numeric { min, max, integer } => check_numeric(value, *min, *max, *integer),
            Self::Enumerated {
                values,
                case_sensitive,
            } => {
                let found = values.iter().any(|allowed| {
                    if *case_sensitive {
                        allowed == value
                    } else {
                        allowed.eq_ignore_ascii_case(value)
                    }
                });
                if found {
                    RuleResult::valid()
                } else {
                    RuleResult::invalid(format!(
                        "Value '{value}' is not one of: {}",
                        values.join(", ")
                    ))
                }
            }
            Self::DateTime => match DateTimeNormalizer::convert(value) {
                Ok(_) => RuleResult::valid(),
                Err(e) => RuleResult::invalid(e.to_string()),
            },
            Self::Pattern(re) => {
                if re.is_match(value) {
                    RuleResult::valid()
                } else {
                    RuleResult::invalid(format!(
                        "Value '{value}' does not match pattern '{}'",
                        re.as_str()
                    ))
                }
            }
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn check_numeric(value: &str, min: Option<f64>, max: Option<f64>, integer: bool) -> RuleResult {
    let parsed = if integer {
        value.parse::<i64>().ok().map(|v| v as f64)
    } else {
        value.parse::<f64>().ok().filter(|v| v.is_finite())
    };

    let Some(number) = parsed else {
        let expected = if integer { "a whole number" } else { "a number" };
        return RuleResult::invalid(format!("Value '{value}' is not {expected}"));
    };

    if let Some(min) = min {
        if number < min {
            return RuleResult::invalid(format!("Value {value} is below minimum {min}"));
        }
    }
    if let Some(max) = max {
        if number > max {
            return RuleResult::invalid(format!("Value {value} is above maximum {max}"));
        }
    }
    RuleResult::valid()
}
