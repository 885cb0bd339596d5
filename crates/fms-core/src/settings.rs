//! Registry of every recognized configuration key.
//!
//! The registry is the single source of truth for the shape of the persisted
//! configuration document: key names, declared value types, defaults, and
//! per-key constraints. [`validate`] checks a candidate document against it
//! key by key and produces a typed [`ScraperConfig`] on success.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{defaults, ScraperConfig};

/// Seconds the scraper needs to start up and tear down around a run.
pub const SHUTDOWN_BUFFER_SECS: i64 = 20;

/// Slack absorbing the difference between "now" and the trigger's actual
/// fire granularity when comparing against the schedule.
pub const CLOCK_SKEW_SECS: i64 = 2;

/// Upper bound for duration-valued settings (one year, in seconds).
///
/// Keeps every sum and `chrono::Duration` conversion performed on a
/// validated document comfortably inside `i64` range.
pub const MAX_DURATION_SECS: i64 = 31_536_000;

/// Key names of the configuration document, one per registry entry.
pub mod keys {
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const SCRAPER_RUN_INTERVAL: &str = "SCRAPER_RUN_INTERVAL";
    pub const MAX_SCROLL_SECONDS: &str = "MAX_SCROLL_SECONDS";
    pub const SCRAPER_HEADLESS: &str = "SCRAPER_HEADLESS";
    pub const SCRAPER_CREATE_LOGFILE: &str = "SCRAPER_CREATE_LOGFILE";
    pub const GECKO_DRIVER_PATH: &str = "GECKO_DRIVER_PATH";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingType {
    Int,
    Str,
}

/// Declared per-key constraint, checked after the type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Duration in seconds: strictly positive, at most [`MAX_DURATION_SECS`].
    Seconds,
    /// Boolean-coded integer flag; only 0 and 1 are accepted.
    Flag,
    /// String must not be empty.
    NonEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Int(i64),
    Str(&'static str),
}

/// One recognized configuration key. Immutable, defined at compile time.
#[derive(Debug, Clone, Copy)]
pub struct Setting {
    pub key: &'static str,
    pub ty: SettingType,
    pub default: DefaultValue,
    pub constraint: Option<Constraint>,
}

pub const REGISTRY: &[Setting] = &[
    Setting {
        key: keys::DATABASE_URL,
        ty: SettingType::Str,
        default: DefaultValue::Str(defaults::DATABASE_URL),
        constraint: Some(Constraint::NonEmpty),
    },
    Setting {
        key: keys::SCRAPER_RUN_INTERVAL,
        ty: SettingType::Int,
        default: DefaultValue::Int(defaults::RUN_INTERVAL_SECONDS),
        constraint: Some(Constraint::Seconds),
    },
    Setting {
        key: keys::MAX_SCROLL_SECONDS,
        ty: SettingType::Int,
        default: DefaultValue::Int(defaults::MAX_SCROLL_SECONDS),
        constraint: Some(Constraint::Seconds),
    },
    Setting {
        key: keys::SCRAPER_HEADLESS,
        ty: SettingType::Int,
        default: DefaultValue::Int(defaults::HEADLESS),
        constraint: Some(Constraint::Flag),
    },
    Setting {
        key: keys::SCRAPER_CREATE_LOGFILE,
        ty: SettingType::Int,
        default: DefaultValue::Int(defaults::CREATE_LOGFILE),
        constraint: Some(Constraint::Flag),
    },
    Setting {
        key: keys::GECKO_DRIVER_PATH,
        ty: SettingType::Str,
        default: DefaultValue::Str(defaults::GECKO_DRIVER_PATH),
        constraint: Some(Constraint::NonEmpty),
    },
];

/// Look up a registry entry by key.
#[must_use]
pub fn lookup(key: &str) -> Option<&'static Setting> {
    REGISTRY.iter().find(|setting| setting.key == key)
}

/// The configuration document holding every registry default.
#[must_use]
pub fn default_document() -> Map<String, Value> {
    let mut doc = Map::new();
    for setting in REGISTRY {
        let value = match setting.default {
            DefaultValue::Int(n) => Value::from(n),
            DefaultValue::Str(s) => Value::from(s),
        };
        doc.insert(setting.key.to_string(), value);
    }
    doc
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unrecognized setting: {0}")]
    UnknownKey(String),
    #[error("missing setting: {0}")]
    MissingKey(String),
    #[error("{0} must be a scalar value, not an object or array")]
    NestedValueNotAllowed(String),
    #[error("{key} expects {expected}")]
    TypeMismatch { key: String, expected: &'static str },
    #[error("{key} is out of range")]
    OutOfRange { key: String },
    #[error(
        "SCRAPER_RUN_INTERVAL must be greater than MAX_SCROLL_SECONDS plus the scraper shutdown buffer"
    )]
    IntervalTooSmall,
}

/// Validated, typed value of a single setting.
#[derive(Debug, Clone, PartialEq)]
enum SettingValue {
    Int(i64),
    Str(String),
}

/// Validate a candidate configuration document against the registry.
///
/// The candidate must contain exactly the registry's keys, every value must
/// be a scalar of the declared type satisfying its constraint, and the run
/// interval must leave room for a full scroll plus the shutdown buffer.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered; the candidate is never
/// partially accepted.
pub fn validate(candidate: &Map<String, Value>) -> Result<ScraperConfig, ValidationError> {
    for key in candidate.keys() {
        if lookup(key).is_none() {
            return Err(ValidationError::UnknownKey(key.clone()));
        }
    }

    let mut cfg = ScraperConfig::default();
    for setting in REGISTRY {
        let value = candidate
            .get(setting.key)
            .ok_or_else(|| ValidationError::MissingKey(setting.key.to_string()))?;

        match (setting.key, check_value(setting, value)?) {
            (keys::DATABASE_URL, SettingValue::Str(s)) => cfg.database_url = s,
            (keys::SCRAPER_RUN_INTERVAL, SettingValue::Int(n)) => cfg.run_interval_seconds = n,
            (keys::MAX_SCROLL_SECONDS, SettingValue::Int(n)) => cfg.max_scroll_seconds = n,
            (keys::SCRAPER_HEADLESS, SettingValue::Int(n)) => cfg.headless = n,
            (keys::SCRAPER_CREATE_LOGFILE, SettingValue::Int(n)) => cfg.create_logfile = n,
            (keys::GECKO_DRIVER_PATH, SettingValue::Str(s)) => cfg.gecko_driver_path = s,
            // Registry keys and declared types are in sync by construction.
            _ => {}
        }
    }

    if cfg.run_interval_seconds <= cfg.max_scroll_seconds + SHUTDOWN_BUFFER_SECS {
        return Err(ValidationError::IntervalTooSmall);
    }
    Ok(cfg)
}

/// Check one value against its setting's declared type and constraint.
fn check_value(setting: &Setting, value: &Value) -> Result<SettingValue, ValidationError> {
    if value.is_object() || value.is_array() {
        return Err(ValidationError::NestedValueNotAllowed(
            setting.key.to_string(),
        ));
    }

    let typed = match setting.ty {
        SettingType::Int => SettingValue::Int(value.as_i64().ok_or_else(|| {
            ValidationError::TypeMismatch {
                key: setting.key.to_string(),
                expected: "an integer",
            }
        })?),
        SettingType::Str => SettingValue::Str(
            value
                .as_str()
                .ok_or_else(|| ValidationError::TypeMismatch {
                    key: setting.key.to_string(),
                    expected: "a string",
                })?
                .to_string(),
        ),
    };

    let violated = match (setting.constraint, &typed) {
        (Some(Constraint::Flag), SettingValue::Int(n)) => !(0..=1).contains(n),
        (Some(Constraint::Seconds), SettingValue::Int(n)) => !(1..=MAX_DURATION_SECS).contains(n),
        (Some(Constraint::NonEmpty), SettingValue::Str(s)) => s.is_empty(),
        _ => false,
    };
    if violated {
        return Err(ValidationError::OutOfRange {
            key: setting.key.to_string(),
        });
    }
    Ok(typed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_document_validates() {
        let doc = default_document();
        let cfg = validate(&doc).expect("defaults must validate");
        assert_eq!(cfg, ScraperConfig::default());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut doc = default_document();
        doc.insert("SCRAPER_TURBO_MODE".to_string(), Value::from(1));
        let result = validate(&doc);
        assert_eq!(
            result,
            Err(ValidationError::UnknownKey("SCRAPER_TURBO_MODE".into()))
        );
    }

    #[test]
    fn unknown_key_wins_even_when_other_fields_are_invalid() {
        let mut doc = default_document();
        doc.insert("SCRAPER_TURBO_MODE".to_string(), Value::from(1));
        doc.insert(keys::SCRAPER_RUN_INTERVAL.to_string(), Value::from(-5));
        let result = validate(&doc);
        assert_eq!(
            result,
            Err(ValidationError::UnknownKey("SCRAPER_TURBO_MODE".into()))
        );
    }

    #[test]
    fn missing_key_is_rejected() {
        let mut doc = default_document();
        doc.remove(keys::MAX_SCROLL_SECONDS);
        let result = validate(&doc);
        assert_eq!(
            result,
            Err(ValidationError::MissingKey(keys::MAX_SCROLL_SECONDS.into()))
        );
    }

    #[test]
    fn nested_value_is_rejected() {
        let mut doc = default_document();
        doc.insert(
            keys::DATABASE_URL.to_string(),
            serde_json::json!({ "host": "localhost" }),
        );
        let result = validate(&doc);
        assert_eq!(
            result,
            Err(ValidationError::NestedValueNotAllowed(
                keys::DATABASE_URL.into()
            ))
        );
    }

    #[test]
    fn array_value_is_rejected() {
        let mut doc = default_document();
        doc.insert(
            keys::MAX_SCROLL_SECONDS.to_string(),
            serde_json::json!([60]),
        );
        let result = validate(&doc);
        assert_eq!(
            result,
            Err(ValidationError::NestedValueNotAllowed(
                keys::MAX_SCROLL_SECONDS.into()
            ))
        );
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut doc = default_document();
        doc.insert(
            keys::SCRAPER_RUN_INTERVAL.to_string(),
            Value::from("soon"),
        );
        let result = validate(&doc);
        assert_eq!(
            result,
            Err(ValidationError::TypeMismatch {
                key: keys::SCRAPER_RUN_INTERVAL.into(),
                expected: "an integer",
            })
        );
    }

    #[test]
    fn flag_outside_zero_one_is_rejected() {
        let mut doc = default_document();
        doc.insert(keys::SCRAPER_HEADLESS.to_string(), Value::from(2));
        let result = validate(&doc);
        assert_eq!(
            result,
            Err(ValidationError::OutOfRange {
                key: keys::SCRAPER_HEADLESS.into(),
            })
        );
    }

    #[test]
    fn empty_database_url_is_rejected() {
        let mut doc = default_document();
        doc.insert(keys::DATABASE_URL.to_string(), Value::from(""));
        let result = validate(&doc);
        assert_eq!(
            result,
            Err(ValidationError::OutOfRange {
                key: keys::DATABASE_URL.into(),
            })
        );
    }

    #[test]
    fn interval_equal_to_scroll_plus_buffer_is_too_small() {
        let mut doc = default_document();
        doc.insert(keys::SCRAPER_RUN_INTERVAL.to_string(), Value::from(80));
        doc.insert(keys::MAX_SCROLL_SECONDS.to_string(), Value::from(60));
        assert_eq!(validate(&doc), Err(ValidationError::IntervalTooSmall));
    }

    #[test]
    fn interval_below_scroll_plus_buffer_is_too_small() {
        let mut doc = default_document();
        doc.insert(keys::SCRAPER_RUN_INTERVAL.to_string(), Value::from(30));
        doc.insert(keys::MAX_SCROLL_SECONDS.to_string(), Value::from(60));
        assert_eq!(validate(&doc), Err(ValidationError::IntervalTooSmall));
    }

    #[test]
    fn interval_one_above_threshold_is_accepted() {
        let mut doc = default_document();
        doc.insert(keys::SCRAPER_RUN_INTERVAL.to_string(), Value::from(81));
        doc.insert(keys::MAX_SCROLL_SECONDS.to_string(), Value::from(60));
        let cfg = validate(&doc).expect("81 > 60 + 20 must validate");
        assert_eq!(cfg.run_interval_seconds, 81);
    }

    #[test]
    fn interval_beyond_one_year_is_rejected() {
        let mut doc = default_document();
        doc.insert(keys::SCRAPER_RUN_INTERVAL.to_string(), Value::from(i64::MAX));
        let result = validate(&doc);
        assert_eq!(
            result,
            Err(ValidationError::OutOfRange {
                key: keys::SCRAPER_RUN_INTERVAL.into(),
            })
        );
    }

    #[test]
    fn huge_scroll_budget_is_rejected_before_the_joint_rule() {
        // A near-max scroll budget must fail the duration bound; it may
        // never reach the interval sum check.
        let mut doc = default_document();
        doc.insert(
            keys::MAX_SCROLL_SECONDS.to_string(),
            Value::from(i64::MAX - 10),
        );
        let result = validate(&doc);
        assert_eq!(
            result,
            Err(ValidationError::OutOfRange {
                key: keys::MAX_SCROLL_SECONDS.into(),
            })
        );
    }

    #[test]
    fn interval_at_the_duration_bound_is_accepted() {
        let mut doc = default_document();
        doc.insert(
            keys::SCRAPER_RUN_INTERVAL.to_string(),
            Value::from(MAX_DURATION_SECS),
        );
        let cfg = validate(&doc).expect("one-year interval must validate");
        assert_eq!(cfg.run_interval_seconds, MAX_DURATION_SECS);
    }

    #[test]
    fn negative_scroll_budget_is_rejected() {
        let mut doc = default_document();
        doc.insert(keys::MAX_SCROLL_SECONDS.to_string(), Value::from(-1));
        let result = validate(&doc);
        assert_eq!(
            result,
            Err(ValidationError::OutOfRange {
                key: keys::MAX_SCROLL_SECONDS.into(),
            })
        );
    }
}
