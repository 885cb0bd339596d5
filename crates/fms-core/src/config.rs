//! Typed scraper configuration.
//!
//! `ScraperConfig` mirrors the persisted document one field per registry key;
//! serde renames keep the on-disk and over-the-wire keys identical to the
//! registry's. Construction goes through [`crate::settings::validate`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::settings::keys;

/// Registry defaults, shared with the settings table so the two cannot drift.
pub(crate) mod defaults {
    pub const DATABASE_URL: &str = "postgres://localhost:5432/forum_media";
    pub const RUN_INTERVAL_SECONDS: i64 = 120;
    pub const MAX_SCROLL_SECONDS: i64 = 60;
    pub const HEADLESS: i64 = 1;
    pub const CREATE_LOGFILE: i64 = 0;
    pub const GECKO_DRIVER_PATH: &str = "./bin/geckodriver";
}

/// The full runtime configuration of the scraping job.
///
/// Flags keep their 0/1 integer coding from the document; use
/// [`ScraperConfig::headless_enabled`] and [`ScraperConfig::logfile_enabled`]
/// for the boolean view.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(rename = "DATABASE_URL")]
    pub database_url: String,
    #[serde(rename = "SCRAPER_RUN_INTERVAL")]
    pub run_interval_seconds: i64,
    #[serde(rename = "MAX_SCROLL_SECONDS")]
    pub max_scroll_seconds: i64,
    #[serde(rename = "SCRAPER_HEADLESS")]
    pub headless: i64,
    #[serde(rename = "SCRAPER_CREATE_LOGFILE")]
    pub create_logfile: i64,
    #[serde(rename = "GECKO_DRIVER_PATH")]
    pub gecko_driver_path: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::DATABASE_URL.to_string(),
            run_interval_seconds: defaults::RUN_INTERVAL_SECONDS,
            max_scroll_seconds: defaults::MAX_SCROLL_SECONDS,
            headless: defaults::HEADLESS,
            create_logfile: defaults::CREATE_LOGFILE,
            gecko_driver_path: defaults::GECKO_DRIVER_PATH.to_string(),
        }
    }
}

impl ScraperConfig {
    #[must_use]
    pub fn headless_enabled(&self) -> bool {
        self.headless == 1
    }

    #[must_use]
    pub fn logfile_enabled(&self) -> bool {
        self.create_logfile == 1
    }

    /// The flat configuration document, keyed exactly as the registry.
    #[must_use]
    pub fn to_document(&self) -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert(
            keys::DATABASE_URL.to_string(),
            Value::from(self.database_url.clone()),
        );
        doc.insert(
            keys::SCRAPER_RUN_INTERVAL.to_string(),
            Value::from(self.run_interval_seconds),
        );
        doc.insert(
            keys::MAX_SCROLL_SECONDS.to_string(),
            Value::from(self.max_scroll_seconds),
        );
        doc.insert(keys::SCRAPER_HEADLESS.to_string(), Value::from(self.headless));
        doc.insert(
            keys::SCRAPER_CREATE_LOGFILE.to_string(),
            Value::from(self.create_logfile),
        );
        doc.insert(
            keys::GECKO_DRIVER_PATH.to_string(),
            Value::from(self.gecko_driver_path.clone()),
        );
        doc
    }
}

impl std::fmt::Debug for ScraperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperConfig")
            .field("database_url", &"[redacted]")
            .field("run_interval_seconds", &self.run_interval_seconds)
            .field("max_scroll_seconds", &self.max_scroll_seconds)
            .field("headless", &self.headless)
            .field("create_logfile", &self.create_logfile)
            .field("gecko_driver_path", &self.gecko_driver_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_output_matches_to_document() {
        let cfg = ScraperConfig::default();
        let via_serde = serde_json::to_value(&cfg).expect("serialize");
        assert_eq!(via_serde, Value::Object(cfg.to_document()));
    }

    #[test]
    fn document_round_trips_through_validation() {
        let cfg = ScraperConfig {
            run_interval_seconds: 300,
            max_scroll_seconds: 90,
            ..ScraperConfig::default()
        };
        let parsed = crate::settings::validate(&cfg.to_document()).expect("valid");
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn flag_accessors_decode_integer_coding() {
        let cfg = ScraperConfig::default();
        assert!(cfg.headless_enabled());
        assert!(!cfg.logfile_enabled());
    }

    #[test]
    fn debug_redacts_database_url() {
        let cfg = ScraperConfig::default();
        let rendered = format!("{cfg:?}");
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains("postgres://"));
    }
}
