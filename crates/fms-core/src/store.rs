//! File-backed configuration store.
//!
//! The persisted document is a flat JSON object keyed exactly as the
//! registry. Writes go through a sibling temp file and an `fs::rename`, so a
//! concurrent reader never observes a half-written document. Environment
//! overrides apply only when the file is first synthesized; afterwards a
//! load returns exactly what was last saved.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ScraperConfig;
use crate::settings::{self, Setting, SettingType, ValidationError, REGISTRY};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Unwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration document at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
    #[error("environment override {key} is not valid: {reason}")]
    InvalidOverride { key: String, reason: String },
}

/// Durable store for the scraper configuration document.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted configuration, synthesizing it from registry
    /// defaults and process environment overrides on first use.
    ///
    /// # Errors
    ///
    /// `Unreadable`/`Corrupt` for an existing but unusable file,
    /// `InvalidOverride`/`Invalid` when first-time synthesis fails, and
    /// `Unwritable` when the synthesized document cannot be persisted.
    pub fn load(&self) -> Result<ScraperConfig, StoreError> {
        self.load_with(|key| std::env::var(key))
    }

    /// Like [`ConfigStore::load`], with an injected environment lookup so
    /// tests can drive synthesis from a plain map.
    pub fn load_with<F>(&self, lookup: F) -> Result<ScraperConfig, StoreError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        if !self.path.exists() {
            let cfg = synthesize(lookup)?;
            self.save(&cfg)?;
            return Ok(cfg);
        }

        let raw = fs::read_to_string(&self.path).map_err(|source| StoreError::Unreadable {
            path: self.path.clone(),
            source,
        })?;
        let value: Value =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        let Value::Object(doc) = value else {
            return Err(StoreError::Corrupt {
                path: self.path.clone(),
                reason: "expected a flat JSON object".to_string(),
            });
        };
        settings::validate(&doc).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Validate and atomically persist a configuration.
    ///
    /// # Errors
    ///
    /// `Invalid` if the configuration fails registry validation — nothing is
    /// written in that case — or `Unwritable` on IO failure.
    pub fn save(&self, cfg: &ScraperConfig) -> Result<(), StoreError> {
        let doc = cfg.to_document();
        settings::validate(&doc)?;

        let body = serde_json::to_vec_pretty(&Value::Object(doc)).map_err(|e| {
            StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &body).map_err(|source| StoreError::Unwritable {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Unwritable {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

/// Build the first-time document: registry defaults overridden by any
/// matching environment value, parsed per the declared type.
fn synthesize<F>(lookup: F) -> Result<ScraperConfig, StoreError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let mut doc: Map<String, Value> = settings::default_document();
    for setting in REGISTRY {
        let Ok(raw) = lookup(setting.key) else {
            continue;
        };
        doc.insert(setting.key.to_string(), parse_override(setting, &raw)?);
    }
    Ok(settings::validate(&doc)?)
}

fn parse_override(setting: &Setting, raw: &str) -> Result<Value, StoreError> {
    match setting.ty {
        SettingType::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| StoreError::InvalidOverride {
                key: setting.key.to_string(),
                reason: e.to_string(),
            }),
        SettingType::Str => Ok(Value::from(raw.to_string())),
    }
}
