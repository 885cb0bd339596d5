//! Domain logic for the forum-media scraper control plane.
//!
//! Everything here is synchronous and side-effect free except for
//! [`store::ConfigStore`], which owns the persisted configuration document.
//! The HTTP surface and the job scheduler live in `fms-server`.

pub mod config;
pub mod guard;
pub mod settings;
pub mod store;

pub use config::ScraperConfig;
pub use guard::{decide, GuardDecision, ScheduleState};
pub use settings::{
    validate, ValidationError, CLOCK_SKEW_SECS, MAX_DURATION_SECS, SHUTDOWN_BUFFER_SECS,
};
pub use store::{ConfigStore, StoreError};
