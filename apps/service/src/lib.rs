//! Health-check engine for a set of monitored URLs.
//!
//! Probes are served through a TTL cache, applied to a registry that keeps
//! bounded history and uptime per URL, and driven either on demand by the
//! batch checker or continuously by the real-time scheduler.

pub mod config;
pub mod database;
pub mod error;
pub mod monitoring;
pub mod orchestrator;
pub mod registry;
pub mod validation;

pub use config::Config;
pub use error::{MonitorError, Result};
pub use orchestrator::{HealthReport, Orchestrator};
