//! Configuration Module
//!
//! Configuration loading for the dashboard binary.

mod settings;

pub use settings::{ConfigError, DashboardConfig, FeedInput, FeedSettings, ServerSettings};
