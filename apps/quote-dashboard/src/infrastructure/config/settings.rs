//! Dashboard Configuration Settings
//!
//! Configuration types for the dashboard, loaded from environment variables.
//!
//! | Variable                          | Default      |
//! |-----------------------------------|--------------|
//! | `DASHBOARD_SYMBOL`                | none         |
//! | `DASHBOARD_PREVIOUS_CLOSE_POLICY` | `wall-clock` |
//! | `DASHBOARD_FEED_PATH`             | stdin        |
//! | `DASHBOARD_EVENT_BUFFER`          | `1024`       |
//! | `DASHBOARD_HEALTH_PORT`           | `8083`       |
//! | `DASHBOARD_SESSION_DATE`          | system clock |

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::domain::market::normalize_symbol;
use crate::domain::previous_close::PreviousClosePolicy;

/// Where feed events are read from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedInput {
    /// Standard input.
    #[default]
    Stdin,
    /// Newline-delimited JSON replay file.
    File(PathBuf),
}

impl FeedInput {
    /// Human-readable description for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Stdin => "stdin".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Feed settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Event source.
    pub input: FeedInput,
    /// Capacity of the reader → bridge channel.
    pub event_buffer: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            input: FeedInput::Stdin,
            event_buffer: 1024,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

impl ServerSettings {
    /// Whether the health server should be started.
    #[must_use]
    pub const fn health_enabled(&self) -> bool {
        self.health_port != 0
    }
}

/// Complete dashboard configuration.
#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    /// Symbol selected at startup.
    pub initial_symbol: Option<String>,
    /// Previous-close selection policy.
    pub previous_close_policy: PreviousClosePolicy,
    /// Pinned "today" for replaying a past session.
    pub session_date: Option<NaiveDate>,
    /// Feed settings.
    pub feed: FeedSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl DashboardConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let initial_symbol = lookup("DASHBOARD_SYMBOL").and_then(|s| normalize_symbol(&s));

        let previous_close_policy = match lookup("DASHBOARD_PREVIOUS_CLOSE_POLICY") {
            Some(raw) if !raw.trim().is_empty() => {
                raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "DASHBOARD_PREVIOUS_CLOSE_POLICY".to_string(),
                    value: raw,
                })?
            }
            _ => PreviousClosePolicy::default(),
        };

        let session_date = match lookup("DASHBOARD_SESSION_DATE") {
            Some(raw) if !raw.trim().is_empty() => Some(
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                    ConfigError::InvalidValue {
                        key: "DASHBOARD_SESSION_DATE".to_string(),
                        value: raw.clone(),
                    }
                })?,
            ),
            _ => None,
        };

        let input = match lookup("DASHBOARD_FEED_PATH") {
            Some(path) if path == "-" => FeedInput::Stdin,
            Some(path) if !path.trim().is_empty() => FeedInput::File(PathBuf::from(path)),
            _ => FeedInput::Stdin,
        };

        let event_buffer = parse_env_usize(
            &lookup,
            "DASHBOARD_EVENT_BUFFER",
            FeedSettings::default().event_buffer,
        );
        if event_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DASHBOARD_EVENT_BUFFER".to_string(),
                value: "0".to_string(),
            });
        }

        let server = ServerSettings {
            health_port: parse_env_u16(
                &lookup,
                "DASHBOARD_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
        };

        Ok(Self {
            initial_symbol,
            previous_close_policy,
            session_date,
            feed: FeedSettings {
                input,
                event_buffer,
            },
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable holds a value that cannot be used.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn parse_env_u16<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u16) -> u16 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: usize) -> usize {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<DashboardConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        DashboardConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.initial_symbol, None);
        assert_eq!(config.previous_close_policy, PreviousClosePolicy::WallClock);
        assert_eq!(config.session_date, None);
        assert_eq!(config.feed.input, FeedInput::Stdin);
        assert_eq!(config.feed.event_buffer, 1024);
        assert_eq!(config.server.health_port, 8083);
        assert!(config.server.health_enabled());
    }

    #[test]
    fn reads_every_variable() {
        let config = config(&[
            ("DASHBOARD_SYMBOL", " aapl "),
            ("DASHBOARD_PREVIOUS_CLOSE_POLICY", "prev-daily-bar"),
            ("DASHBOARD_FEED_PATH", "/tmp/replay.ndjson"),
            ("DASHBOARD_EVENT_BUFFER", "16"),
            ("DASHBOARD_HEALTH_PORT", "0"),
            ("DASHBOARD_SESSION_DATE", "2024-03-04"),
        ])
        .unwrap();

        assert_eq!(config.initial_symbol.as_deref(), Some("AAPL"));
        assert_eq!(
            config.previous_close_policy,
            PreviousClosePolicy::PrevDailyBarDate
        );
        assert_eq!(
            config.feed.input,
            FeedInput::File(PathBuf::from("/tmp/replay.ndjson"))
        );
        assert_eq!(config.feed.event_buffer, 16);
        assert!(!config.server.health_enabled());
        assert_eq!(config.session_date, NaiveDate::from_ymd_opt(2024, 3, 4));
    }

    #[test]
    fn malformed_session_date_is_rejected() {
        assert!(config(&[("DASHBOARD_SESSION_DATE", "04/03/2024")]).is_err());
    }

    #[test]
    fn dash_means_stdin() {
        let config = config(&[("DASHBOARD_FEED_PATH", "-")]).unwrap();
        assert_eq!(config.feed.input, FeedInput::Stdin);
        assert_eq!(config.feed.input.describe(), "stdin");
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let err = config(&[("DASHBOARD_PREVIOUS_CLOSE_POLICY", "lunar")]).unwrap_err();
        assert!(err.to_string().contains("DASHBOARD_PREVIOUS_CLOSE_POLICY"));
    }

    #[test]
    fn zero_buffer_is_rejected() {
        assert!(config(&[("DASHBOARD_EVENT_BUFFER", "0")]).is_err());
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = config(&[
            ("DASHBOARD_EVENT_BUFFER", "lots"),
            ("DASHBOARD_HEALTH_PORT", "http"),
        ])
        .unwrap();
        assert_eq!(config.feed.event_buffer, 1024);
        assert_eq!(config.server.health_port, 8083);
    }

    #[test]
    fn blank_symbol_is_none() {
        let config = config(&[("DASHBOARD_SYMBOL", "   ")]).unwrap();
        assert_eq!(config.initial_symbol, None);
    }
}
