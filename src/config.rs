//! Application-level configuration loading: job cadences, lifecycle windows and credit policy.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::{clock::span, state::lifecycle::LifecycleWindows};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "THEATER_BACK_CONFIG_PATH";

const DEFAULT_LIFECYCLE_TICK: Duration = Duration::from_secs(10);
const DEFAULT_CREDIT_SWEEP: Duration = Duration::from_secs(5 * 60);
const DEFAULT_STATE_BROADCAST: Duration = Duration::from_secs(15);
const DEFAULT_PREROLL: Duration = Duration::from_secs(10 * 60);
const DEFAULT_CLOSING_GRACE: Duration = Duration::from_secs(10 * 60);
const DEFAULT_MIN_WATCH: Duration = Duration::from_secs(5 * 60);
const DEFAULT_CREDIT_SETTLE: Duration = Duration::from_secs(60 * 60);
const DEFAULT_CHANNEL_CAPACITY: usize = 16;
/// Upper bound for every window added to or subtracted from a timestamp.
const MAX_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    lifecycle_tick: Duration,
    credit_sweep: Duration,
    state_broadcast: Duration,
    preroll: Duration,
    closing_grace: Duration,
    min_watch: Duration,
    credit_settle: Duration,
    channel_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        lifecycle_tick = ?app_config.lifecycle_tick,
                        credit_sweep = ?app_config.credit_sweep,
                        "loaded scheduler configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Period of the lifecycle tick.
    pub fn lifecycle_tick(&self) -> Duration {
        self.lifecycle_tick
    }

    /// Period of the view credit sweep.
    pub fn credit_sweep(&self) -> Duration {
        self.credit_sweep
    }

    /// Period of the playback state re-broadcast.
    pub fn state_broadcast(&self) -> Duration {
        self.state_broadcast
    }

    /// Lobby and closing windows around each screening.
    pub fn lifecycle_windows(&self) -> LifecycleWindows {
        LifecycleWindows {
            preroll: span(self.preroll),
            closing_grace: span(self.closing_grace),
        }
    }

    /// Shortest enter/leave pair that earns a view.
    pub fn min_watch(&self) -> time::Duration {
        span(self.min_watch)
    }

    /// How long a closed session must have been left before the sweep picks it up.
    pub fn credit_settle(&self) -> time::Duration {
        span(self.credit_settle)
    }

    /// Buffer size of each per-screening broadcast channel.
    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every field is optional and expressed in whole seconds.
struct RawConfig {
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    lifecycle_tick: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    credit_sweep: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    state_broadcast: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    preroll: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    closing_grace: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    min_watch: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    credit_settle: Option<Duration>,
    #[serde(default)]
    channel_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        // Zero periods would make `tokio::time::interval` panic.
        let period = |value: Option<Duration>, default: Duration| {
            value.filter(|period| !period.is_zero()).unwrap_or(default)
        };
        let window = |name: &'static str, value: Option<Duration>, default: Duration| {
            let window = value.unwrap_or(default);
            if window > MAX_WINDOW {
                warn!(
                    setting = name,
                    configured = ?window,
                    capped = ?MAX_WINDOW,
                    "window too large; capping"
                );
                return MAX_WINDOW;
            }
            window
        };

        Self {
            lifecycle_tick: period(value.lifecycle_tick, DEFAULT_LIFECYCLE_TICK),
            credit_sweep: period(value.credit_sweep, DEFAULT_CREDIT_SWEEP),
            state_broadcast: period(value.state_broadcast, DEFAULT_STATE_BROADCAST),
            preroll: window("preroll", value.preroll, DEFAULT_PREROLL),
            closing_grace: window("closing_grace", value.closing_grace, DEFAULT_CLOSING_GRACE),
            min_watch: window("min_watch", value.min_watch, DEFAULT_MIN_WATCH),
            credit_settle: window("credit_settle", value.credit_settle, DEFAULT_CREDIT_SETTLE),
            channel_capacity: value
                .channel_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_cadences() {
        let config = AppConfig::default();
        assert_eq!(config.lifecycle_tick(), Duration::from_secs(10));
        assert_eq!(config.credit_sweep(), Duration::from_secs(300));
        assert_eq!(config.state_broadcast(), Duration::from_secs(15));
        assert_eq!(config.lifecycle_windows(), LifecycleWindows::default());
        assert_eq!(config.min_watch(), time::Duration::minutes(5));
        assert_eq!(config.credit_settle(), time::Duration::hours(1));
        assert_eq!(config.channel_capacity(), 16);
    }

    #[test]
    fn partial_files_override_only_listed_fields() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "lifecycle_tick": 2, "min_watch": 600 }"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.lifecycle_tick(), Duration::from_secs(2));
        assert_eq!(config.min_watch(), time::Duration::minutes(10));
        assert_eq!(config.credit_sweep(), Duration::from_secs(300));
    }

    #[test]
    fn zero_periods_fall_back_to_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "credit_sweep": 0, "channel_capacity": 0 }"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.credit_sweep(), Duration::from_secs(300));
        assert_eq!(config.channel_capacity(), 16);
    }

    #[test]
    fn oversized_windows_are_capped_to_a_week() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "preroll": 1000000000000, "closing_grace": 1000000000000, "credit_settle": 1000000000000 }"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();
        let week = time::Duration::days(7);
        assert_eq!(config.lifecycle_windows().preroll, week);
        assert_eq!(config.lifecycle_windows().closing_grace, week);
        assert_eq!(config.credit_settle(), week);

        // The capped windows keep lifecycle arithmetic in range.
        let now = time::macros::datetime!(2025-03-01 20:00 UTC);
        for edge in crate::state::lifecycle::TICK_ORDER {
            let _ = edge.condition(now, config.lifecycle_windows());
        }
    }
}
