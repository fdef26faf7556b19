use std::time::Duration;
use thiserror::Error;

use crate::event::RoomPolicy;
use crate::room::cleanup_task::CleanupConfig;
use crate::websockets::HeartbeatConfig;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}

/// Process-wide settings, read once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub heartbeat: HeartbeatConfig,
    pub cleanup: CleanupConfig,
    pub room_policy: RoomPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            heartbeat: HeartbeatConfig::default(),
            cleanup: CleanupConfig::default(),
            room_policy: RoomPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Builds the config from the process environment, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_or(&lookup, "PORT", defaults.port)?;

        let heartbeat = HeartbeatConfig {
            interval: secs_or(
                &lookup,
                "HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat.interval,
            )?,
            max_missed: parse_or(
                &lookup,
                "HEARTBEAT_MAX_MISSED",
                defaults.heartbeat.max_missed,
            )?,
        };

        let cleanup = CleanupConfig {
            cleanup_interval: secs_or(
                &lookup,
                "REAPER_INTERVAL_SECS",
                defaults.cleanup.cleanup_interval,
            )?,
            idle_grace: secs_or(
                &lookup,
                "REAPER_IDLE_GRACE_SECS",
                defaults.cleanup.idle_grace,
            )?,
        };

        let room_policy = RoomPolicy {
            min_players_to_start: parse_or(
                &lookup,
                "MIN_PLAYERS_TO_START",
                defaults.room_policy.min_players_to_start,
            )?,
            close_room_on_presenter_disconnect: parse_or(
                &lookup,
                "CLOSE_ROOM_ON_PRESENTER_DISCONNECT",
                defaults.room_policy.close_room_on_presenter_disconnect,
            )?,
        };

        if heartbeat.interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HEARTBEAT_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }
        if cleanup.cleanup_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "REAPER_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            port,
            heartbeat,
            cleanup,
            room_policy,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}

fn secs_or<F>(lookup: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, name, default.as_secs()).map(Duration::from_secs)
}
