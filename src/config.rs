//! Kiosk configuration management
//!
//! Loads polling intervals, idle timeouts and hardware thresholds from
//! environment variables with validation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and threshold configuration for the session core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskConfig {
    /// How often the card/auth status is polled (milliseconds)
    pub auth_poll_interval_ms: u64,

    /// How often the paper-handler status is polled (milliseconds)
    pub paper_poll_interval_ms: u64,

    /// How often battery and accessory presence are polled (milliseconds)
    pub device_poll_interval_ms: u64,

    /// Voter inactivity before the "are you still voting?" prompt (seconds)
    pub idle_timeout_seconds: u64,

    /// Time the prompt stays up before the voter session is ended (seconds)
    pub idle_reset_timeout_seconds: u64,

    /// Inactivity on the insert-card screen before the machine powers down (seconds)
    pub quit_kiosk_idle_seconds: u64,

    /// How long post-voting instructions stay on screen (seconds)
    pub post_voting_instructions_seconds: u64,

    /// Delay before the error screen offers a restart (seconds)
    pub error_restart_delay_seconds: u64,

    /// Battery fraction below which a discharging machine shows the power screen
    pub low_battery_threshold: f64,

    /// Debounce before a changed ballot is checkpointed to storage (milliseconds)
    pub vote_save_delay_ms: u64,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            auth_poll_interval_ms: 300,
            paper_poll_interval_ms: 300,
            device_poll_interval_ms: 1000,
            idle_timeout_seconds: 300,           // 5 minutes
            idle_reset_timeout_seconds: 45,
            quit_kiosk_idle_seconds: 300,        // 5 minutes
            post_voting_instructions_seconds: 12,
            error_restart_delay_seconds: 5,
            low_battery_threshold: 0.25,
            vote_save_delay_ms: 1000,
        }
    }
}

impl KioskConfig {
    /// Load kiosk configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();

        let config = Self {
            auth_poll_interval_ms: env_or("KIOSK_AUTH_POLL_INTERVAL_MS", defaults.auth_poll_interval_ms)?,
            paper_poll_interval_ms: env_or("KIOSK_PAPER_POLL_INTERVAL_MS", defaults.paper_poll_interval_ms)?,
            device_poll_interval_ms: env_or("KIOSK_DEVICE_POLL_INTERVAL_MS", defaults.device_poll_interval_ms)?,
            idle_timeout_seconds: env_or("KIOSK_IDLE_TIMEOUT_SECONDS", defaults.idle_timeout_seconds)?,
            idle_reset_timeout_seconds: env_or(
                "KIOSK_IDLE_RESET_TIMEOUT_SECONDS",
                defaults.idle_reset_timeout_seconds,
            )?,
            quit_kiosk_idle_seconds: env_or("KIOSK_QUIT_IDLE_SECONDS", defaults.quit_kiosk_idle_seconds)?,
            post_voting_instructions_seconds: env_or(
                "KIOSK_POST_VOTING_INSTRUCTIONS_SECONDS",
                defaults.post_voting_instructions_seconds,
            )?,
            error_restart_delay_seconds: env_or(
                "KIOSK_ERROR_RESTART_DELAY_SECONDS",
                defaults.error_restart_delay_seconds,
            )?,
            low_battery_threshold: env_or("KIOSK_LOW_BATTERY_THRESHOLD", defaults.low_battery_threshold)?,
            vote_save_delay_ms: env_or("KIOSK_VOTE_SAVE_DELAY_MS", defaults.vote_save_delay_ms)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration for testing with short timeouts
    pub fn for_testing() -> Self {
        Self {
            auth_poll_interval_ms: 50,
            paper_poll_interval_ms: 50,
            device_poll_interval_ms: 100,
            idle_timeout_seconds: 10,
            idle_reset_timeout_seconds: 5,
            quit_kiosk_idle_seconds: 30,
            post_voting_instructions_seconds: 3,
            error_restart_delay_seconds: 2,
            low_battery_threshold: 0.25,
            vote_save_delay_ms: 100,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.auth_poll_interval_ms == 0 || self.paper_poll_interval_ms == 0 || self.device_poll_interval_ms == 0 {
            return Err(Error::config("Polling intervals must be non-zero"));
        }

        if self.idle_timeout_seconds == 0 || self.idle_reset_timeout_seconds == 0 {
            return Err(Error::config("Idle timeouts must be non-zero"));
        }

        if self.quit_kiosk_idle_seconds == 0 {
            return Err(Error::config("Kiosk idle timeout must be non-zero"));
        }

        if self.vote_save_delay_ms == 0 {
            return Err(Error::config("Vote save delay must be non-zero"));
        }

        if !(0.0..=1.0).contains(&self.low_battery_threshold) {
            return Err(Error::config("Low battery threshold must be between 0 and 1"));
        }

        Ok(())
    }

    pub fn auth_poll_interval(&self) -> Duration {
        Duration::from_millis(self.auth_poll_interval_ms)
    }

    pub fn paper_poll_interval(&self) -> Duration {
        Duration::from_millis(self.paper_poll_interval_ms)
    }

    pub fn device_poll_interval(&self) -> Duration {
        Duration::from_millis(self.device_poll_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub fn idle_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_reset_timeout_seconds)
    }

    pub fn quit_kiosk_idle(&self) -> Duration {
        Duration::from_secs(self.quit_kiosk_idle_seconds)
    }

    pub fn post_voting_instructions_timeout(&self) -> Duration {
        Duration::from_secs(self.post_voting_instructions_seconds)
    }

    pub fn error_restart_delay(&self) -> Duration {
        Duration::from_secs(self.error_restart_delay_seconds)
    }

    pub fn vote_save_delay(&self) -> Duration {
        Duration::from_millis(self.vote_save_delay_ms)
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::config(format!("Invalid {name}"))),
        Err(_) => Ok(default),
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub kiosk: KioskConfig,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self> {
        let kiosk = KioskConfig::from_env()?;

        let logging = LoggingConfig {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "full".to_string()),
        };

        Ok(Self { kiosk, logging })
    }

    /// Create configuration for testing
    pub fn for_testing() -> Self {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            format: "compact".to_string(),
        };

        Self {
            kiosk: KioskConfig::for_testing(),
            logging,
        }
    }
}
