//! Scheduler configuration, loaded from a TOML file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SchedulerError};
use crate::message::normalize_address;
use crate::slots::WorkingHours;

fn default_poll_interval() -> u64 {
    30
}

fn default_start_hour() -> u32 {
    9
}

fn default_end_hour() -> u32 {
    17
}

/// Mailbox access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Account the fetcher reads unread mail from.
    pub username: String,
}

/// Daily bookable hours, whole hours in the calendar's zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHoursConfig {
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,
    #[serde(default = "default_end_hour")]
    pub end_hour: u32,
}

impl Default for WorkingHoursConfig {
    fn default() -> Self {
        Self {
            start_hour: default_start_hour(),
            end_hour: default_end_hour(),
        }
    }
}

/// Calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Calendar to check availability against and book events on.
    pub calendar_id: String,
    #[serde(default)]
    pub working_hours: WorkingHoursConfig,
}

/// Top-level scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Only messages involving this address (as sender, cc, or bcc) are
    /// processed.
    pub authorized_user: String,
    pub mailbox: MailboxConfig,
    pub calendar: CalendarConfig,
    /// Seconds to wait after an idle or failed mailbox poll.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl SchedulerConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Check field-level invariants beyond what deserialization enforces.
    pub fn validate(&self) -> Result<()> {
        // Both calls only validate here; their results are rebuilt on use.
        normalize_address(&self.authorized_user)?;
        self.working_hours()?;
        if self.poll_interval_secs == 0 {
            return Err(SchedulerError::Config {
                reason: "poll_interval_secs must be positive".into(),
            });
        }
        if self.calendar.calendar_id.trim().is_empty() {
            return Err(SchedulerError::Config {
                reason: "calendar.calendar_id must not be empty".into(),
            });
        }
        Ok(())
    }

    /// The authorized user's normalized address.
    pub fn normalized_user(&self) -> Result<String> {
        normalize_address(&self.authorized_user)
    }

    /// The validated working-hours window.
    pub fn working_hours(&self) -> Result<WorkingHours> {
        WorkingHours::new(
            self.calendar.working_hours.start_hour,
            self.calendar.working_hours.end_hour,
        )
    }

    /// Backoff between mailbox polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> &'static str {
        r#"
            authorized_user = "Alice <Alice@Example.com>"
            poll_interval_secs = 10

            [mailbox]
            username = "bot@example.com"

            [calendar]
            calendar_id = "primary"

            [calendar.working_hours]
            start_hour = 8
            end_hour = 18
        "#
    }

    #[test]
    fn loads_and_normalizes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample().as_bytes()).unwrap();

        let config = SchedulerConfig::load(file.path()).unwrap();
        assert_eq!(config.normalized_user().unwrap(), "alice@example.com");
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        let hours = config.working_hours().unwrap();
        assert_eq!(hours.start_hour(), 8);
        assert_eq!(hours.end_hour(), 18);
    }

    #[test]
    fn working_hours_default_to_nine_to_five() {
        let config: SchedulerConfig = toml::from_str(
            r#"
                authorized_user = "a@x.io"
                [mailbox]
                username = "bot@x.io"
                [calendar]
                calendar_id = "primary"
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        let hours = config.working_hours().unwrap();
        assert_eq!(hours.start_hour(), 9);
        assert_eq!(hours.end_hour(), 17);
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn rejects_bad_values() {
        let mut config: SchedulerConfig = toml::from_str(
            r#"
                authorized_user = "not an address"
                [mailbox]
                username = "bot@x.io"
                [calendar]
                calendar_id = "primary"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        config.authorized_user = "a@x.io".into();
        config.calendar.working_hours.end_hour = 25;
        assert!(config.validate().is_err());

        config.calendar.working_hours.end_hour = 17;
        config.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        config.poll_interval_secs = 30;
        config.calendar.calendar_id = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SchedulerConfig::load(Path::new("/nonexistent/meetflow.toml")).unwrap_err();
        assert!(matches!(err, SchedulerError::Io(_)));
    }
}
