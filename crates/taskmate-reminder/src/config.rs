use std::str::FromStr;
use std::time::Duration;

/// Whether fired reminders are remembered between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicy {
    /// Fire on every poll while the threshold condition holds.
    Off,
    /// Fire each threshold once per (task, due date). Persisted in the store.
    #[default]
    PerThreshold,
}

impl FromStr for DedupPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "per-threshold" | "per_threshold" => Ok(Self::PerThreshold),
            other => Err(anyhow::anyhow!(
                "invalid dedup policy '{}' (expected 'off' or 'per-threshold')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub interval: Duration,
    pub send_timeout: Duration,
    /// Total attempts per notification, including the first. Clamped to >= 1.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_backoff: Duration,
    pub dedup: DedupPolicy,
    pub skip_completed: bool,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            send_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            dedup: DedupPolicy::PerThreshold,
            skip_completed: false,
        }
    }
}
