use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use taskmate_reminder::{DedupPolicy, ReminderConfig};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct MailConfig {
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
    pub from: String,
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub reminder: ReminderConfig,
    pub mail: MailConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("TASKMATE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("TASKMATE_JWT_SECRET is unset or still a placeholder");
        }

        let defaults = ReminderConfig::default();
        let reminder = ReminderConfig {
            interval: Duration::from_secs(parse_or(&get, "TASKMATE_REMINDER_INTERVAL_SECS", 60)?),
            send_timeout: Duration::from_secs(parse_or(&get, "TASKMATE_REMINDER_SEND_TIMEOUT_SECS", 10)?),
            max_attempts: parse_or(&get, "TASKMATE_REMINDER_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_backoff: defaults.retry_backoff,
            dedup: parse_or(&get, "TASKMATE_REMINDER_DEDUP", DedupPolicy::PerThreshold)?,
            skip_completed: parse_or(&get, "TASKMATE_REMINDER_SKIP_COMPLETED", false)?,
        };
        if reminder.interval.is_zero() {
            bail!("TASKMATE_REMINDER_INTERVAL_SECS must be at least 1");
        }
        if reminder.send_timeout.is_zero() {
            bail!("TASKMATE_REMINDER_SEND_TIMEOUT_SECS must be at least 1");
        }

        Ok(Self {
            host: get("TASKMATE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "TASKMATE_PORT", 3000)?,
            db_path: get("TASKMATE_DB_PATH").unwrap_or_else(|| "taskmate.db".into()).into(),
            jwt_secret,
            reminder,
            mail: MailConfig {
                relay_url: get("TASKMATE_MAIL_RELAY_URL"),
                relay_token: get("TASKMATE_MAIL_RELAY_TOKEN"),
                from: get("TASKMATE_MAIL_FROM").unwrap_or_else(|| "reminders@taskmate.local".into()),
            },
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid value '{}' for {}", raw, key)),
        None => Ok(default),
    }
}
