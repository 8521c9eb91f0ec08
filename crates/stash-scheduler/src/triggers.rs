//! Sweep kinds and their cron triggers.

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use stash_core::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// What a sweep refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SweepKind {
    /// Every entry of one provider.
    Provider { provider: String },
    /// Every entry of a group of providers, one provider after another.
    Family { providers: Vec<String> },
    /// The most urgent expired entries. Falls back to the configured batch
    /// size when unset.
    Expired {
        #[serde(default)]
        batch_size: Option<u32>,
    },
    /// Every entry, expired or not.
    All,
    /// Delete entries unread for this many days. Falls back to the
    /// configured threshold when unset.
    Purge {
        #[serde(default)]
        days: Option<u32>,
    },
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepKind::Provider { provider } => write!(f, "provider:{}", provider),
            SweepKind::Family { providers } => write!(f, "family:{}", providers.join(",")),
            SweepKind::Expired { .. } => f.write_str("expired"),
            SweepKind::All => f.write_str("all"),
            SweepKind::Purge { .. } => f.write_str("purge"),
        }
    }
}

/// A named, scheduled sweep as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub name: String,
    /// Six-field cron expression (seconds first), evaluated in UTC.
    pub schedule: String,
    #[serde(flatten)]
    pub kind: SweepKind,
}

impl SweepConfig {
    pub fn new(name: impl Into<String>, schedule: impl Into<String>, kind: SweepKind) -> Self {
        Self {
            name: name.into(),
            schedule: schedule.into(),
            kind,
        }
    }
}

/// A sweep with its parsed schedule.
#[derive(Debug, Clone)]
pub struct Trigger {
    config: SweepConfig,
    schedule: Schedule,
}

impl Trigger {
    pub fn parse(config: SweepConfig) -> Result<Self> {
        let schedule = Schedule::from_str(&config.schedule).map_err(|e| {
            Error::Config(format!(
                "Invalid schedule '{}' for sweep {}: {}",
                config.schedule, config.name, e
            ))
        })?;
        Ok(Self { config, schedule })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn kind(&self) -> &SweepKind {
        &self.config.kind
    }

    /// Next fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

/// Sweeps used when configuration names none: expired entries every fifteen
/// minutes, purge nightly.
pub fn default_sweeps() -> Vec<SweepConfig> {
    vec![
        SweepConfig::new(
            "expired",
            "0 */15 * * * *",
            SweepKind::Expired { batch_size: None },
        ),
        SweepConfig::new("purge", "0 30 3 * * *", SweepKind::Purge { days: None }),
    ]
}
