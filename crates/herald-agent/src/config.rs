//! Runtime configuration, deserialised from `config.toml` overlaid by
//! `HERALD__*` environment variables.

use std::path::{Path, PathBuf};

use chrono::Duration;
use herald_core::{
  compose::MailComposer,
  event::AgentKind,
  rules::{ManagerAlertMode, RuleSettings},
  sweep::SweepSchedule,
};
use herald_mail::SmtpSettings;
use herald_mo::MoSettings;
use serde::Deserialize;
use uuid::Uuid;

pub const ENV_PREFIX: &str = "HERALD";

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
  #[serde(default = "default_host")]
  pub host:           String,
  #[serde(default = "default_port")]
  pub port:           u16,
  #[serde(default = "default_store_path")]
  pub store_path:     PathBuf,
  /// Agents to register at startup.
  #[serde(default)]
  pub active_agents:  Vec<AgentKind>,
  #[serde(default = "default_queue_capacity")]
  pub queue_capacity: usize,
  pub mo:             MoSettings,
  pub smtp:           SmtpSettings,
  #[serde(default)]
  pub email:          EmailConfig,
  #[serde(default)]
  pub rules:          RulesConfig,
  #[serde(default)]
  pub sweep:          SweepConfig,
  #[serde(default)]
  pub sent_cache:     SentCacheConfig,
}

fn default_host() -> String { "0.0.0.0".to_owned() }

fn default_port() -> u16 { 8000 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/herald/herald.db") }

fn default_queue_capacity() -> usize { 64 }

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
  pub sender:            String,
  /// Administrative receivers of manager and IT-user alerts.
  pub receivers:         Vec<String>,
  /// Blind copy of every message.
  pub bcc:               Vec<String>,
  pub receiver_override: Option<String>,
  /// Log messages instead of sending them.
  pub dry_run:           bool,
}

impl Default for EmailConfig {
  fn default() -> Self {
    Self {
      sender:            "os2mo@magenta.dk".to_owned(),
      receivers:         Vec::new(),
      bcc:               Vec::new(),
      receiver_override: None,
      dry_run:           false,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
  pub payroll_org_root_id:                   Option<Uuid>,
  pub use_org_unit_emails_for_manager_alert: bool,
  pub manager_alert_mode:                    ManagerAlertMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
  pub interval_seconds:           u64,
  pub pre_notification_lead_days: i64,
  pub completed_retention_days:   i64,
}

impl Default for SweepConfig {
  fn default() -> Self {
    Self {
      interval_seconds:           3600,
      pre_notification_lead_days: 14,
      completed_retention_days:   30,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentCacheBackend {
  Memory,
  #[default]
  Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SentCacheConfig {
  pub backend:   SentCacheBackend,
  /// Entry bound of the memory backend.
  pub capacity:  usize,
  pub ttl_hours: i64,
}

impl Default for SentCacheConfig {
  fn default() -> Self {
    Self {
      backend:   SentCacheBackend::default(),
      capacity:  herald_core::cache::DEFAULT_CAPACITY,
      ttl_hours: 24 * 30,
    }
  }
}

impl AgentConfig {
  /// Read `path` (optional) and the environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    Self::from_source(config::File::from(path).required(false))
  }

  /// Overlay the environment on `source` and deserialise.
  pub fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
  where
    S: config::Source + Send + Sync + 'static,
  {
    config::Config::builder()
      .add_source(source)
      .add_source(
        config::Environment::with_prefix(ENV_PREFIX)
          .prefix_separator("__")
          .separator("__")
          .list_separator(",")
          .with_list_parse_key("active_agents")
          .with_list_parse_key("email.receivers")
          .with_list_parse_key("email.bcc")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  pub fn rule_settings(&self) -> RuleSettings {
    RuleSettings {
      payroll_org_root_id:                   self.rules.payroll_org_root_id,
      use_org_unit_emails_for_manager_alert: self.rules.use_org_unit_emails_for_manager_alert,
      manager_alert_mode:                    self.rules.manager_alert_mode,
      admin_receivers:                       self.email.receivers.iter().cloned().collect(),
    }
  }

  pub fn composer(&self) -> MailComposer {
    MailComposer::new(self.email.sender.clone())
      .with_bcc(self.email.bcc.iter().cloned())
      .with_receiver_override(self.email.receiver_override.clone())
  }

  pub fn sweep_schedule(&self) -> SweepSchedule {
    SweepSchedule {
      lead_time:           Duration::days(self.sweep.pre_notification_lead_days),
      completed_retention: Duration::days(self.sweep.completed_retention_days),
    }
  }

  pub fn sweep_interval(&self) -> std::time::Duration {
    std::time::Duration::from_secs(self.sweep.interval_seconds.max(1))
  }

  pub fn sent_ttl(&self) -> Duration { Duration::hours(self.sent_cache.ttl_hours) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
