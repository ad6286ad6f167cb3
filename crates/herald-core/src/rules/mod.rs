//! The notification rule engine.
//!
//! One evaluation routine per agent. Each is a short-circuiting sequence of
//! guards: a guard either suppresses with a logged [`SuppressReason`] or lets
//! evaluation continue. Collaborator failures propagate as errors.

pub(crate) mod address;
pub(crate) mod ituser;
pub(crate) mod manager;
pub(crate) mod org_unit;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  event::{AgentKind, Event, EventKind},
  intent::{Outcome, SentMarker, SuppressReason},
  source::DataSource,
  store::{NotificationStore, SentCache},
  template::Templates,
};

pub use manager::ManagerAlert;

/// A guard's verdict inside a rule: continue with `T` or stop.
pub type Decision<T> = std::result::Result<T, SuppressReason>;

/// How manager-removal events are turned into alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerAlertMode {
  /// Record the removal and let the periodic sweep send both phases.
  #[default]
  Deferred,
  /// Send a single alert inline once the removal has taken effect.
  Immediate,
}

/// The settings that change rule behaviour.
#[derive(Debug, Clone, Default)]
pub struct RuleSettings {
  /// Root of the payroll hierarchy checked by the org-unit relation rule.
  pub payroll_org_root_id:                   Option<Uuid>,
  /// Send manager alerts to the institution's addresses instead of
  /// `admin_receivers`.
  pub use_org_unit_emails_for_manager_alert: bool,
  pub manager_alert_mode:                    ManagerAlertMode,
  /// Fixed administrative distribution list.
  pub admin_receivers:                       BTreeSet<String>,
}

/// Rules bound to their collaborators.
pub struct RuleEngine<D, S, C> {
  source:    D,
  store:     S,
  sent:      C,
  templates: Templates,
  settings:  RuleSettings,
}

impl<D, S, C> RuleEngine<D, S, C>
where
  D: DataSource,
  S: NotificationStore,
  C: SentCache,
{
  pub fn new(source: D, store: S, sent: C, settings: RuleSettings) -> Result<Self> {
    Ok(Self { source, store, sent, templates: Templates::new()?, settings })
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn source(&self) -> &D { &self.source }

  pub fn settings(&self) -> &RuleSettings { &self.settings }

  /// Run `agent`'s rule for `event` as of `now`.
  pub async fn evaluate(
    &self,
    agent: AgentKind,
    event: &Event,
    now: DateTime<Utc>,
  ) -> Result<Outcome> {
    tracing::debug!(%agent, kind = %event.kind, uuid = %event.uuid, "evaluating rule");
    match agent {
      AgentKind::AddressCreated => {
        if event.object_uuid == Some(event.uuid) {
          return Ok(Outcome::suppress(
            address::RULE,
            SuppressReason::EmployeeCreationEvent,
          ));
        }
        self.address_created(event.object(), now).await
      }
      AgentKind::ManagerRemoved => self.manager_changed(event.object(), now).await,
      AgentKind::OrgUnitMissingRelation => self.org_unit_changed(event.object(), now).await,
      AgentKind::ItuserChanged => match event.kind {
        EventKind::Rolebinding => self.rolebinding_changed(event.object(), now).await,
        _ => self.ituser_changed(event.object(), now).await,
      },
    }
  }

  /// Record that the notification carrying `marker` was dispatched.
  pub async fn commit(&self, marker: SentMarker, at: DateTime<Utc>) -> Result<()> {
    self
      .sent
      .record_sent(marker.entity_id, marker.content, at)
      .await
      .map_err(Error::store)
  }
}

/// Turn a rule's decision into an [`Outcome`], logging suppressions.
fn settle<T>(rule: &'static str, decision: Decision<T>) -> Outcome
where
  T: Into<crate::intent::Notification>,
{
  match decision {
    Ok(notification) => Outcome::notify(notification),
    Err(reason) => Outcome::suppress(rule, reason),
  }
}
