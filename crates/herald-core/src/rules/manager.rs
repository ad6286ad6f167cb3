//! Manager-removed: alert administrators when a manager role ends or becomes
//! vacant, either inline or through the deferred two-phase schedule.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use minijinja::context;
use uuid::Uuid;

use super::{Decision, ManagerAlertMode, RuleEngine};
use crate::{
  Error, Result,
  entity::ManagerAssignment,
  fetch::Fetcher,
  intent::{ContentType, NotificationIntent, Outcome, SuppressReason, TrackOutcome},
  record::{NotificationRecord, Phase, RemovalKind},
  source::DataSource,
  store::{NotificationStore, SentCache},
  template::TemplateId,
};

const RULE: &str = "manager-removed";

pub const SUBJECT_PRE: &str = "En medarbejder fjernes fra lederfanen";
pub const SUBJECT_MAIN: &str = "En medarbejder er blevet fjernet fra lederfanen";

const VACANT_MANAGER: &str = "Vacant manager";
const UNKNOWN_EMPLOYEE: &str = "Unknown employee";

/// Everything needed to render a manager alert, from an event or a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerAlert {
  pub employee_id:    Option<Uuid>,
  pub org_unit_id:    Uuid,
  pub kind:           RemovalKind,
  pub effective_date: DateTime<Utc>,
}

impl From<&NotificationRecord> for ManagerAlert {
  fn from(record: &NotificationRecord) -> Self {
    Self {
      employee_id:    record.employee_id,
      org_unit_id:    record.org_unit_id,
      kind:           record.kind,
      effective_date: record.end_date,
    }
  }
}

/// Classify an assignment into a removal, or decide it is still staffed.
fn classify(assignment: &ManagerAssignment) -> Result<Decision<ManagerAlert>> {
  let (kind, effective_date) = match (assignment.to_date(), assignment.employee_id) {
    (None, Some(_)) => return Ok(Err(SuppressReason::StillEmployed)),
    // A vacant slot's start is the old manager's termination date.
    (None, None) => match assignment.validity.from {
      Some(from) => (RemovalKind::Vacant, from),
      None => {
        return Err(Error::DataIntegrity(format!(
          "vacant manager {} has no start date",
          assignment.manager_id
        )));
      }
    },
    (Some(to), _) => (RemovalKind::Terminated, to),
  };

  Ok(Ok(ManagerAlert {
    employee_id: assignment.employee_id,
    org_unit_id: assignment.org_unit_id,
    kind,
    effective_date,
  }))
}

impl<D, S, C> RuleEngine<D, S, C>
where
  D: DataSource,
  S: NotificationStore,
  C: SentCache,
{
  pub async fn manager_changed(&self, manager_id: Uuid, now: DateTime<Utc>) -> Result<Outcome> {
    let fetch = Fetcher::new(&self.source, now);

    let Some(assignment) = fetch.fetch_manager(manager_id).await? else {
      return Ok(Outcome::suppress(RULE, SuppressReason::ManagerNotFound));
    };
    let alert = match classify(&assignment)? {
      Ok(alert) => alert,
      Err(reason) => return Ok(Outcome::suppress(RULE, reason)),
    };
    tracing::info!(
      manager = %manager_id,
      kind = ?alert.kind,
      effective_date = %alert.effective_date,
      "manager removal classified"
    );

    match self.settings.manager_alert_mode {
      ManagerAlertMode::Immediate => {
        if alert.effective_date > now {
          return Ok(Outcome::suppress(RULE, SuppressReason::RemovalInFuture));
        }
        Ok(match self.manager_alert(&alert, Phase::Main, now).await? {
          Ok(intent) => Outcome::notify(intent),
          Err(reason) => Outcome::suppress(RULE, reason),
        })
      }
      ManagerAlertMode::Deferred => self.track_removal(manager_id, &alert, now).await,
    }
  }

  async fn track_removal(
    &self,
    manager_id: Uuid,
    alert: &ManagerAlert,
    now: DateTime<Utc>,
  ) -> Result<Outcome> {
    let candidate = NotificationRecord::new(
      manager_id,
      alert.employee_id,
      alert.org_unit_id,
      alert.kind,
      alert.effective_date,
      now,
    );

    match self.store.track(candidate.clone()).await.map_err(Error::store)? {
      TrackOutcome::Duplicate => Ok(Outcome::suppress(RULE, SuppressReason::AlreadyTracked)),
      TrackOutcome::Inserted => {
        tracing::info!(manager = %manager_id, end_date = %candidate.end_date, "manager removal tracked");
        Ok(Outcome::Tracked(candidate))
      }
      TrackOutcome::Replaced { previous } => {
        tracing::info!(
          manager = %manager_id,
          previous_end_date = %previous.end_date,
          end_date = %candidate.end_date,
          "manager removal end date changed; tracking replaced"
        );
        Ok(Outcome::Tracked(candidate))
      }
    }
  }

  /// Render the alert for `alert` in `phase`, resolving name, location and
  /// recipients from the data source as of `now`.
  pub async fn manager_alert(
    &self,
    alert: &ManagerAlert,
    phase: Phase,
    now: DateTime<Utc>,
  ) -> Result<Decision<NotificationIntent>> {
    let fetch = Fetcher::new(&self.source, now);

    let name = match (alert.employee_id, alert.kind) {
      (Some(id), _) => fetch
        .fetch_employee(id)
        .await?
        .map(|e| e.name)
        .unwrap_or_else(|| UNKNOWN_EMPLOYEE.to_owned()),
      (None, RemovalKind::Vacant) => VACANT_MANAGER.to_owned(),
      (None, RemovalKind::Terminated) => UNKNOWN_EMPLOYEE.to_owned(),
    };

    let Some(unit) = fetch.fetch_org_unit(alert.org_unit_id).await? else {
      return Ok(Err(SuppressReason::OrgUnitUnresolvable));
    };
    let location = fetch.fetch_org_unit_location(&unit).await?;

    let template = match alert.kind {
      RemovalKind::Terminated => TemplateId::ManagerTerminationAlert,
      RemovalKind::Vacant => TemplateId::ManagerVacantAlert,
    };
    let body = self.templates.render(
      template,
      context! {
        name => name,
        effective_date => alert.effective_date.date_naive().to_string(),
        location => location,
        org_unit_user_key => unit.user_key,
        upcoming => phase == Phase::Pre,
      },
    )?;

    let recipients: BTreeSet<String> = if self.settings.use_org_unit_emails_for_manager_alert {
      match unit.root_id {
        Some(root) => fetch
          .institution_addresses(unit.org_unit_id, root)
          .await?
          .into_iter()
          .collect(),
        None => BTreeSet::new(),
      }
    } else {
      self.settings.admin_receivers.clone()
    };
    if recipients.is_empty() {
      return Ok(Err(SuppressReason::NoRecipients));
    }

    let subject = match phase {
      Phase::Pre => SUBJECT_PRE,
      Phase::Main => SUBJECT_MAIN,
    };

    Ok(Ok(NotificationIntent {
      recipients,
      cc: BTreeSet::new(),
      subject: subject.to_owned(),
      body,
      content_type: ContentType::Html,
    }))
  }
}
