//! Rule outcomes: suppressions, notification intents and tracked records.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::NotificationRecord;

/// MIME subtype of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
  Plain,
  Html,
}

/// The fully-resolved recipients and content of one email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
  pub recipients:   BTreeSet<String>,
  pub cc:           BTreeSet<String>,
  pub subject:      String,
  pub body:         String,
  pub content_type: ContentType,
}

/// A LastSentCache entry to commit once the notification has been dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMarker {
  pub entity_id: Uuid,
  pub content:   serde_json::Value,
}

/// An intent plus whatever bookkeeping depends on its successful delivery.
#[derive(Debug, Clone)]
pub struct Notification {
  pub intent: NotificationIntent,
  pub marker: Option<SentMarker>,
}

impl From<NotificationIntent> for Notification {
  fn from(intent: NotificationIntent) -> Self { Self { intent, marker: None } }
}

/// Why a rule decided not to notify anyone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressReason {
  AddressNotFound,
  NotEmployeeAddress,
  NotEmailAddress,
  EmployeeNotFound,
  PreviousEmailExists,
  NoValidEmail,
  ManagerNotFound,
  StillEmployed,
  RemovalInFuture,
  OrgUnitUnresolvable,
  OrgUnitNotFound,
  OutsideTrackedHierarchy,
  NoEngagements,
  CrossHierarchyRelation,
  RoleBindingUnresolvable,
  ItUserNotFound,
  DuplicateNotification,
  AlreadyTracked,
  NoRecipients,
  EmployeeCreationEvent,
}

impl fmt::Display for SuppressReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::AddressNotFound => "address not found",
      Self::NotEmployeeAddress => "not an employee address",
      Self::NotEmailAddress => "not an email address",
      Self::EmployeeNotFound => "employee not found",
      Self::PreviousEmailExists => "a previous email address already exists",
      Self::NoValidEmail => "no valid email for this employee",
      Self::ManagerNotFound => "manager not found",
      Self::StillEmployed => "still currently employed",
      Self::RemovalInFuture => "removal date is in the future",
      Self::OrgUnitUnresolvable => "org unit no longer resolvable",
      Self::OrgUnitNotFound => "org unit not found",
      Self::OutsideTrackedHierarchy => "unit is outside the tracked hierarchy",
      Self::NoEngagements => "no engagements",
      Self::CrossHierarchyRelation => "has a cross-hierarchy relation",
      Self::RoleBindingUnresolvable => "possibly terminated/nonexistent",
      Self::ItUserNotFound => "it user not found",
      Self::DuplicateNotification => "duplicate of previous notification",
      Self::AlreadyTracked => "duplicate: notification already tracked",
      Self::NoRecipients => "no recipients",
      Self::EmployeeCreationEvent => "event refers to the employee, not an address",
    })
  }
}

/// How a candidate record was reconciled against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
  Inserted,
  /// The previous record had a different end date and was replaced.
  Replaced { previous: NotificationRecord },
  /// An identical record is already tracked; nothing changed.
  Duplicate,
}

/// The result of evaluating one rule against one event.
#[derive(Debug, Clone)]
pub enum Outcome {
  Suppressed(SuppressReason),
  Notify(Box<Notification>),
  /// A deferred manager alert was recorded for the periodic sweep.
  Tracked(NotificationRecord),
}

impl Outcome {
  /// Log and build a suppression.
  pub(crate) fn suppress(rule: &'static str, reason: SuppressReason) -> Self {
    tracing::info!(rule, %reason, "notification suppressed");
    Self::Suppressed(reason)
  }

  pub(crate) fn notify(notification: impl Into<Notification>) -> Self {
    Self::Notify(Box::new(notification.into()))
  }

  pub fn is_suppressed(&self) -> bool { matches!(self, Self::Suppressed(_)) }
}
