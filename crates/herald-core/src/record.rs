//! `NotificationRecord`: the persisted state of a deferred manager alert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which manager-removal case produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalKind {
  /// The assignment has an end date.
  Terminated,
  /// The assignment has neither person nor end date; its start counts as the
  /// removal date.
  Vacant,
}

/// The two delivery phases of a deferred manager alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  /// Sent ahead of the end date, within the configured lead time.
  Pre,
  /// Sent once the end date has passed.
  Main,
}

/// A pending or completed manager-removal notification, keyed by
/// `manager_assignment_id`. At most one exists per assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
  pub manager_assignment_id: Uuid,
  /// `None` for vacant assignments.
  pub employee_id:           Option<Uuid>,
  pub org_unit_id:           Uuid,
  pub kind:                  RemovalKind,
  pub end_date:              DateTime<Utc>,
  pub pre_notification_sent: bool,
  pub notification_sent:     bool,
  /// When the main notification went out; retention runs from here.
  pub notification_sent_at:  Option<DateTime<Utc>>,
  pub created_at:            DateTime<Utc>,
}

impl NotificationRecord {
  /// A fresh record with neither phase sent.
  pub fn new(
    manager_assignment_id: Uuid,
    employee_id: Option<Uuid>,
    org_unit_id: Uuid,
    kind: RemovalKind,
    end_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      manager_assignment_id,
      employee_id,
      org_unit_id,
      kind,
      end_date,
      pre_notification_sent: false,
      notification_sent: false,
      notification_sent_at: None,
      created_at,
    }
  }

  /// Two records describe the same outstanding notification iff they agree on
  /// the assignment and the end date.
  pub fn is_same_notification(&self, other: &Self) -> bool {
    self.manager_assignment_id == other.manager_assignment_id
      && self.end_date == other.end_date
  }

  pub fn is_sent(&self, phase: Phase) -> bool {
    match phase {
      Phase::Pre => self.pre_notification_sent,
      Phase::Main => self.notification_sent,
    }
  }
}
