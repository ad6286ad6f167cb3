//! Entity snapshots: point-in-time views of master-data records.
//!
//! Snapshots are transient read results. They are built once at the data
//! source boundary and never mutated; nothing in this crate persists them
//! except as fields copied into a [`crate::record::NotificationRecord`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validity::{Timed, Validity};

// ─── Addresses ───────────────────────────────────────────────────────────────

/// The address-type scope reported by the master-data system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressScope {
  Email,
  Phone,
  Dar,
  Other(String),
}

impl AddressScope {
  /// Map the raw `address_type.scope` string.
  pub fn from_scope(scope: &str) -> Self {
    match scope {
      "EMAIL" => Self::Email,
      "PHONE" => Self::Phone,
      "DAR" => Self::Dar,
      other => Self::Other(other.to_owned()),
    }
  }

  pub fn is_email(&self) -> bool { matches!(self, Self::Email) }
}

/// An address value as embedded in an employee or org unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressValue {
  pub value: String,
  pub scope: AddressScope,
}

/// A standalone address entity, as referenced by an address event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
  pub address_id:  Uuid,
  pub value:       String,
  pub scope:       AddressScope,
  /// `None` when the address belongs to an org unit rather than a person.
  pub employee_id: Option<Uuid>,
  pub validity:    Validity,
}

// ─── People ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
  pub org_unit_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
  pub employee_id: Uuid,
  pub name:        String,
  pub addresses:   Vec<AddressValue>,
  pub engagements: Vec<Engagement>,
  pub validity:    Validity,
}

impl Employee {
  /// All EMAIL-scoped address values, unfiltered.
  pub fn email_addresses(&self) -> impl Iterator<Item = &str> {
    self
      .addresses
      .iter()
      .filter(|a| a.scope.is_email())
      .map(|a| a.value.as_str())
  }
}

// ─── Organisation ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgUnit {
  pub org_unit_id: Uuid,
  pub name:        String,
  pub user_key:    String,
  pub parent_id:   Option<Uuid>,
  pub root_id:     Option<Uuid>,
  /// Employee ids of the unit's managers; `None` marks a vacant manager.
  pub managers:    Vec<Option<Uuid>>,
  pub validity:    Validity,
}

/// A manager role binding a (possibly vacant) person to an org unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerAssignment {
  pub manager_id:  Uuid,
  pub employee_id: Option<Uuid>,
  pub org_unit_id: Uuid,
  pub validity:    Validity,
}

/// The counterpart of a related-unit relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedUnit {
  pub org_unit_id: Uuid,
  pub root_id:     Option<Uuid>,
}

/// The relation view of an org unit used by the payroll hierarchy check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgUnitRelations {
  pub org_unit_id:   Uuid,
  pub name:          String,
  pub root_id:       Option<Uuid>,
  pub engagements:   Vec<Uuid>,
  pub related_units: Vec<RelatedUnit>,
  pub validity:      Validity,
}

// ─── IT ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItUser {
  pub ituser_id:     Uuid,
  pub user_key:      String,
  pub person_name:   Option<String>,
  pub itsystem_name: String,
  /// Role names from every role binding on the IT user.
  pub roles:         Vec<String>,
  pub validity:      Validity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleBinding {
  pub rolebinding_id: Uuid,
  pub ituser_id:      Option<Uuid>,
  pub validity:       Validity,
}

// ─── Timed impls ─────────────────────────────────────────────────────────────

macro_rules! impl_timed {
  ($($ty:ty),* $(,)?) => {
    $(impl Timed for $ty {
      fn validity(&self) -> &Validity { &self.validity }
    })*
  };
}

impl_timed!(
  Address,
  Employee,
  OrgUnit,
  ManagerAssignment,
  OrgUnitRelations,
  ItUser,
  RoleBinding,
);

impl ManagerAssignment {
  pub fn to_date(&self) -> Option<DateTime<Utc>> { self.validity.to }
}
