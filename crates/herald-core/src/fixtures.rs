//! In-memory fakes shared by the unit tests.

use std::{
  collections::HashMap,
  convert::Infallible,
  sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::{
  cache::MemorySentCache,
  compose::OutboundMessage,
  dispatch::MailTransport,
  entity::{
    Address, AddressScope, AddressValue, Employee, Engagement, ItUser,
    ManagerAssignment, OrgUnit, OrgUnitRelations, RoleBinding,
  },
  intent::TrackOutcome,
  record::{NotificationRecord, Phase},
  rules::{RuleEngine, RuleSettings},
  source::DataSource,
  store::NotificationStore,
  validity::Validity,
};

pub type TestEngine = RuleEngine<FakeSource, MemoryStore, MemorySentCache>;

/// 2024-06-01T12:00:00Z.
pub fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() }

/// Midnight UTC on the given day.
pub fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub fn engine(source: FakeSource) -> TestEngine {
  engine_with(source, RuleSettings::default())
}

pub fn engine_with(source: FakeSource, settings: RuleSettings) -> TestEngine {
  RuleEngine::new(source, MemoryStore::default(), MemorySentCache::default(), settings)
    .unwrap()
}

#[derive(Debug, thiserror::Error)]
#[error("injected failure")]
pub struct FakeError;

// ─── Data source ─────────────────────────────────────────────────────────────

/// A hand-built organisation. Every entity has a single unbounded validity
/// unless a test says otherwise.
pub struct FakeSource {
  pub root:        Uuid,
  pub failing:     bool,
  /// Institution addresses keyed by the unit they are looked up for.
  pub institution: HashMap<Uuid, Vec<String>>,
  pub relations:   HashMap<Uuid, OrgUnitRelations>,
  units:           HashMap<Uuid, OrgUnit>,
  employees:       HashMap<Uuid, Employee>,
  addresses:       HashMap<Uuid, Address>,
  rolebindings:    HashMap<Uuid, RoleBinding>,
  managers:        Mutex<HashMap<Uuid, ManagerAssignment>>,
  itusers:         Mutex<HashMap<Uuid, ItUser>>,
}

impl Default for FakeSource {
  fn default() -> Self {
    Self {
      root:         Uuid::new_v4(),
      failing:      false,
      institution:  HashMap::new(),
      relations:    HashMap::new(),
      units:        HashMap::new(),
      employees:    HashMap::new(),
      addresses:    HashMap::new(),
      rolebindings: HashMap::new(),
      managers:     Mutex::default(),
      itusers:      Mutex::default(),
    }
  }
}

impl FakeSource {
  /// A source whose every query fails.
  pub fn failing() -> Self { Self { failing: true, ..Self::default() } }

  pub fn add_unit(&mut self, name: &str, parent: Option<Uuid>) -> Uuid {
    let id = Uuid::new_v4();
    self.units.insert(id, OrgUnit {
      org_unit_id: id,
      name:        name.to_owned(),
      user_key:    name.to_lowercase(),
      parent_id:   parent,
      root_id:     None,
      managers:    Vec::new(),
      validity:    Validity::default(),
    });
    id
  }

  pub fn set_parent(&mut self, unit: Uuid, parent: Option<Uuid>) {
    if let Some(u) = self.units.get_mut(&unit) {
      u.parent_id = parent;
    }
  }

  pub fn set_root(&mut self, unit: Uuid, root: Option<Uuid>) {
    if let Some(u) = self.units.get_mut(&unit) {
      u.root_id = root;
    }
  }

  pub fn set_managers(&mut self, unit: Uuid, managers: Vec<Option<Uuid>>) {
    if let Some(u) = self.units.get_mut(&unit) {
      u.managers = managers;
    }
  }

  pub fn add_employee(&mut self, name: &str, emails: &[&str], units: &[Uuid]) -> Uuid {
    let id = Uuid::new_v4();
    self.employees.insert(id, Employee {
      employee_id: id,
      name:        name.to_owned(),
      addresses:   emails
        .iter()
        .map(|e| AddressValue { value: (*e).to_owned(), scope: AddressScope::Email })
        .collect(),
      engagements: units.iter().map(|&org_unit_id| Engagement { org_unit_id }).collect(),
      validity:    Validity::default(),
    });
    id
  }

  pub fn add_address(&mut self, employee: Option<Uuid>, value: &str, scope: &str) -> Uuid {
    let id = Uuid::new_v4();
    self.addresses.insert(id, Address {
      address_id: id,
      value: value.to_owned(),
      scope: AddressScope::from_scope(scope),
      employee_id: employee,
      validity: Validity::default(),
    });
    id
  }

  pub fn add_email_address(&mut self, employee: Uuid, value: &str) -> Uuid {
    self.add_address(Some(employee), value, "EMAIL")
  }

  pub fn add_manager(&mut self, employee: Option<Uuid>, unit: Uuid, validity: Validity) -> Uuid {
    let id = Uuid::new_v4();
    lock(&self.managers).insert(id, ManagerAssignment {
      manager_id: id,
      employee_id: employee,
      org_unit_id: unit,
      validity,
    });
    id
  }

  pub fn set_manager_validity(&self, manager: Uuid, validity: Validity) {
    if let Some(m) = lock(&self.managers).get_mut(&manager) {
      m.validity = validity;
    }
  }

  pub fn add_ituser(
    &mut self,
    user_key: &str,
    person: Option<&str>,
    itsystem: &str,
    roles: &[&str],
  ) -> Uuid {
    let id = Uuid::new_v4();
    lock(&self.itusers).insert(id, ItUser {
      ituser_id:     id,
      user_key:      user_key.to_owned(),
      person_name:   person.map(str::to_owned),
      itsystem_name: itsystem.to_owned(),
      roles:         roles.iter().map(|r| (*r).to_owned()).collect(),
      validity:      Validity::default(),
    });
    id
  }

  pub fn set_ituser_roles(&self, ituser: Uuid, roles: &[&str]) {
    if let Some(u) = lock(&self.itusers).get_mut(&ituser) {
      u.roles = roles.iter().map(|r| (*r).to_owned()).collect();
    }
  }

  pub fn add_rolebinding(&mut self, ituser: Option<Uuid>) -> Uuid {
    let id = Uuid::new_v4();
    self.rolebindings.insert(id, RoleBinding {
      rolebinding_id: id,
      ituser_id:      ituser,
      validity:       Validity::default(),
    });
    id
  }

  fn check(&self) -> Result<(), FakeError> {
    if self.failing { Err(FakeError) } else { Ok(()) }
  }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn one<T: Clone>(map: &HashMap<Uuid, T>, id: Uuid) -> Vec<T> {
  map.get(&id).cloned().into_iter().collect()
}

impl DataSource for FakeSource {
  type Error = FakeError;

  async fn managers(&self, id: Uuid) -> Result<Vec<ManagerAssignment>, FakeError> {
    self.check()?;
    Ok(one(&lock(&self.managers), id))
  }

  async fn employees(&self, id: Uuid) -> Result<Vec<Employee>, FakeError> {
    self.check()?;
    Ok(one(&self.employees, id))
  }

  async fn org_units(&self, id: Uuid) -> Result<Vec<OrgUnit>, FakeError> {
    self.check()?;
    Ok(one(&self.units, id))
  }

  async fn addresses(&self, id: Uuid) -> Result<Vec<Address>, FakeError> {
    self.check()?;
    Ok(one(&self.addresses, id))
  }

  async fn itusers(&self, id: Uuid) -> Result<Vec<ItUser>, FakeError> {
    self.check()?;
    Ok(one(&lock(&self.itusers), id))
  }

  async fn rolebindings(&self, id: Uuid) -> Result<Vec<RoleBinding>, FakeError> {
    self.check()?;
    Ok(one(&self.rolebindings, id))
  }

  async fn org_unit_relations(&self, id: Uuid) -> Result<Vec<OrgUnitRelations>, FakeError> {
    self.check()?;
    Ok(one(&self.relations, id))
  }

  async fn root_org(&self) -> Result<Uuid, FakeError> {
    self.check()?;
    Ok(self.root)
  }

  async fn institution_addresses(&self, unit: Uuid, _root: Uuid) -> Result<Vec<String>, FakeError> {
    self.check()?;
    Ok(self.institution.get(&unit).cloned().unwrap_or_default())
  }
}

// ─── Notification store ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
  records: Mutex<HashMap<Uuid, NotificationRecord>>,
}

impl MemoryStore {
  pub fn len(&self) -> usize { lock(&self.records).len() }
}

impl NotificationStore for MemoryStore {
  type Error = Infallible;

  async fn find(&self, id: Uuid) -> Result<Option<NotificationRecord>, Infallible> {
    Ok(lock(&self.records).get(&id).cloned())
  }

  async fn upsert(&self, record: NotificationRecord) -> Result<(), Infallible> {
    lock(&self.records).insert(record.manager_assignment_id, record);
    Ok(())
  }

  async fn delete<'a>(&'a self, record: &'a NotificationRecord) -> Result<bool, Infallible> {
    let mut records = lock(&self.records);
    let matches = records
      .get(&record.manager_assignment_id)
      .is_some_and(|r| r.is_same_notification(record));
    if matches {
      records.remove(&record.manager_assignment_id);
    }
    Ok(matches)
  }

  async fn track(&self, candidate: NotificationRecord) -> Result<TrackOutcome, Infallible> {
    let mut records = lock(&self.records);
    let outcome = match records.get(&candidate.manager_assignment_id) {
      Some(existing) if existing.is_same_notification(&candidate) => return Ok(TrackOutcome::Duplicate),
      Some(existing) => TrackOutcome::Replaced { previous: existing.clone() },
      None => TrackOutcome::Inserted,
    };
    records.insert(candidate.manager_assignment_id, candidate);
    Ok(outcome)
  }

  async fn due_for_pre_notification(
    &self,
    now: DateTime<Utc>,
    lead_time: Duration,
  ) -> Result<Vec<NotificationRecord>, Infallible> {
    Ok(self.select(|r| {
      !r.pre_notification_sent && now < r.end_date && r.end_date <= now + lead_time
    }))
  }

  async fn due_for_notification(
    &self,
    now: DateTime<Utc>,
  ) -> Result<Vec<NotificationRecord>, Infallible> {
    Ok(self.select(|r| !r.notification_sent && r.end_date <= now))
  }

  async fn mark_sent<'a>(
    &'a self,
    record: &'a NotificationRecord,
    phase: Phase,
    at: DateTime<Utc>,
  ) -> Result<bool, Infallible> {
    let mut records = lock(&self.records);
    let Some(stored) = records
      .get_mut(&record.manager_assignment_id)
      .filter(|r| r.is_same_notification(record))
    else {
      return Ok(false);
    };
    match phase {
      Phase::Pre => stored.pre_notification_sent = true,
      Phase::Main => {
        stored.notification_sent = true;
        stored.notification_sent_at = Some(at);
      }
    }
    Ok(true)
  }

  async fn purge_completed(&self, before: DateTime<Utc>) -> Result<usize, Infallible> {
    let mut records = lock(&self.records);
    let count = records.len();
    records.retain(|_, r| {
      !(r.notification_sent && r.notification_sent_at.is_some_and(|at| at < before))
    });
    Ok(count - records.len())
  }
}

impl MemoryStore {
  fn select(&self, pred: impl Fn(&NotificationRecord) -> bool) -> Vec<NotificationRecord> {
    let mut due: Vec<_> = lock(&self.records).values().filter(|r| pred(r)).cloned().collect();
    due.sort_by_key(|r| r.end_date);
    due
  }
}

// ─── Mail transport ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingTransport {
  pub sent:    Mutex<Vec<OutboundMessage>>,
  pub failing: bool,
}

impl RecordingTransport {
  pub fn sent(&self) -> Vec<OutboundMessage> { lock(&self.sent).clone() }
}

impl MailTransport for RecordingTransport {
  type Error = FakeError;

  async fn send<'a>(&'a self, message: &'a OutboundMessage) -> Result<(), FakeError> {
    if self.failing {
      return Err(FakeError);
    }
    lock(&self.sent).push(message.clone());
    Ok(())
  }
}
