//! GraphQL query documents and their typed response records.
//!
//! Every response type converts into `herald-core` snapshots through an
//! `into_snapshots` method; nothing outside this module sees wire shapes.

use chrono::{DateTime, FixedOffset};
use herald_core::{
  entity::{
    Address, AddressScope, AddressValue, Employee, Engagement, ItUser,
    ManagerAssignment, OrgUnit, OrgUnitRelations, RelatedUnit, RoleBinding,
  },
  validity::Validity,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::Result;

// ─── Query documents ─────────────────────────────────────────────────────────

pub const MANAGERS: &str = "
query Managers($uuids: [UUID!]) {
  managers(filter: {uuids: $uuids, from_date: null, to_date: null}) {
    objects {
      validities {
        employee_uuid
        org_unit_uuid
        validity { from to }
      }
    }
  }
}";

pub const EMPLOYEES: &str = "
query Employees($uuids: [UUID!]) {
  employees(filter: {uuids: $uuids}) {
    objects {
      validities {
        name
        addresses { value address_type { scope } }
        engagements { org_unit_uuid }
        validity { from to }
      }
    }
  }
}";

pub const ORG_UNITS: &str = "
query OrgUnits($uuids: [UUID!]) {
  org_units(filter: {uuids: $uuids}) {
    objects {
      validities {
        name
        user_key
        parent_uuid
        root { uuid }
        managers { employee_uuid }
        validity { from to }
      }
    }
  }
}";

pub const ADDRESSES: &str = "
query Addresses($uuids: [UUID!]) {
  addresses(filter: {uuids: $uuids}) {
    objects {
      current {
        name
        employee_uuid
        address_type { scope }
        validity { from to }
      }
    }
  }
}";

pub const ITUSERS: &str = "
query ItUsers($uuids: [UUID!]) {
  itusers(filter: {uuids: $uuids}) {
    objects {
      current {
        user_key
        person { name }
        itsystem { name }
        rolebindings { role { name } }
        validity { from to }
      }
    }
  }
}";

pub const ROLEBINDINGS: &str = "
query RoleBindings($uuids: [UUID!]) {
  rolebindings(filter: {uuids: $uuids}) {
    objects {
      current {
        ituser { uuid }
        validity { from to }
      }
    }
  }
}";

pub const ORG_UNIT_RELATIONS: &str = "
query OrgUnitRelations($uuids: [UUID!]) {
  org_units(filter: {uuids: $uuids}) {
    objects {
      current {
        name
        root { uuid }
        engagements { uuid }
        related_units { org_units { uuid root { uuid } } }
        validity { from to }
      }
    }
  }
}";

pub const ROOT_ORG: &str = "
query RootOrg {
  org { uuid }
}";

pub const INSTITUTION_ADDRESS: &str = "
query InstitutionAddress($uuid: UUID!, $root: UUID!) {
  org_units(filter: {parent: {uuids: [$root]}, descendant: {uuids: [$uuid]}}) {
    objects {
      current {
        addresses(filter: {address_type: {scope: \"EMAIL\"}}) { value }
      }
    }
  }
}";

// ─── Shared wire shapes ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Objects<T> {
  pub objects: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct Validities<T> {
  pub validities: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct Current<T> {
  pub current: Option<T>,
}

impl<T> Objects<Validities<T>> {
  fn flatten(self) -> impl Iterator<Item = T> {
    self.objects.into_iter().flat_map(|o| o.validities)
  }
}

impl<T> Objects<Current<T>> {
  fn flatten(self) -> impl Iterator<Item = T> {
    self.objects.into_iter().filter_map(|o| o.current)
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct WireValidity {
  pub from: Option<DateTime<FixedOffset>>,
  pub to:   Option<DateTime<FixedOffset>>,
}

impl WireValidity {
  /// MO dates are local midnights. The offset is dropped so the calendar
  /// date stays the one MO shows.
  fn checked(self) -> Result<Validity> {
    let wall_clock = |at: DateTime<FixedOffset>| at.naive_local().and_utc();
    Ok(Validity::new(self.from.map(wall_clock), self.to.map(wall_clock))?)
  }
}

#[derive(Debug, Deserialize)]
pub struct WireUuid {
  pub uuid: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct WireName {
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct WireScope {
  pub scope: String,
}

/// MO returns single references as lists; the first element wins.
fn first_uuid(refs: Option<Vec<WireUuid>>) -> Option<Uuid> {
  refs.and_then(|r| r.into_iter().next()).map(|r| r.uuid)
}

// ─── Managers ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ManagersData {
  pub managers: Objects<Validities<WireManager>>,
}

#[derive(Debug, Deserialize)]
pub struct WireManager {
  pub employee_uuid: Option<Uuid>,
  pub org_unit_uuid: Uuid,
  #[serde(default)]
  pub validity:      WireValidity,
}

impl ManagersData {
  pub fn into_snapshots(self, manager_id: Uuid) -> Result<Vec<ManagerAssignment>> {
    self
      .managers
      .flatten()
      .map(|m| {
        Ok(ManagerAssignment {
          manager_id,
          employee_id: m.employee_uuid,
          org_unit_id: m.org_unit_uuid,
          validity: m.validity.checked()?,
        })
      })
      .collect()
  }
}

// ─── Employees ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EmployeesData {
  pub employees: Objects<Validities<WireEmployee>>,
}

#[derive(Debug, Deserialize)]
pub struct WireEmployee {
  pub name:        String,
  #[serde(default)]
  pub addresses:   Vec<WireEmployeeAddress>,
  #[serde(default)]
  pub engagements: Vec<WireEngagement>,
  #[serde(default)]
  pub validity:    WireValidity,
}

#[derive(Debug, Deserialize)]
pub struct WireEmployeeAddress {
  pub value:        String,
  pub address_type: WireScope,
}

#[derive(Debug, Deserialize)]
pub struct WireEngagement {
  pub org_unit_uuid: Uuid,
}

impl EmployeesData {
  pub fn into_snapshots(self, employee_id: Uuid) -> Result<Vec<Employee>> {
    self
      .employees
      .flatten()
      .map(|e| {
        Ok(Employee {
          employee_id,
          name: e.name,
          addresses: e
            .addresses
            .into_iter()
            .map(|a| AddressValue {
              value: a.value,
              scope: AddressScope::from_scope(&a.address_type.scope),
            })
            .collect(),
          engagements: e
            .engagements
            .into_iter()
            .map(|g| Engagement { org_unit_id: g.org_unit_uuid })
            .collect(),
          validity: e.validity.checked()?,
        })
      })
      .collect()
  }
}

// ─── Org units ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OrgUnitsData {
  pub org_units: Objects<Validities<WireOrgUnit>>,
}

#[derive(Debug, Deserialize)]
pub struct WireOrgUnit {
  pub name:        String,
  pub user_key:    String,
  pub parent_uuid: Option<Uuid>,
  pub root:        Option<Vec<WireUuid>>,
  #[serde(default)]
  pub managers:    Vec<WireManagerRef>,
  #[serde(default)]
  pub validity:    WireValidity,
}

#[derive(Debug, Deserialize)]
pub struct WireManagerRef {
  pub employee_uuid: Option<Uuid>,
}

impl OrgUnitsData {
  pub fn into_snapshots(self, org_unit_id: Uuid) -> Result<Vec<OrgUnit>> {
    self
      .org_units
      .flatten()
      .map(|u| {
        Ok(OrgUnit {
          org_unit_id,
          name: u.name,
          user_key: u.user_key,
          parent_id: u.parent_uuid,
          root_id: first_uuid(u.root),
          managers: u.managers.into_iter().map(|m| m.employee_uuid).collect(),
          validity: u.validity.checked()?,
        })
      })
      .collect()
  }
}

// ─── Addresses ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddressesData {
  pub addresses: Objects<Current<WireAddress>>,
}

#[derive(Debug, Deserialize)]
pub struct WireAddress {
  pub name:          String,
  pub employee_uuid: Option<Uuid>,
  pub address_type:  WireScope,
  #[serde(default)]
  pub validity:      WireValidity,
}

impl AddressesData {
  pub fn into_snapshots(self, address_id: Uuid) -> Result<Vec<Address>> {
    self
      .addresses
      .flatten()
      .map(|a| {
        Ok(Address {
          address_id,
          value: a.name,
          scope: AddressScope::from_scope(&a.address_type.scope),
          employee_id: a.employee_uuid,
          validity: a.validity.checked()?,
        })
      })
      .collect()
  }
}

// ─── IT users and role bindings ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ItUsersData {
  pub itusers: Objects<Current<WireItUser>>,
}

#[derive(Debug, Deserialize)]
pub struct WireItUser {
  pub user_key:     String,
  pub person:       Option<Vec<WireName>>,
  pub itsystem:     WireName,
  #[serde(default)]
  pub rolebindings: Vec<WireRoleRefs>,
  #[serde(default)]
  pub validity:     WireValidity,
}

#[derive(Debug, Deserialize)]
pub struct WireRoleRefs {
  #[serde(default)]
  pub role: Vec<WireName>,
}

impl ItUsersData {
  pub fn into_snapshots(self, ituser_id: Uuid) -> Result<Vec<ItUser>> {
    self
      .itusers
      .flatten()
      .map(|u| {
        Ok(ItUser {
          ituser_id,
          user_key: u.user_key,
          person_name: u.person.and_then(|p| p.into_iter().next()).map(|p| p.name),
          itsystem_name: u.itsystem.name,
          roles: u
            .rolebindings
            .into_iter()
            .flat_map(|b| b.role)
            .map(|r| r.name)
            .collect(),
          validity: u.validity.checked()?,
        })
      })
      .collect()
  }
}

#[derive(Debug, Deserialize)]
pub struct RoleBindingsData {
  pub rolebindings: Objects<Current<WireRoleBinding>>,
}

#[derive(Debug, Deserialize)]
pub struct WireRoleBinding {
  pub ituser:   Option<Vec<WireUuid>>,
  #[serde(default)]
  pub validity: WireValidity,
}

impl RoleBindingsData {
  pub fn into_snapshots(self, rolebinding_id: Uuid) -> Result<Vec<RoleBinding>> {
    self
      .rolebindings
      .flatten()
      .map(|b| {
        Ok(RoleBinding {
          rolebinding_id,
          ituser_id: first_uuid(b.ituser),
          validity: b.validity.checked()?,
        })
      })
      .collect()
  }
}

// ─── Org-unit relations ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OrgUnitRelationsData {
  pub org_units: Objects<Current<WireOrgUnitRelations>>,
}

#[derive(Debug, Deserialize)]
pub struct WireOrgUnitRelations {
  pub name:          String,
  pub root:          Option<Vec<WireUuid>>,
  #[serde(default)]
  pub engagements:   Vec<WireUuid>,
  #[serde(default)]
  pub related_units: Vec<WireRelation>,
  #[serde(default)]
  pub validity:      WireValidity,
}

#[derive(Debug, Deserialize)]
pub struct WireRelation {
  pub org_units: Vec<WireRelatedUnit>,
}

#[derive(Debug, Deserialize)]
pub struct WireRelatedUnit {
  pub uuid: Uuid,
  pub root: Option<Vec<WireUuid>>,
}

impl OrgUnitRelationsData {
  /// A relation lists both of its units; the unit itself is left out.
  pub fn into_snapshots(self, org_unit_id: Uuid) -> Result<Vec<OrgUnitRelations>> {
    self
      .org_units
      .flatten()
      .map(|u| {
        Ok(OrgUnitRelations {
          org_unit_id,
          name: u.name,
          root_id: first_uuid(u.root),
          engagements: u.engagements.into_iter().map(|e| e.uuid).collect(),
          related_units: u
            .related_units
            .into_iter()
            .flat_map(|r| r.org_units)
            .filter(|r| r.uuid != org_unit_id)
            .map(|r| RelatedUnit { org_unit_id: r.uuid, root_id: first_uuid(r.root) })
            .collect(),
          validity: u.validity.checked()?,
        })
      })
      .collect()
  }
}

// ─── Root and institution ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RootOrgData {
  pub org: WireUuid,
}

#[derive(Debug, Deserialize)]
pub struct InstitutionAddressData {
  pub org_units: Objects<Current<WireAddressList>>,
}

#[derive(Debug, Deserialize)]
pub struct WireAddressList {
  #[serde(default)]
  pub addresses: Vec<WireValue>,
}

#[derive(Debug, Deserialize)]
pub struct WireValue {
  pub value: String,
}

impl InstitutionAddressData {
  pub fn into_values(self) -> Vec<String> {
    self
      .org_units
      .flatten()
      .flat_map(|u| u.addresses)
      .map(|a| a.value)
      .collect()
  }
}
