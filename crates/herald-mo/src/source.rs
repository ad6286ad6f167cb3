//! [`DataSource`] implementation for [`MoClient`].

use herald_core::{
  entity::{
    Address, Employee, ItUser, ManagerAssignment, OrgUnit, OrgUnitRelations,
    RoleBinding,
  },
  source::DataSource,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
  Error, MoClient, Result,
  queries::{
    ADDRESSES, AddressesData, EMPLOYEES, EmployeesData, INSTITUTION_ADDRESS, ITUSERS,
    InstitutionAddressData, ItUsersData, MANAGERS, ManagersData, ORG_UNIT_RELATIONS,
    ORG_UNITS, OrgUnitRelationsData, OrgUnitsData, ROLEBINDINGS, RoleBindingsData,
  },
};

fn by_id(id: Uuid) -> serde_json::Value { json!({ "uuids": [id] }) }

impl DataSource for MoClient {
  type Error = Error;

  async fn managers(&self, id: Uuid) -> Result<Vec<ManagerAssignment>> {
    let data: ManagersData = self.query(MANAGERS, by_id(id)).await?;
    data.into_snapshots(id)
  }

  async fn employees(&self, id: Uuid) -> Result<Vec<Employee>> {
    let data: EmployeesData = self.query(EMPLOYEES, by_id(id)).await?;
    data.into_snapshots(id)
  }

  async fn org_units(&self, id: Uuid) -> Result<Vec<OrgUnit>> {
    let data: OrgUnitsData = self.query(ORG_UNITS, by_id(id)).await?;
    data.into_snapshots(id)
  }

  async fn addresses(&self, id: Uuid) -> Result<Vec<Address>> {
    let data: AddressesData = self.query(ADDRESSES, by_id(id)).await?;
    data.into_snapshots(id)
  }

  async fn itusers(&self, id: Uuid) -> Result<Vec<ItUser>> {
    let data: ItUsersData = self.query(ITUSERS, by_id(id)).await?;
    data.into_snapshots(id)
  }

  async fn rolebindings(&self, id: Uuid) -> Result<Vec<RoleBinding>> {
    let data: RoleBindingsData = self.query(ROLEBINDINGS, by_id(id)).await?;
    data.into_snapshots(id)
  }

  async fn org_unit_relations(&self, id: Uuid) -> Result<Vec<OrgUnitRelations>> {
    let data: OrgUnitRelationsData = self.query(ORG_UNIT_RELATIONS, by_id(id)).await?;
    data.into_snapshots(id)
  }

  async fn root_org(&self) -> Result<Uuid> { self.cached_root().await }

  async fn institution_addresses(&self, unit: Uuid, root: Uuid) -> Result<Vec<String>> {
    let data: InstitutionAddressData = self
      .query(INSTITUTION_ADDRESS, json!({ "uuid": unit, "root": root }))
      .await?;
    Ok(data.into_values())
  }
}
