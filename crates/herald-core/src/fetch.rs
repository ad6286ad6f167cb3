//! Entity data fetchers.
//!
//! [`Fetcher`] is the only place raw data-source results are turned into the
//! single authoritative snapshot the rules work with. Unknown ids come back as
//! `Ok(None)`; data-source failures propagate as [`Error::DataSource`].

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  entity::{
    Address, Employee, ItUser, ManagerAssignment, OrgUnit, OrgUnitRelations,
    RoleBinding,
  },
  source::DataSource,
  validity::{self, Timed},
};

/// Upper bound on parent hops when walking towards the organisation root.
pub const MAX_HIERARCHY_DEPTH: usize = 64;

/// Separator between unit names in a location path.
const LOCATION_SEPARATOR: &str = " / ";

/// Typed accessors over a [`DataSource`], resolving validities at `now`.
pub struct Fetcher<'a, D> {
  source: &'a D,
  now:    DateTime<Utc>,
}

impl<'a, D: DataSource> Fetcher<'a, D> {
  pub fn new(source: &'a D, now: DateTime<Utc>) -> Self { Self { source, now } }

  pub fn now(&self) -> DateTime<Utc> { self.now }

  pub fn source(&self) -> &'a D { self.source }

  fn authoritative<T: Timed>(&self, variants: Vec<T>) -> Result<Option<T>> {
    if variants.is_empty() {
      return Ok(None);
    }
    validity::resolve(variants, self.now).map(Some)
  }

  pub async fn fetch_manager(&self, id: Uuid) -> Result<Option<ManagerAssignment>> {
    let variants = self.source.managers(id).await.map_err(Error::data_source)?;
    self.authoritative(variants)
  }

  pub async fn fetch_employee(&self, id: Uuid) -> Result<Option<Employee>> {
    let variants = self.source.employees(id).await.map_err(Error::data_source)?;
    self.authoritative(variants)
  }

  pub async fn fetch_org_unit(&self, id: Uuid) -> Result<Option<OrgUnit>> {
    let variants = self.source.org_units(id).await.map_err(Error::data_source)?;
    self.authoritative(variants)
  }

  pub async fn fetch_address(&self, id: Uuid) -> Result<Option<Address>> {
    let variants = self.source.addresses(id).await.map_err(Error::data_source)?;
    self.authoritative(variants)
  }

  pub async fn fetch_ituser(&self, id: Uuid) -> Result<Option<ItUser>> {
    let variants = self.source.itusers(id).await.map_err(Error::data_source)?;
    self.authoritative(variants)
  }

  pub async fn fetch_rolebinding(&self, id: Uuid) -> Result<Option<RoleBinding>> {
    let variants = self
      .source
      .rolebindings(id)
      .await
      .map_err(Error::data_source)?;
    self.authoritative(variants)
  }

  pub async fn fetch_org_unit_relations(
    &self,
    id: Uuid,
  ) -> Result<Option<OrgUnitRelations>> {
    let variants = self
      .source
      .org_unit_relations(id)
      .await
      .map_err(Error::data_source)?;
    self.authoritative(variants)
  }

  pub async fn institution_addresses(
    &self,
    unit: Uuid,
    root: Uuid,
  ) -> Result<Vec<String>> {
    self
      .source
      .institution_addresses(unit, root)
      .await
      .map_err(Error::data_source)
  }

  /// Build the `"A / B / C"` path of `unit` and its ancestors, root-most first.
  ///
  /// The organisation root itself is excluded. A parent chain that is broken
  /// or longer than [`MAX_HIERARCHY_DEPTH`] is a [`Error::DataIntegrity`].
  pub async fn fetch_org_unit_location(&self, unit: &OrgUnit) -> Result<String> {
    let root = self.source.root_org().await.map_err(Error::data_source)?;

    let mut names = vec![unit.name.clone()];
    let mut current_id = unit.org_unit_id;
    let mut parent = unit.parent_id;

    for _ in 0..MAX_HIERARCHY_DEPTH {
      let parent_id = match parent {
        Some(p) if p == root => {
          names.reverse();
          return Ok(names.join(LOCATION_SEPARATOR));
        }
        Some(p) => p,
        None => {
          return Err(integrity(format!(
            "org unit {current_id} has no parent but is not below root {root}"
          )));
        }
      };

      let Some(parent_unit) = self.fetch_org_unit(parent_id).await? else {
        return Err(integrity(format!(
          "parent {parent_id} of org unit {current_id} does not resolve"
        )));
      };

      names.push(parent_unit.name);
      current_id = parent_unit.org_unit_id;
      parent = parent_unit.parent_id;
    }

    Err(integrity(format!(
      "org unit {} is more than {MAX_HIERARCHY_DEPTH} levels below root {root}",
      unit.org_unit_id
    )))
  }
}

fn integrity(message: String) -> Error {
  tracing::error!(%message, "org unit hierarchy is inconsistent");
  Error::DataIntegrity(message)
}
