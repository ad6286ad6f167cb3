//! The `DataSource` trait: the seam to the master-data query API.
//!
//! Implemented by `herald-mo` against the GraphQL API and by in-memory fakes
//! in tests. Every query returns zero or more variants; an unknown id is an
//! empty result, never an error.

use std::future::Future;

use uuid::Uuid;

use crate::entity::{
  Address, Employee, ItUser, ManagerAssignment, OrgUnit, OrgUnitRelations,
  RoleBinding,
};

/// Abstraction over the master-data query API.
///
/// All methods return `Send` futures so the trait can be used from the
/// multi-threaded tokio runtime the agent runs on.
pub trait DataSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Every validity of a manager assignment.
  fn managers(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<ManagerAssignment>, Self::Error>> + Send + '_;

  fn employees(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<Employee>, Self::Error>> + Send + '_;

  fn org_units(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<OrgUnit>, Self::Error>> + Send + '_;

  fn addresses(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<Address>, Self::Error>> + Send + '_;

  fn itusers(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<ItUser>, Self::Error>> + Send + '_;

  fn rolebindings(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<RoleBinding>, Self::Error>> + Send + '_;

  /// The current relation view of an org unit.
  fn org_unit_relations(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<OrgUnitRelations>, Self::Error>> + Send + '_;

  /// The id of the organisation root (the implicit parent of top-level units).
  fn root_org(
    &self,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  /// EMAIL addresses of the institution containing `unit`: the unit directly
  /// below `root` on the path from `root` down to `unit`.
  fn institution_addresses(
    &self,
    unit: Uuid,
    root: Uuid,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;
}
