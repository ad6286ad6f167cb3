//! Inbound events and the explicit agent registry.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The master-data object type an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  Address,
  Manager,
  OrgUnit,
  Ituser,
  Rolebinding,
}

impl EventKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Address => "address",
      Self::Manager => "manager",
      Self::OrgUnit => "org_unit",
      Self::Ituser => "ituser",
      Self::Rolebinding => "rolebinding",
    }
  }
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0:?}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
  type Err = UnknownEventKind;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "address" => Ok(Self::Address),
      "manager" => Ok(Self::Manager),
      "org_unit" => Ok(Self::OrgUnit),
      "ituser" => Ok(Self::Ituser),
      "rolebinding" => Ok(Self::Rolebinding),
      other => Err(UnknownEventKind(other.to_owned())),
    }
  }
}

/// A change notification for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
  pub kind:        EventKind,
  /// The entity the event was routed on (for addresses: the owner).
  pub uuid:        Uuid,
  /// The changed object itself, when it differs from `uuid`.
  pub object_uuid: Option<Uuid>,
}

impl Event {
  pub fn new(kind: EventKind, uuid: Uuid) -> Self { Self { kind, uuid, object_uuid: None } }

  /// The id of the object that actually changed.
  pub fn object(&self) -> Uuid { self.object_uuid.unwrap_or(self.uuid) }
}

/// A rule-evaluating agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
  AddressCreated,
  ManagerRemoved,
  OrgUnitMissingRelation,
  ItuserChanged,
}

impl AgentKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::AddressCreated => "address-created",
      Self::ManagerRemoved => "manager-removed",
      Self::OrgUnitMissingRelation => "org-unit-missing-relation",
      Self::ItuserChanged => "ituser-changed",
    }
  }

  /// The event kinds this agent reacts to.
  pub fn subscriptions(self) -> &'static [EventKind] {
    match self {
      Self::AddressCreated => &[EventKind::Address],
      Self::ManagerRemoved => &[EventKind::Manager],
      Self::OrgUnitMissingRelation => &[EventKind::OrgUnit],
      Self::ItuserChanged => &[EventKind::Ituser, EventKind::Rolebinding],
    }
  }
}

impl fmt::Display for AgentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Event-kind → agents table, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct Registry {
  routes: HashMap<EventKind, Vec<AgentKind>>,
}

impl Registry {
  /// Register `active` agents in order; duplicates are ignored.
  pub fn from_active(active: &[AgentKind]) -> Self {
    let mut routes: HashMap<EventKind, Vec<AgentKind>> = HashMap::new();
    for &agent in active {
      for &kind in agent.subscriptions() {
        let agents = routes.entry(kind).or_default();
        if !agents.contains(&agent) {
          agents.push(agent);
        }
      }
    }
    Self { routes }
  }

  pub fn agents_for(&self, kind: EventKind) -> &[AgentKind] {
    self.routes.get(&kind).map(Vec::as_slice).unwrap_or_default()
  }

  pub fn is_empty(&self) -> bool { self.routes.is_empty() }
}
