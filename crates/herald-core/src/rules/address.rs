//! Employee-address-created: confirm an employee's first email address to the
//! employee, copying the managers of their units.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use minijinja::context;
use uuid::Uuid;

use super::{Decision, RuleEngine, settle};
use crate::{
  Result,
  entity::OrgUnit,
  fetch::Fetcher,
  intent::{ContentType, NotificationIntent, Outcome, SuppressReason},
  source::DataSource,
  store::{NotificationStore, SentCache},
  template::TemplateId,
};

pub(super) const RULE: &str = "address-created";

pub const SUBJECT: &str = "Registrering i MO";

/// Unit text used when the employee has no engagements.
pub const FALLBACK_ORGANISATION: &str = "OS2MO.";

impl<D, S, C> RuleEngine<D, S, C>
where
  D: DataSource,
  S: NotificationStore,
  C: SentCache,
{
  pub async fn address_created(&self, address_id: Uuid, now: DateTime<Utc>) -> Result<Outcome> {
    let decision = self.address_created_decision(address_id, now).await?;
    Ok(settle(RULE, decision))
  }

  async fn address_created_decision(
    &self,
    address_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Decision<NotificationIntent>> {
    let fetch = Fetcher::new(&self.source, now);

    let Some(address) = fetch.fetch_address(address_id).await? else {
      return Ok(Err(SuppressReason::AddressNotFound));
    };
    let Some(employee_id) = address.employee_id else {
      return Ok(Err(SuppressReason::NotEmployeeAddress));
    };
    if !address.scope.is_email() {
      return Ok(Err(SuppressReason::NotEmailAddress));
    }

    let Some(employee) = fetch.fetch_employee(employee_id).await? else {
      return Ok(Err(SuppressReason::EmployeeNotFound));
    };

    // Only the first registered email is confirmed.
    if employee.email_addresses().count() > 1 {
      return Ok(Err(SuppressReason::PreviousEmailExists));
    }

    // Only a "@" check; other junk values pass.
    let recipients: BTreeSet<String> = employee
      .email_addresses()
      .filter(|value| value.contains('@'))
      .map(str::to_owned)
      .collect();
    if recipients.is_empty() {
      tracing::info!(employee = %employee.name, "employee has no usable email");
      return Ok(Err(SuppressReason::NoValidEmail));
    }

    let mut cc = BTreeSet::new();
    let units_text = if employee.engagements.is_empty() {
      FALLBACK_ORGANISATION.to_owned()
    } else {
      let mut unit_ids: Vec<Uuid> = Vec::new();
      for engagement in &employee.engagements {
        if !unit_ids.contains(&engagement.org_unit_id) {
          unit_ids.push(engagement.org_unit_id);
        }
      }

      let mut units: Vec<OrgUnit> = Vec::with_capacity(unit_ids.len());
      for id in unit_ids {
        match fetch.fetch_org_unit(id).await? {
          Some(unit) => units.push(unit),
          None => tracing::warn!(org_unit = %id, "engagement org unit not found"),
        }
      }

      let mut manager_ids: Vec<Uuid> = Vec::new();
      for id in units.iter().flat_map(|u| u.managers.iter().flatten()) {
        if !manager_ids.contains(id) {
          manager_ids.push(*id);
        }
      }
      for id in manager_ids {
        if let Some(manager) = fetch.fetch_employee(id).await? {
          cc.extend(manager.email_addresses().map(str::to_owned));
        }
      }

      let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
      unit_list(&names).unwrap_or_else(|| FALLBACK_ORGANISATION.to_owned())
    };

    let body = self.templates.render(
      TemplateId::AddressCreationConfirmation,
      context! { name => employee.name, units => units_text },
    )?;

    Ok(Ok(NotificationIntent {
      recipients,
      cc,
      subject: SUBJECT.to_owned(),
      body,
      content_type: ContentType::Plain,
    }))
  }
}

/// `"A"` for one unit; `"de følgende enheder:\nA,\nB"` for several.
fn unit_list(names: &[&str]) -> Option<String> {
  let (last, rest) = names.split_last()?;
  if rest.is_empty() {
    return Some((*last).to_owned());
  }
  let mut text = String::from("de følgende enheder:\n");
  for name in rest {
    text.push_str(name);
    text.push_str(",\n");
  }
  text.push_str(last);
  Some(text)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    event::{AgentKind, Event, EventKind},
    fixtures::{FakeSource, engine, now},
  };

  fn unwrap_intent(outcome: Outcome) -> NotificationIntent {
    match outcome {
      Outcome::Notify(n) => n.intent,
      other => panic!("expected a notification, got {other:?}"),
    }
  }

  #[test]
  fn unit_list_joins_with_comma_newline() {
    assert_eq!(unit_list(&[]), None);
    assert_eq!(unit_list(&["ou1"]).unwrap(), "ou1");
    assert_eq!(
      unit_list(&["ou1", "ou2", "ou3"]).unwrap(),
      "de følgende enheder:\nou1,\nou2,\nou3"
    );
  }

  #[tokio::test]
  async fn first_email_without_engagements_notifies_employee_only() {
    let mut source = FakeSource::default();
    let employee = source.add_employee("Test McTesterson", &["e@x.com"], &[]);
    let address = source.add_email_address(employee, "e@x.com");

    let engine = engine(source);
    let intent = unwrap_intent(engine.address_created(address, now()).await.unwrap());

    assert_eq!(intent.recipients, BTreeSet::from(["e@x.com".to_string()]));
    assert!(intent.cc.is_empty());
    assert_eq!(intent.subject, "Registrering i MO");
    assert_eq!(intent.content_type, ContentType::Plain);
    assert!(intent.body.contains("Test McTesterson"));
    assert!(intent.body.ends_with(FALLBACK_ORGANISATION));
  }

  #[tokio::test]
  async fn engagements_list_units_and_copy_managers() {
    let mut source = FakeSource::default();
    let root = source.root;
    let manager = source.add_employee("Manny O'ager", &["manager@test", "no-at-sign"], &[]);
    let ou1 = source.add_unit("ou1", Some(root));
    let ou2 = source.add_unit("ou2", Some(root));
    source.set_managers(ou1, vec![Some(manager), None]);
    let employee = source.add_employee("Test McTesterson", &["employee@test"], &[ou1, ou2, ou1]);
    let address = source.add_email_address(employee, "employee@test");

    let engine = engine(source);
    let intent = unwrap_intent(engine.address_created(address, now()).await.unwrap());

    assert_eq!(intent.recipients, BTreeSet::from(["employee@test".to_string()]));
    // CC addresses are passed through without the "@" check.
    assert_eq!(
      intent.cc,
      BTreeSet::from(["manager@test".to_string(), "no-at-sign".to_string()])
    );
    assert!(intent.body.ends_with("de følgende enheder:\nou1,\nou2"));
  }

  #[tokio::test]
  async fn second_email_is_always_suppressed() {
    let mut source = FakeSource::default();
    let employee = source.add_employee("Test", &["old@email", "new@email"], &[]);
    let address = source.add_email_address(employee, "new@email");

    let engine = engine(source);
    for _ in 0..2 {
      let outcome = engine.address_created(address, now()).await.unwrap();
      assert!(matches!(outcome, Outcome::Suppressed(SuppressReason::PreviousEmailExists)));
    }
  }

  #[tokio::test]
  async fn invalid_emails_are_suppressed() {
    for invalid in ["", "   ", "invalidemail"] {
      let mut source = FakeSource::default();
      let employee = source.add_employee("Test", &[invalid], &[]);
      let address = source.add_email_address(employee, invalid);

      let outcome = engine(source).address_created(address, now()).await.unwrap();
      assert!(matches!(outcome, Outcome::Suppressed(SuppressReason::NoValidEmail)));
    }
  }

  #[tokio::test]
  async fn non_email_and_unowned_addresses_are_suppressed() {
    let mut source = FakeSource::default();
    let employee = source.add_employee("Test", &["e@x.com"], &[]);
    let phone = source.add_address(Some(employee), "12345678", "PHONE");
    let unit_email = source.add_address(None, "unit@x.com", "EMAIL");

    let engine = engine(source);
    assert!(matches!(
      engine.address_created(phone, now()).await.unwrap(),
      Outcome::Suppressed(SuppressReason::NotEmailAddress)
    ));
    assert!(matches!(
      engine.address_created(unit_email, now()).await.unwrap(),
      Outcome::Suppressed(SuppressReason::NotEmployeeAddress)
    ));
    assert!(matches!(
      engine.address_created(Uuid::new_v4(), now()).await.unwrap(),
      Outcome::Suppressed(SuppressReason::AddressNotFound)
    ));
  }

  #[tokio::test]
  async fn employee_creation_event_is_ignored() {
    let employee = Uuid::new_v4();
    let event = Event {
      kind:        EventKind::Address,
      uuid:        employee,
      object_uuid: Some(employee),
    };
    let outcome = engine(FakeSource::default())
      .evaluate(AgentKind::AddressCreated, &event, now())
      .await
      .unwrap();
    assert!(matches!(outcome, Outcome::Suppressed(SuppressReason::EmployeeCreationEvent)));
  }
}
