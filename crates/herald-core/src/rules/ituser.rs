//! IT-user changed: tell administrators about new or changed IT users and
//! their roles, once per distinct content.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Decision, RuleEngine, settle};
use crate::{
  Error, Result,
  fetch::Fetcher,
  intent::{ContentType, Notification, NotificationIntent, Outcome, SentMarker, SuppressReason},
  source::DataSource,
  store::{NotificationStore, SentCache},
  template::TemplateId,
};

const RULE: &str = "ituser-changed";

pub const SUBJECT: &str = "IT-bruger oprettet eller ændret i OS2mo";

const UNKNOWN_PERSON: &str = "Ukendt person";

/// Rendering context; also the content compared against the last-sent cache.
#[derive(Debug, Serialize)]
struct ItUserContext<'a> {
  person:        &'a str,
  ituser_key:    &'a str,
  itsystem_name: &'a str,
  roles:         Vec<&'a str>,
}

impl<D, S, C> RuleEngine<D, S, C>
where
  D: DataSource,
  S: NotificationStore,
  C: SentCache,
{
  pub async fn rolebinding_changed(
    &self,
    rolebinding_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Outcome> {
    let fetch = Fetcher::new(&self.source, now);
    let ituser_id = fetch
      .fetch_rolebinding(rolebinding_id)
      .await?
      .and_then(|binding| binding.ituser_id);
    match ituser_id {
      Some(id) => self.ituser_changed(id, now).await,
      None => Ok(Outcome::suppress(RULE, SuppressReason::RoleBindingUnresolvable)),
    }
  }

  pub async fn ituser_changed(&self, ituser_id: Uuid, now: DateTime<Utc>) -> Result<Outcome> {
    let decision = self.ituser_decision(ituser_id, now).await?;
    Ok(settle(RULE, decision))
  }

  async fn ituser_decision(
    &self,
    ituser_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Decision<Notification>> {
    let fetch = Fetcher::new(&self.source, now);
    let Some(ituser) = fetch.fetch_ituser(ituser_id).await? else {
      return Ok(Err(SuppressReason::ItUserNotFound));
    };

    let mut roles: Vec<&str> = ituser.roles.iter().map(String::as_str).collect();
    roles.sort_unstable();
    roles.dedup();
    let context = ItUserContext {
      person: ituser.person_name.as_deref().unwrap_or(UNKNOWN_PERSON),
      ituser_key: &ituser.user_key,
      itsystem_name: &ituser.itsystem_name,
      roles,
    };
    let content = serde_json::to_value(&context)?;

    let previous = self.sent.last_sent(ituser_id, now).await.map_err(Error::store)?;
    if previous.as_ref() == Some(&content) {
      return Ok(Err(SuppressReason::DuplicateNotification));
    }

    let recipients: BTreeSet<String> = self.settings.admin_receivers.clone();
    if recipients.is_empty() {
      return Ok(Err(SuppressReason::NoRecipients));
    }

    let body = self.templates.render(TemplateId::ItUserCreatedAlert, &context)?;

    Ok(Ok(Notification {
      intent: NotificationIntent {
        recipients,
        cc: BTreeSet::new(),
        subject: SUBJECT.to_owned(),
        body,
        content_type: ContentType::Html,
      },
      marker: Some(SentMarker { entity_id: ituser_id, content }),
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    fixtures::{FakeSource, engine_with, now},
    rules::RuleSettings,
  };

  fn settings() -> RuleSettings {
    RuleSettings {
      admin_receivers: BTreeSet::from(["it@x.dk".to_string()]),
      ..RuleSettings::default()
    }
  }

  fn expect_notification(outcome: Outcome) -> Notification {
    match outcome {
      Outcome::Notify(n) => *n,
      other => panic!("expected a notification, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn renders_roles_and_suppresses_repeat_after_commit() {
    let mut source = FakeSource::default();
    let ituser = source.add_ituser("bob", Some("Bob"), "AD", &["Læser", "Admin"]);
    let engine = engine_with(source, settings());

    let first = expect_notification(engine.ituser_changed(ituser, now()).await.unwrap());
    assert_eq!(first.intent.subject, SUBJECT);
    assert!(first.intent.body.contains("Admin, Læser"));
    assert!(first.intent.body.contains("bob"));

    // Not committed: the next event still notifies.
    let uncommitted = engine.ituser_changed(ituser, now()).await.unwrap();
    assert!(matches!(uncommitted, Outcome::Notify(_)));

    engine.commit(first.marker.unwrap(), now()).await.unwrap();
    let repeat = engine.ituser_changed(ituser, now()).await.unwrap();
    assert!(matches!(repeat, Outcome::Suppressed(SuppressReason::DuplicateNotification)));
  }

  #[tokio::test]
  async fn changed_roles_notify_again() {
    let mut source = FakeSource::default();
    let ituser = source.add_ituser("bob", Some("Bob"), "AD", &["Læser"]);
    let engine = engine_with(source, settings());

    let first = expect_notification(engine.ituser_changed(ituser, now()).await.unwrap());
    engine.commit(first.marker.unwrap(), now()).await.unwrap();

    engine.source().set_ituser_roles(ituser, &["Læser", "Skriver"]);
    let second = engine.ituser_changed(ituser, now()).await.unwrap();
    assert!(matches!(second, Outcome::Notify(_)));
  }

  #[tokio::test]
  async fn rolebinding_resolves_to_its_ituser() {
    let mut source = FakeSource::default();
    let ituser = source.add_ituser("bob", None, "AD", &[]);
    let binding = source.add_rolebinding(Some(ituser));
    let dangling = source.add_rolebinding(None);
    let engine = engine_with(source, settings());

    let n = expect_notification(engine.rolebinding_changed(binding, now()).await.unwrap());
    assert!(n.intent.body.contains(UNKNOWN_PERSON));
    assert!(matches!(
      engine.rolebinding_changed(dangling, now()).await.unwrap(),
      Outcome::Suppressed(SuppressReason::RoleBindingUnresolvable)
    ));
    assert!(matches!(
      engine.rolebinding_changed(Uuid::new_v4(), now()).await.unwrap(),
      Outcome::Suppressed(SuppressReason::RoleBindingUnresolvable)
    ));
  }
}
