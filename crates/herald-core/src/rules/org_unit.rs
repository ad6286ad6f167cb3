//! Org-unit-missing-relation: remind the institution about payroll units that
//! have no relation into the administrative hierarchy.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Decision, RuleEngine, settle};
use crate::{
  Result,
  fetch::Fetcher,
  intent::{ContentType, NotificationIntent, Outcome, SuppressReason},
  source::DataSource,
  store::{NotificationStore, SentCache},
};

const RULE: &str = "org-unit-missing-relation";

pub const SUBJECT: &str = "Manglende relation i Lønorganisation";

impl<D, S, C> RuleEngine<D, S, C>
where
  D: DataSource,
  S: NotificationStore,
  C: SentCache,
{
  pub async fn org_unit_changed(&self, org_unit_id: Uuid, now: DateTime<Utc>) -> Result<Outcome> {
    let decision = self.org_unit_decision(org_unit_id, now).await?;
    Ok(settle(RULE, decision))
  }

  async fn org_unit_decision(
    &self,
    org_unit_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Decision<NotificationIntent>> {
    let fetch = Fetcher::new(&self.source, now);

    let Some(unit) = fetch.fetch_org_unit_relations(org_unit_id).await? else {
      return Ok(Err(SuppressReason::OrgUnitNotFound));
    };

    let Some(payroll_root) = self.settings.payroll_org_root_id else {
      tracing::warn!("payroll_org_root_id is not configured");
      return Ok(Err(SuppressReason::OutsideTrackedHierarchy));
    };
    if unit.root_id != Some(payroll_root) {
      return Ok(Err(SuppressReason::OutsideTrackedHierarchy));
    }

    if unit.engagements.is_empty() {
      return Ok(Err(SuppressReason::NoEngagements));
    }

    // One relation into another hierarchy is enough to silence the alert.
    for related in &unit.related_units {
      match related.root_id {
        Some(root) if root != payroll_root => {
          return Ok(Err(SuppressReason::CrossHierarchyRelation));
        }
        Some(_) => {}
        None => tracing::warn!(
          org_unit = %org_unit_id,
          related = %related.org_unit_id,
          "related unit has no root; ignoring"
        ),
      }
    }

    let recipients: BTreeSet<String> = fetch
      .institution_addresses(org_unit_id, payroll_root)
      .await?
      .into_iter()
      .collect();
    if recipients.is_empty() {
      return Ok(Err(SuppressReason::NoRecipients));
    }

    let body = format!(
      "Denne besked er sendt som en påmindelse om at enheden: {} ikke er relateret til en \
       enhed i Administrationsorganisationen.",
      unit.name
    );

    Ok(Ok(NotificationIntent {
      recipients,
      cc: BTreeSet::new(),
      subject: SUBJECT.to_owned(),
      body,
      content_type: ContentType::Plain,
    }))
  }
}
