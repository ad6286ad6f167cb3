//! [`Agent`]: routes events through the registered rules and dispatches what
//! they decide, and runs the manager-alert sweep.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use herald_core::{
  Result,
  dispatch::{MailTransport, Mailer},
  event::{Event, Registry},
  intent::Outcome,
  rules::RuleEngine,
  source::DataSource,
  store::{NotificationStore, SentCache},
  sweep::{self, SweepReport, SweepSchedule},
};
use tokio::time::MissedTickBehavior;

pub struct Agent<D, S, C, T> {
  registry: Registry,
  engine:   RuleEngine<D, S, C>,
  mailer:   Mailer<T>,
  schedule: SweepSchedule,
}

impl<D, S, C, T> Agent<D, S, C, T>
where
  D: DataSource,
  S: NotificationStore,
  C: SentCache,
  T: MailTransport,
{
  pub fn new(
    registry: Registry,
    engine: RuleEngine<D, S, C>,
    mailer: Mailer<T>,
    schedule: SweepSchedule,
  ) -> Self {
    Self { registry, engine, mailer, schedule }
  }

  pub fn engine(&self) -> &RuleEngine<D, S, C> { &self.engine }

  pub fn mailer(&self) -> &Mailer<T> { &self.mailer }

  /// Evaluate every agent registered for `event.kind`, in registration order.
  ///
  /// A notification is committed to the sent cache only after it was
  /// dispatched. The first error aborts the remaining agents.
  pub async fn handle_event(&self, event: &Event, now: DateTime<Utc>) -> Result<Vec<Outcome>> {
    let agents = self.registry.agents_for(event.kind);
    if agents.is_empty() {
      tracing::debug!(kind = %event.kind, uuid = %event.uuid, "no agent registered");
    }

    let mut outcomes = Vec::with_capacity(agents.len());
    for &agent in agents {
      let outcome = self.engine.evaluate(agent, event, now).await?;
      match &outcome {
        Outcome::Notify(notification) => {
          self.mailer.deliver(&notification.intent).await?;
          if let Some(marker) = notification.marker.clone() {
            self.engine.commit(marker, now).await?;
          }
        }
        Outcome::Tracked(record) => {
          tracing::info!(
            %agent,
            assignment = %record.manager_assignment_id,
            end_date = %record.end_date,
            "manager removal tracked"
          );
        }
        Outcome::Suppressed(_) => {}
      }
      outcomes.push(outcome);
    }
    Ok(outcomes)
  }

  /// One pass of the deferred manager-alert sweep.
  pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
    sweep::run_once(&self.engine, &self.mailer, &self.schedule, now).await
  }
}

/// Sweep every `interval` until the task is aborted.
pub async fn run_sweeps<D, S, C, T>(agent: Arc<Agent<D, S, C, T>>, interval: Duration)
where
  D: DataSource,
  S: NotificationStore,
  C: SentCache,
  T: MailTransport,
{
  let mut ticker = tokio::time::interval(interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  loop {
    ticker.tick().await;
    if let Err(e) = agent.sweep(Utc::now()).await {
      tracing::error!(error = %e, "sweep failed");
    }
  }
}
