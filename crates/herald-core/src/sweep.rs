//! The periodic two-phase sweep over tracked manager removals.
//!
//! Each run reads the due records, renders and dispatches each one outside any
//! store transaction, and only then flips the phase flag. Failures are
//! isolated per record.

use chrono::{DateTime, Duration, Utc};

use crate::{
  Error, Result,
  dispatch::{MailTransport, Mailer},
  intent::SuppressReason,
  record::{NotificationRecord, Phase},
  rules::{ManagerAlert, RuleEngine},
  source::DataSource,
  store::{NotificationStore, SentCache},
};

/// Timing parameters for [`run_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
  /// How far ahead of the end date the pre-notification goes out.
  pub lead_time:           Duration,
  /// How long completed records stay around as duplicates.
  pub completed_retention: Duration,
}

impl Default for SweepSchedule {
  fn default() -> Self {
    Self { lead_time: Duration::days(14), completed_retention: Duration::days(30) }
  }
}

/// Counters for one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  pub sent:    usize,
  /// Rendering or dispatch failed; the record stays due.
  pub failed:  usize,
  /// The alert was suppressed for now; the record stays due.
  pub skipped: usize,
  /// The record could no longer be resolved and was deleted.
  pub dropped: usize,
  pub purged:  usize,
}

enum Processed {
  Sent,
  Skipped,
  Dropped,
}

/// Run both phases once as of `now`, then purge old completed records.
///
/// Only the store queries themselves can fail the run.
pub async fn run_once<D, S, C, T>(
  engine: &RuleEngine<D, S, C>,
  mailer: &Mailer<T>,
  schedule: &SweepSchedule,
  now: DateTime<Utc>,
) -> Result<SweepReport>
where
  D: DataSource,
  S: NotificationStore,
  C: SentCache,
  T: MailTransport,
{
  let store = engine.store();
  let mut report = SweepReport::default();

  let pre = store
    .due_for_pre_notification(now, schedule.lead_time)
    .await
    .map_err(Error::store)?;
  run_phase(engine, mailer, Phase::Pre, &pre, now, &mut report).await;

  let main = store.due_for_notification(now).await.map_err(Error::store)?;
  run_phase(engine, mailer, Phase::Main, &main, now, &mut report).await;

  report.purged = store
    .purge_completed(now - schedule.completed_retention)
    .await
    .map_err(Error::store)?;

  tracing::info!(
    sent = report.sent,
    failed = report.failed,
    skipped = report.skipped,
    dropped = report.dropped,
    purged = report.purged,
    "sweep finished"
  );
  Ok(report)
}

async fn run_phase<D, S, C, T>(
  engine: &RuleEngine<D, S, C>,
  mailer: &Mailer<T>,
  phase: Phase,
  records: &[NotificationRecord],
  now: DateTime<Utc>,
  report: &mut SweepReport,
) where
  D: DataSource,
  S: NotificationStore,
  C: SentCache,
  T: MailTransport,
{
  for record in records {
    match process(engine, mailer, phase, record, now).await {
      Ok(Processed::Sent) => report.sent += 1,
      Ok(Processed::Skipped) => report.skipped += 1,
      Ok(Processed::Dropped) => report.dropped += 1,
      Err(error) => {
        report.failed += 1;
        tracing::error!(
          manager = %record.manager_assignment_id,
          ?phase,
          %error,
          "failed to send manager notification"
        );
      }
    }
  }
}

async fn process<D, S, C, T>(
  engine: &RuleEngine<D, S, C>,
  mailer: &Mailer<T>,
  phase: Phase,
  record: &NotificationRecord,
  now: DateTime<Utc>,
) -> Result<Processed>
where
  D: DataSource,
  S: NotificationStore,
  C: SentCache,
  T: MailTransport,
{
  let store = engine.store();

  let intent = match engine.manager_alert(&ManagerAlert::from(record), phase, now).await? {
    Ok(intent) => intent,
    Err(SuppressReason::OrgUnitUnresolvable) => {
      store.delete(record).await.map_err(Error::store)?;
      tracing::warn!(
        manager = %record.manager_assignment_id,
        org_unit = %record.org_unit_id,
        "org unit no longer resolvable; tracked removal dropped"
      );
      return Ok(Processed::Dropped);
    }
    Err(reason) => {
      tracing::warn!(manager = %record.manager_assignment_id, ?phase, %reason, "manager notification skipped");
      return Ok(Processed::Skipped);
    }
  };

  mailer.deliver(&intent).await?;

  if !store.mark_sent(record, phase, now).await.map_err(Error::store)? {
    tracing::warn!(
      manager = %record.manager_assignment_id,
      "tracked removal changed during dispatch; flag not updated"
    );
  }
  tracing::info!(manager = %record.manager_assignment_id, ?phase, "manager notification sent");
  Ok(Processed::Sent)
}
