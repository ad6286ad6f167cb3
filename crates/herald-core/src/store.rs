//! The `NotificationStore` and `SentCache` traits.
//!
//! Both are implemented by storage backends (e.g. `herald-store-sqlite`); the
//! cache also has an in-memory implementation in [`crate::cache`]. The rule
//! engine and the sweep depend on these abstractions only.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
  intent::TrackOutcome,
  record::{NotificationRecord, Phase},
};

// ─── Notification state ──────────────────────────────────────────────────────

/// Persistent bookkeeping for deferred manager alerts.
///
/// Implementations must run [`NotificationStore::track`] as a single
/// transaction, and must keep the sweep queries free of any transaction that
/// outlives the call.
pub trait NotificationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The record for an assignment, if any.
  fn find(
    &self,
    manager_assignment_id: Uuid,
  ) -> impl Future<Output = Result<Option<NotificationRecord>, Self::Error>> + Send + '_;

  /// Insert `record`, or overwrite the record with the same key.
  fn upsert(
    &self,
    record: NotificationRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete `record` if it is still the tracked one (same key and end date).
  /// Returns whether a row was removed.
  fn delete<'a>(
    &'a self,
    record: &'a NotificationRecord,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Reconcile a candidate against the stored record atomically:
  /// same end date is a duplicate, a different end date replaces the old
  /// record, no record inserts the candidate.
  fn track(
    &self,
    candidate: NotificationRecord,
  ) -> impl Future<Output = Result<TrackOutcome, Self::Error>> + Send + '_;

  /// Records with `pre_notification_sent = false` and
  /// `now < end_date <= now + lead_time`.
  fn due_for_pre_notification(
    &self,
    now: DateTime<Utc>,
    lead_time: Duration,
  ) -> impl Future<Output = Result<Vec<NotificationRecord>, Self::Error>> + Send + '_;

  /// Records with `notification_sent = false` and `end_date <= now`.
  fn due_for_notification(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<NotificationRecord>, Self::Error>> + Send + '_;

  /// Flip the sent flag for `phase` if the tracked record still matches
  /// `(manager_assignment_id, end_date)`. The main phase also records `at` as
  /// `notification_sent_at`. Returns whether a row was updated.
  fn mark_sent<'a>(
    &'a self,
    record: &'a NotificationRecord,
    phase: Phase,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Delete completed records whose main notification was sent before
  /// `before`.
  fn purge_completed(
    &self,
    before: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

// ─── Last-sent cache ─────────────────────────────────────────────────────────

/// The last rendered content sent per tracked entity.
///
/// Used to suppress re-sending an identical notification on repeated events.
/// Implementations decide retention; entries may disappear at any time.
pub trait SentCache: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn last_sent(
    &self,
    entity_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<serde_json::Value>, Self::Error>> + Send + '_;

  fn record_sent(
    &self,
    entity_id: Uuid,
    content: serde_json::Value,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
