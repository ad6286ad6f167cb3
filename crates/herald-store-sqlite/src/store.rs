//! [`SqliteStore`]: the SQLite implementation of [`NotificationStore`] and
//! [`SentCache`].

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use herald_core::{
  intent::TrackOutcome,
  record::{NotificationRecord, Phase},
  store::{NotificationStore, SentCache},
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Result,
  encode::{EncodedRecord, RECORD_COLUMNS, RawRecord, decode_dt, encode_dt, encode_uuid},
  error::Error,
  schema::SCHEMA,
};

/// Default retention of last-sent cache rows, in days.
pub const DEFAULT_SENT_TTL_DAYS: i64 = 30;

// ─── Store ───────────────────────────────────────────────────────────────────

/// Notification state backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:     tokio_rusqlite::Connection,
  sent_ttl: Duration,
}

/// What [`NotificationStore::track`] found, before decoding.
enum RawTrack {
  Inserted,
  Replaced(RawRecord),
  Duplicate,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, sent_ttl: Duration::days(DEFAULT_SENT_TTL_DAYS) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, sent_ttl: Duration::days(DEFAULT_SENT_TTL_DAYS) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Set the retention of last-sent cache rows.
  pub fn with_sent_ttl(mut self, ttl: Duration) -> Self {
    self.sent_ttl = ttl;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn select_records(
    &self,
    filter: &'static str,
    params: Vec<String>,
  ) -> Result<Vec<NotificationRecord>> {
    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {RECORD_COLUMNS} FROM manager_notification WHERE {filter} ORDER BY end_date"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }
}

// ─── NotificationStore impl ──────────────────────────────────────────────────

impl NotificationStore for SqliteStore {
  type Error = Error;

  async fn find(&self, manager_assignment_id: Uuid) -> Result<Option<NotificationRecord>> {
    let id_str = encode_uuid(manager_assignment_id);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RECORD_COLUMNS} FROM manager_notification \
                 WHERE manager_assignment_id = ?1"
              ),
              rusqlite::params![id_str],
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn upsert(&self, record: NotificationRecord) -> Result<()> {
    let encoded = EncodedRecord::from(&record);
    self
      .conn
      .call(move |conn| {
        encoded.insert(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete<'a>(&'a self, record: &'a NotificationRecord) -> Result<bool> {
    let id_str = encode_uuid(record.manager_assignment_id);
    let end_str = encode_dt(record.end_date);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM manager_notification
           WHERE manager_assignment_id = ?1 AND end_date = ?2",
          rusqlite::params![id_str, end_str],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn track(&self, candidate: NotificationRecord) -> Result<TrackOutcome> {
    let encoded = EncodedRecord::from(&candidate);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let existing = tx
          .query_row(
            &format!(
              "SELECT {RECORD_COLUMNS} FROM manager_notification \
               WHERE manager_assignment_id = ?1"
            ),
            rusqlite::params![encoded.manager_assignment_id],
            RawRecord::from_row,
          )
          .optional()?;

        let outcome = match existing {
          Some(row) if row.end_date == encoded.end_date => return Ok(RawTrack::Duplicate),
          Some(row) => {
            tx.execute(
              "DELETE FROM manager_notification WHERE manager_assignment_id = ?1",
              rusqlite::params![encoded.manager_assignment_id],
            )?;
            RawTrack::Replaced(row)
          }
          None => RawTrack::Inserted,
        };
        encoded.insert(&tx)?;
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(match raw {
      RawTrack::Inserted => TrackOutcome::Inserted,
      RawTrack::Duplicate => TrackOutcome::Duplicate,
      RawTrack::Replaced(previous) => TrackOutcome::Replaced { previous: previous.into_record()? },
    })
  }

  async fn due_for_pre_notification(
    &self,
    now: DateTime<Utc>,
    lead_time: Duration,
  ) -> Result<Vec<NotificationRecord>> {
    self
      .select_records(
        "pre_notification_sent = 0 AND end_date > ?1 AND end_date <= ?2",
        vec![encode_dt(now), encode_dt(now + lead_time)],
      )
      .await
  }

  async fn due_for_notification(&self, now: DateTime<Utc>) -> Result<Vec<NotificationRecord>> {
    self
      .select_records("notification_sent = 0 AND end_date <= ?1", vec![encode_dt(now)])
      .await
  }

  async fn mark_sent<'a>(
    &'a self,
    record: &'a NotificationRecord,
    phase: Phase,
    at: DateTime<Utc>,
  ) -> Result<bool> {
    let id_str = encode_uuid(record.manager_assignment_id);
    let end_str = encode_dt(record.end_date);
    let at_str = encode_dt(at);

    let updated = self
      .conn
      .call(move |conn| {
        Ok(match phase {
          Phase::Pre => conn.execute(
            "UPDATE manager_notification SET pre_notification_sent = 1
             WHERE manager_assignment_id = ?1 AND end_date = ?2",
            rusqlite::params![id_str, end_str],
          )?,
          Phase::Main => conn.execute(
            "UPDATE manager_notification SET notification_sent = 1, notification_sent_at = ?3
             WHERE manager_assignment_id = ?1 AND end_date = ?2",
            rusqlite::params![id_str, end_str, at_str],
          )?,
        })
      })
      .await?;
    Ok(updated > 0)
  }

  async fn purge_completed(&self, before: DateTime<Utc>) -> Result<usize> {
    let before_str = encode_dt(before);
    let purged = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM manager_notification
           WHERE notification_sent = 1 AND notification_sent_at < ?1",
          rusqlite::params![before_str],
        )?)
      })
      .await?;
    if purged > 0 {
      tracing::debug!(purged, "purged completed manager notifications");
    }
    Ok(purged)
  }
}

// ─── SentCache impl ──────────────────────────────────────────────────────────

impl SentCache for SqliteStore {
  type Error = Error;

  async fn last_sent(
    &self,
    entity_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Option<serde_json::Value>> {
    let id_str = encode_uuid(entity_id);

    let row: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT content, sent_at FROM last_sent WHERE entity_id = ?1",
              rusqlite::params![id_str],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let Some((content, sent_at)) = row else { return Ok(None) };
    if now - decode_dt(&sent_at)? > self.sent_ttl {
      return Ok(None);
    }
    Ok(Some(serde_json::from_str(&content)?))
  }

  async fn record_sent(
    &self,
    entity_id: Uuid,
    content: serde_json::Value,
    at: DateTime<Utc>,
  ) -> Result<()> {
    let id_str = encode_uuid(entity_id);
    let content_str = content.to_string();
    let at_str = encode_dt(at);
    let expired_str = encode_dt(at - self.sent_ttl);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT OR REPLACE INTO last_sent (entity_id, content, sent_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, content_str, at_str],
        )?;
        tx.execute("DELETE FROM last_sent WHERE sent_at < ?1", rusqlite::params![expired_str])?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
