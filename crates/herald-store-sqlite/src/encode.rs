//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! UUIDs are hyphenated lowercase strings. Timestamps are RFC 3339 in UTC with
//! microsecond precision and a `Z` suffix.

use chrono::{DateTime, SecondsFormat, Utc};
use herald_core::record::{NotificationRecord, RemovalKind};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── RemovalKind ─────────────────────────────────────────────────────────────

pub fn encode_kind(kind: RemovalKind) -> &'static str {
  match kind {
    RemovalKind::Terminated => "terminated",
    RemovalKind::Vacant => "vacant",
  }
}

pub fn decode_kind(s: &str) -> Result<RemovalKind> {
  match s {
    "terminated" => Ok(RemovalKind::Terminated),
    "vacant" => Ok(RemovalKind::Vacant),
    other => Err(Error::UnknownKind(other.to_owned())),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawRecord::from_row`].
pub const RECORD_COLUMNS: &str = "manager_assignment_id, employee_id, org_unit_id, kind, \
                                  end_date, pre_notification_sent, notification_sent, \
                                  notification_sent_at, created_at";

/// Raw values read directly from a `manager_notification` row.
pub struct RawRecord {
  pub manager_assignment_id: String,
  pub employee_id:           Option<String>,
  pub org_unit_id:           String,
  pub kind:                  String,
  pub end_date:              String,
  pub pre_notification_sent: bool,
  pub notification_sent:     bool,
  pub notification_sent_at:  Option<String>,
  pub created_at:            String,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      manager_assignment_id: row.get(0)?,
      employee_id:           row.get(1)?,
      org_unit_id:           row.get(2)?,
      kind:                  row.get(3)?,
      end_date:              row.get(4)?,
      pre_notification_sent: row.get(5)?,
      notification_sent:     row.get(6)?,
      notification_sent_at:  row.get(7)?,
      created_at:            row.get(8)?,
    })
  }

  pub fn into_record(self) -> Result<NotificationRecord> {
    Ok(NotificationRecord {
      manager_assignment_id: decode_uuid(&self.manager_assignment_id)?,
      employee_id:           self.employee_id.as_deref().map(decode_uuid).transpose()?,
      org_unit_id:           decode_uuid(&self.org_unit_id)?,
      kind:                  decode_kind(&self.kind)?,
      end_date:              decode_dt(&self.end_date)?,
      pre_notification_sent: self.pre_notification_sent,
      notification_sent:     self.notification_sent,
      notification_sent_at:  self.notification_sent_at.as_deref().map(decode_dt).transpose()?,
      created_at:            decode_dt(&self.created_at)?,
    })
  }
}

/// A record encoded for the `params!` of an insert.
pub struct EncodedRecord {
  pub manager_assignment_id: String,
  pub employee_id:           Option<String>,
  pub org_unit_id:           String,
  pub kind:                  &'static str,
  pub end_date:              String,
  pub pre_notification_sent: bool,
  pub notification_sent:     bool,
  pub notification_sent_at:  Option<String>,
  pub created_at:            String,
}

impl From<&NotificationRecord> for EncodedRecord {
  fn from(r: &NotificationRecord) -> Self {
    Self {
      manager_assignment_id: encode_uuid(r.manager_assignment_id),
      employee_id:           r.employee_id.map(encode_uuid),
      org_unit_id:           encode_uuid(r.org_unit_id),
      kind:                  encode_kind(r.kind),
      end_date:              encode_dt(r.end_date),
      pre_notification_sent: r.pre_notification_sent,
      notification_sent:     r.notification_sent,
      notification_sent_at:  r.notification_sent_at.map(encode_dt),
      created_at:            encode_dt(r.created_at),
    }
  }
}

impl EncodedRecord {
  /// Insert the record, replacing any row with the same key.
  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      "INSERT OR REPLACE INTO manager_notification
         (manager_assignment_id, employee_id, org_unit_id, kind, end_date,
          pre_notification_sent, notification_sent, notification_sent_at, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
      rusqlite::params![
        self.manager_assignment_id,
        self.employee_id,
        self.org_unit_id,
        self.kind,
        self.end_date,
        self.pre_notification_sent,
        self.notification_sent,
        self.notification_sent_at,
        self.created_at,
      ],
    )
  }
}
