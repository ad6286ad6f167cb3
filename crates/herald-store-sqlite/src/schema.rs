//! SQL schema for the Herald SQLite store.
//!
//! Executed once at connection startup. Timestamps are fixed-width RFC 3339
//! strings so that text comparison orders them chronologically.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- At most one tracked removal per manager assignment.
CREATE TABLE IF NOT EXISTS manager_notification (
    manager_assignment_id TEXT PRIMARY KEY,
    employee_id           TEXT,              -- NULL for vacant assignments
    org_unit_id           TEXT NOT NULL,
    kind                  TEXT NOT NULL,     -- 'terminated' | 'vacant'
    end_date              TEXT NOT NULL,
    pre_notification_sent INTEGER NOT NULL DEFAULT 0,
    notification_sent     INTEGER NOT NULL DEFAULT 0,
    notification_sent_at  TEXT,              -- NULL until the main phase is sent
    created_at            TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS manager_notification_end_idx
    ON manager_notification(end_date);

CREATE INDEX IF NOT EXISTS manager_notification_sent_idx
    ON manager_notification(notification_sent_at);

-- Last rendered notification content per entity (IT users).
CREATE TABLE IF NOT EXISTS last_sent (
    entity_id TEXT PRIMARY KEY,
    content   TEXT NOT NULL,   -- JSON
    sent_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS last_sent_at_idx ON last_sent(sent_at);

PRAGMA user_version = 1;
";
