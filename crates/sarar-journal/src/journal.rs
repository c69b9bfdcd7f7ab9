//! Activity Journal.
//!
//! Persists the robot's conversations, movement commands, utterances and
//! free-text activity lines to a local SQLite database.  The structured
//! tables are rotated so each keeps at most `max_entries` rows (the oldest
//! rows are pruned on insert); the activity table is append-only.
//!
//! Every activity line is also emitted as a `tracing` event tagged with its
//! subsystem, so the console log and the journal tell the same story.
//!
//! # Storage layout
//!
//! | table               | columns                                                          |
//! |---------------------|------------------------------------------------------------------|
//! | `conversation_log`  | seq, id, timestamp, user_input, ai_response, processing_time, ai_source |
//! | `movement_log`      | seq, id, timestamp, command, duration, success                  |
//! | `speech_log`        | seq, id, timestamp, text, success                               |
//! | `activity_log`      | seq, timestamp, tag, details                                    |
//!
//! `seq` is an autoincrement key; "recent" queries order by it, newest first.
//!
//! # Example
//!
//! ```rust
//! use sarar_journal::Journal;
//! use sarar_types::AiSource;
//!
//! let journal = Journal::open_in_memory().unwrap();
//! journal.log_activity("COMMAND_PROCESSOR", "Processing command: 'status'");
//! journal.log_conversation("hello", "SARAR online.", 0.42, AiSource::Primary);
//!
//! let recent = journal.recent_conversations(5).unwrap();
//! assert_eq!(recent[0].ai_response, "SARAR online.");
//! ```

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use sarar_types::AiSource;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Rows kept per structured table unless configured otherwise.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from journal operations.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Journal connection lock poisoned")]
    Poisoned,
    #[error("Corrupt journal row: {0}")]
    Corrupt(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// One orchestrated AI exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    pub ai_response: String,
    /// Wall-clock seconds spent inside the orchestrator.
    pub processing_time: f64,
    pub ai_source: AiSource,
}

/// One drive command issued to the motors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// `"forward"`, `"backward"`, `"left"`, `"right"` or `"stop"`.
    pub command: String,
    /// Seconds the motors ran; `0.0` for a stop.
    pub duration: f32,
    pub success: bool,
}

/// One utterance handed to the voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub success: bool,
}

/// One free-text activity line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    /// Subsystem tag, e.g. `"AI_PROCESSOR_WARNING"`.
    pub tag: String,
    pub details: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Journal
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed activity journal.
///
/// The `log_*` methods never fail from the caller's point of view: a storage
/// error is reported through `tracing` and the record is dropped.  The
/// `recent_*` readers do return errors.
pub struct Journal {
    conn: Mutex<Connection>,
    max_entries: usize,
}

impl Journal {
    /// Open (or create) a persistent journal at `path`.
    pub fn open(path: &str) -> Result<Self, JournalError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a temporary in-memory journal (useful for testing).
    pub fn open_in_memory() -> Result<Self, JournalError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Set the per-table row cap (builder-style).  A cap of zero is treated
    /// as one.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    fn from_connection(conn: Connection) -> Result<Self, JournalError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversation_log (
                seq             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT NOT NULL,
                timestamp       TEXT NOT NULL,
                user_input      TEXT NOT NULL,
                ai_response     TEXT NOT NULL,
                processing_time REAL NOT NULL,
                ai_source       TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS movement_log (
                seq       INTEGER PRIMARY KEY AUTOINCREMENT,
                id        TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                command   TEXT NOT NULL,
                duration  REAL NOT NULL,
                success   INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS speech_log (
                seq       INTEGER PRIMARY KEY AUTOINCREMENT,
                id        TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                text      TEXT NOT NULL,
                success   INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS activity_log (
                seq       INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                tag       TEXT NOT NULL,
                details   TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_entries: DEFAULT_MAX_ENTRIES,
        })
    }

    // -------------------------------------------------------------------------
    // Writers
    // -------------------------------------------------------------------------

    /// Append a free-text activity line and mirror it to `tracing`.
    pub fn log_activity(&self, tag: &str, details: &str) {
        if tag.contains("ERROR") || tag.contains("WARN") {
            warn!(subsystem = tag, "{details}");
        } else {
            info!(subsystem = tag, "{details}");
        }
        let result = self.lock().and_then(|conn| {
            conn.execute(
                "INSERT INTO activity_log (timestamp, tag, details) VALUES (?1, ?2, ?3)",
                params![Utc::now().to_rfc3339(), tag, details],
            )?;
            Ok(())
        });
        if let Err(e) = result {
            warn!(error = %e, tag, "failed to journal activity line");
        }
    }

    /// Record one AI exchange and add a `CONVERSATION` activity line.
    pub fn log_conversation(
        &self,
        user_input: &str,
        ai_response: &str,
        processing_time: f64,
        ai_source: AiSource,
    ) {
        let result = self.lock().and_then(|conn| {
            conn.execute(
                "INSERT INTO conversation_log
                     (id, timestamp, user_input, ai_response, processing_time, ai_source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    Uuid::new_v4().to_string(),
                    Utc::now().to_rfc3339(),
                    user_input,
                    ai_response,
                    processing_time,
                    ai_source.as_str(),
                ],
            )?;
            self.prune(&conn, "conversation_log")
        });
        if let Err(e) = result {
            warn!(error = %e, "failed to journal conversation");
        }
        self.log_activity(
            "CONVERSATION",
            &format!("User: {user_input}, AI: {ai_response}"),
        );
    }

    /// Record one drive command and add a `MOVEMENT` activity line.
    pub fn log_movement(&self, command: &str, duration: f32, success: bool) {
        let result = self.lock().and_then(|conn| {
            conn.execute(
                "INSERT INTO movement_log (id, timestamp, command, duration, success)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    Utc::now().to_rfc3339(),
                    command,
                    f64::from(duration),
                    success,
                ],
            )?;
            self.prune(&conn, "movement_log")
        });
        if let Err(e) = result {
            warn!(error = %e, "failed to journal movement");
        }
        self.log_activity(
            "MOVEMENT",
            &format!("Command: {command}, Duration: {duration}, Success: {success}"),
        );
    }

    /// Record one utterance and add a `TTS` / `TTS_ERROR` activity line.
    pub fn log_speech(&self, text: &str, success: bool) {
        let result = self.lock().and_then(|conn| {
            conn.execute(
                "INSERT INTO speech_log (id, timestamp, text, success) VALUES (?1, ?2, ?3, ?4)",
                params![
                    Uuid::new_v4().to_string(),
                    Utc::now().to_rfc3339(),
                    text,
                    success,
                ],
            )?;
            self.prune(&conn, "speech_log")
        });
        if let Err(e) = result {
            warn!(error = %e, "failed to journal utterance");
        }
        if success {
            self.log_activity("TTS", &format!("Spoke: '{text}'"));
        } else {
            self.log_activity("TTS_ERROR", &format!("Failed to speak: '{text}'"));
        }
    }

    // -------------------------------------------------------------------------
    // Readers
    // -------------------------------------------------------------------------

    /// Return up to `limit` conversation records, newest first.
    pub fn recent_conversations(&self, limit: usize) -> Result<Vec<ConversationRecord>, JournalError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, user_input, ai_response, processing_time, ai_source
             FROM conversation_log ORDER BY seq DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, ts, user_input, ai_response, processing_time, source) = row?;
            records.push(ConversationRecord {
                id: parse_id(&id)?,
                timestamp: parse_timestamp(&ts)?,
                user_input,
                ai_response,
                processing_time,
                ai_source: parse_source(&source)?,
            });
        }
        Ok(records)
    }

    /// Return up to `limit` movement records, newest first.
    pub fn recent_movements(&self, limit: usize) -> Result<Vec<MovementRecord>, JournalError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, command, duration, success
             FROM movement_log ORDER BY seq DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, bool>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, ts, command, duration, success) = row?;
            records.push(MovementRecord {
                id: parse_id(&id)?,
                timestamp: parse_timestamp(&ts)?,
                command,
                duration: duration as f32,
                success,
            });
        }
        Ok(records)
    }

    /// Return up to `limit` utterance records, newest first.
    pub fn recent_speech(&self, limit: usize) -> Result<Vec<SpeechRecord>, JournalError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, text, success FROM speech_log ORDER BY seq DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, ts, text, success) = row?;
            records.push(SpeechRecord {
                id: parse_id(&id)?,
                timestamp: parse_timestamp(&ts)?,
                text,
                success,
            });
        }
        Ok(records)
    }

    /// Return up to `limit` activity lines, newest first.
    pub fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>, JournalError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, tag, details FROM activity_log ORDER BY seq DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (ts, tag, details) = row?;
            entries.push(ActivityEntry {
                timestamp: parse_timestamp(&ts)?,
                tag,
                details,
            });
        }
        Ok(entries)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JournalError> {
        self.conn.lock().map_err(|_| JournalError::Poisoned)
    }

    // `table` is always one of our own literals, never user input.
    fn prune(&self, conn: &Connection, table: &str) -> Result<(), JournalError> {
        conn.execute(
            &format!(
                "DELETE FROM {table} WHERE seq NOT IN
                     (SELECT seq FROM {table} ORDER BY seq DESC LIMIT ?1)"
            ),
            params![self.max_entries as i64],
        )?;
        Ok(())
    }
}

fn parse_id(raw: &str) -> Result<Uuid, JournalError> {
    Uuid::parse_str(raw).map_err(|e| JournalError::Corrupt(format!("id '{raw}': {e}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, JournalError> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| JournalError::Corrupt(format!("timestamp '{raw}': {e}")))
}

fn parse_source(raw: &str) -> Result<AiSource, JournalError> {
    match raw {
        "primary" => Ok(AiSource::Primary),
        "fallback" => Ok(AiSource::Fallback),
        "none" => Ok(AiSource::None),
        other => Err(JournalError::Corrupt(format!("ai_source '{other}'"))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
