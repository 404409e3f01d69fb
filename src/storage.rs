use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::open_db_connection;

pub type RecordId = i64;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock time in the stored timestamp format.
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// One persisted detection run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    pub id: RecordId,
    pub detection_type: String,
    pub source: String,
    pub detected_at: String,
    pub summary: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackKind {
    #[serde(rename = "Bug Feedback")]
    Bug,
    #[serde(rename = "Feature Suggestions")]
    Feature,
    #[serde(rename = "Interface Issues")]
    Interface,
    #[serde(rename = "Other")]
    Other,
}

impl FeedbackKind {
    pub const ALL: [FeedbackKind; 4] = [
        FeedbackKind::Bug,
        FeedbackKind::Feature,
        FeedbackKind::Interface,
        FeedbackKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Bug => "Bug Feedback",
            FeedbackKind::Feature => "Feature Suggestions",
            FeedbackKind::Interface => "Interface Issues",
            FeedbackKind::Other => "Other",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackKind {
    type Err = anyhow::Error;

    /// Accepts the stored names and the short forms `bug`, `feature`,
    /// `interface`, `other`.
    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        FeedbackKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
            .or(match value.to_ascii_lowercase().as_str() {
                "bug" => Some(FeedbackKind::Bug),
                "feature" => Some(FeedbackKind::Feature),
                "interface" | "ui" => Some(FeedbackKind::Interface),
                "other" => Some(FeedbackKind::Other),
                _ => None,
            })
            .ok_or_else(|| anyhow!("unknown feedback kind '{}'", value))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedbackEntry {
    pub id: i64,
    pub kind: FeedbackKind,
    pub content: String,
    pub contact: Option<String>,
    pub submitted_at: String,
}

/// Run summaries. Records are created when a run starts and updated once
/// when it ends.
pub trait HistoryStore {
    fn create_record(
        &mut self,
        detection_type: &str,
        source: &str,
        initial_summary: &str,
    ) -> Result<RecordId>;

    /// Errors when no record has this id.
    fn update_summary(&mut self, id: RecordId, summary: &str) -> Result<()>;

    /// Newest first.
    fn list_records(&self) -> Result<Vec<HistoryRecord>>;
}

pub trait FeedbackStore {
    fn add_feedback(
        &mut self,
        kind: FeedbackKind,
        content: &str,
        contact: Option<&str>,
    ) -> Result<i64>;

    /// Newest first.
    fn list_feedback(&self) -> Result<Vec<FeedbackEntry>>;
}

fn validate_feedback<'a>(
    content: &'a str,
    contact: Option<&'a str>,
) -> Result<(&'a str, Option<&'a str>)> {
    let content = content.trim();
    if content.is_empty() {
        return Err(anyhow!("feedback content must not be empty"));
    }
    let contact = contact.map(str::trim).filter(|c| !c.is_empty());
    Ok((content, contact))
}

// ----------------------------------------------------------------------------
// SQLite
// ----------------------------------------------------------------------------

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file, or a `file:` URI such as
    /// `crate::shared_memory_uri()`.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn =
            open_db_connection(db_path).with_context(|| format!("open database {}", db_path))?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS detection_history (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              detection_type TEXT NOT NULL,
              source TEXT NOT NULL,
              detected_at TEXT NOT NULL,
              summary TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS feedback (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              kind TEXT NOT NULL,
              content TEXT NOT NULL,
              contact TEXT,
              submitted_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_time ON detection_history(detected_at);
            "#,
        )?;
        Ok(())
    }
}

impl HistoryStore for SqliteStore {
    fn create_record(
        &mut self,
        detection_type: &str,
        source: &str,
        initial_summary: &str,
    ) -> Result<RecordId> {
        self.conn.execute(
            "INSERT INTO detection_history(detection_type, source, detected_at, summary) VALUES (?1, ?2, ?3, ?4)",
            params![detection_type, source, timestamp_now(), initial_summary],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_summary(&mut self, id: RecordId, summary: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE detection_history SET summary = ?1 WHERE id = ?2",
            params![summary, id],
        )?;
        if changed == 0 {
            return Err(anyhow!("history record {} not found", id));
        }
        Ok(())
    }

    fn list_records(&self) -> Result<Vec<HistoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, detection_type, source, detected_at, summary FROM detection_history ORDER BY detected_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HistoryRecord {
                id: row.get(0)?,
                detection_type: row.get(1)?,
                source: row.get(2)?,
                detected_at: row.get(3)?,
                summary: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl FeedbackStore for SqliteStore {
    fn add_feedback(
        &mut self,
        kind: FeedbackKind,
        content: &str,
        contact: Option<&str>,
    ) -> Result<i64> {
        let (content, contact) = validate_feedback(content, contact)?;
        self.conn.execute(
            "INSERT INTO feedback(kind, content, contact, submitted_at) VALUES (?1, ?2, ?3, ?4)",
            params![kind.as_str(), content, contact, timestamp_now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_feedback(&self) -> Result<Vec<FeedbackEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, content, contact, submitted_at FROM feedback ORDER BY submitted_at DESC, id DESC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let kind: String = row.get(1)?;
            out.push(FeedbackEntry {
                id: row.get(0)?,
                kind: kind.parse()?,
                content: row.get(2)?,
                contact: row.get(3)?,
                submitted_at: row.get(4)?,
            });
        }
        Ok(out)
    }
}

// ----------------------------------------------------------------------------
// In-memory
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    records: Vec<HistoryRecord>,
    feedback: Vec<FeedbackEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for InMemoryStore {
    fn create_record(
        &mut self,
        detection_type: &str,
        source: &str,
        initial_summary: &str,
    ) -> Result<RecordId> {
        let id = self.records.last().map_or(1, |record| record.id + 1);
        self.records.push(HistoryRecord {
            id,
            detection_type: detection_type.to_string(),
            source: source.to_string(),
            detected_at: timestamp_now(),
            summary: initial_summary.to_string(),
        });
        Ok(id)
    }

    fn update_summary(&mut self, id: RecordId, summary: &str) -> Result<()> {
        let record = self
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| anyhow!("history record {} not found", id))?;
        record.summary = summary.to_string();
        Ok(())
    }

    fn list_records(&self) -> Result<Vec<HistoryRecord>> {
        let mut out = self.records.clone();
        out.sort_by(|a, b| {
            b.detected_at
                .cmp(&a.detected_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(out)
    }
}

impl FeedbackStore for InMemoryStore {
    fn add_feedback(
        &mut self,
        kind: FeedbackKind,
        content: &str,
        contact: Option<&str>,
    ) -> Result<i64> {
        let (content, contact) = validate_feedback(content, contact)?;
        let id = self.feedback.last().map_or(1, |entry| entry.id + 1);
        self.feedback.push(FeedbackEntry {
            id,
            kind,
            content: content.to_string(),
            contact: contact.map(str::to_string),
            submitted_at: timestamp_now(),
        });
        Ok(id)
    }

    fn list_feedback(&self) -> Result<Vec<FeedbackEntry>> {
        let mut out = self.feedback.clone();
        out.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(out)
    }
}
