//! Label tables written by the upload event handler.
//!
//! Rows are keyed by (image name, label name). Every backend upserts, so a
//! redelivered upload event rewrites the same rows instead of adding new ones.

mod dynamodb;

use anyhow::Result;
use rusqlite::{params, Connection};

pub use dynamodb::{put_item_request, DynamoLabelTable};

/// One detected label for one image.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelRecord {
    pub image_name: String,
    pub label_name: String,
    pub confidence: f64,
}

pub trait LabelTable {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Insert or overwrite the row for `(image_name, label_name)`.
    fn put_label(&mut self, record: &LabelRecord) -> Result<()>;
}

pub struct SqliteLabelTable {
    conn: Connection,
}

impl SqliteLabelTable {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut table = Self { conn };
        table.ensure_schema()?;
        Ok(table)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS image_labels (
              image_name TEXT NOT NULL,
              label_name TEXT NOT NULL,
              confidence REAL NOT NULL,
              PRIMARY KEY (image_name, label_name)
            );
            "#,
        )?;
        Ok(())
    }

    /// Rows for one image, ordered by label name.
    pub fn labels_for_image(&self, image_name: &str) -> Result<Vec<LabelRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT image_name, label_name, confidence FROM image_labels
             WHERE image_name = ?1 ORDER BY label_name ASC",
        )?;
        let rows = stmt.query_map(params![image_name], |row| {
            Ok(LabelRecord {
                image_name: row.get(0)?,
                label_name: row.get(1)?,
                confidence: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl LabelTable for SqliteLabelTable {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn put_label(&mut self, record: &LabelRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO image_labels(image_name, label_name, confidence)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(image_name, label_name) DO UPDATE SET confidence = excluded.confidence
            "#,
            params![record.image_name, record.label_name, record.confidence],
        )?;
        Ok(())
    }
}

/// Table kept in memory. `writes` counts every put, including overwrites.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLabelTable {
    records: Vec<LabelRecord>,
    writes: usize,
}

impl InMemoryLabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[LabelRecord] {
        &self.records
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl LabelTable for InMemoryLabelTable {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn put_label(&mut self, record: &LabelRecord) -> Result<()> {
        self.writes += 1;
        match self.records.iter_mut().find(|existing| {
            existing.image_name == record.image_name && existing.label_name == record.label_name
        }) {
            Some(existing) => existing.confidence = record.confidence,
            None => self.records.push(record.clone()),
        }
        Ok(())
    }
}
