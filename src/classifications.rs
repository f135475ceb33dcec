use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::{EuerError, Result};
use crate::models::{Classification, ClassificationInput, ClassificationKey};

const COLUMNS: &str =
    "id, source_type, source_id, tax_year, eur_line_id, is_excluded, vat_mode, note, updated_at";

struct RawRow {
    id: i64,
    source_type: String,
    source_id: String,
    tax_year: i32,
    eur_line_id: Option<String>,
    excluded: bool,
    vat_mode: String,
    note: Option<String>,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        source_type: row.get(1)?,
        source_id: row.get(2)?,
        tax_year: row.get(3)?,
        eur_line_id: row.get(4)?,
        excluded: row.get(5)?,
        vat_mode: row.get(6)?,
        note: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl TryFrom<RawRow> for Classification {
    type Error = EuerError;

    fn try_from(raw: RawRow) -> Result<Self> {
        let updated_at = DateTime::parse_from_rfc3339(&raw.updated_at)
            .map_err(|e| EuerError::Parse(format!("updated_at '{}': {e}", raw.updated_at)))?
            .with_timezone(&Utc);
        Ok(Classification {
            id: raw.id,
            source_type: raw.source_type.parse()?,
            source_id: raw.source_id,
            tax_year: raw.tax_year,
            eur_line_id: raw.eur_line_id.filter(|l| !l.is_empty()),
            excluded: raw.excluded,
            vat_mode: raw.vat_mode.parse()?,
            note: raw.note,
            updated_at,
        })
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn write(conn: &Connection, input: &ClassificationInput, updated_at: &str) -> Result<()> {
    let eur_line_id = if input.excluded {
        None
    } else {
        input.eur_line_id.as_deref().filter(|l| !l.is_empty())
    };
    conn.execute(
        "INSERT INTO euer_classifications \
         (source_type, source_id, tax_year, eur_line_id, is_excluded, vat_mode, note, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
         ON CONFLICT (source_type, source_id, tax_year) DO UPDATE SET \
         eur_line_id = excluded.eur_line_id, is_excluded = excluded.is_excluded, \
         vat_mode = excluded.vat_mode, note = excluded.note, updated_at = excluded.updated_at",
        rusqlite::params![
            input.source_type.as_str(),
            input.source_id,
            input.tax_year,
            eur_line_id,
            input.excluded,
            input.vat_mode.as_str(),
            input.note,
            updated_at,
        ],
    )?;
    Ok(())
}

fn read_back(conn: &Connection, key: &ClassificationKey) -> Result<Classification> {
    get_by_key(conn, key)?.ok_or_else(|| {
        EuerError::Other(format!(
            "classification {}:{} ({}) missing after write",
            key.source_type, key.source_id, key.tax_year
        ))
    })
}

fn input_key(input: &ClassificationInput) -> ClassificationKey {
    ClassificationKey::new(input.source_type, input.source_id.clone(), input.tax_year)
}

/// Insert or replace the decision for the input's key and return the stored row.
pub fn upsert(conn: &Connection, input: &ClassificationInput) -> Result<Classification> {
    write(conn, input, &timestamp())?;
    read_back(conn, &input_key(input))
}

/// Bulk variant of [`upsert`]; all rows are written in one transaction.
pub fn upsert_many(conn: &Connection, inputs: &[ClassificationInput]) -> Result<Vec<Classification>> {
    let tx = conn.unchecked_transaction()?;
    let stamp = timestamp();
    for input in inputs {
        write(&tx, input, &stamp)?;
    }
    let stored = inputs
        .iter()
        .map(|input| read_back(&tx, &input_key(input)))
        .collect::<Result<Vec<_>>>()?;
    tx.commit()?;
    info!(count = stored.len(), "classifications upserted");
    Ok(stored)
}

pub fn get_by_key(conn: &Connection, key: &ClassificationKey) -> Result<Option<Classification>> {
    let raw = conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM euer_classifications \
                 WHERE source_type = ?1 AND source_id = ?2 AND tax_year = ?3"
            ),
            rusqlite::params![key.source_type.as_str(), key.source_id, key.tax_year],
            read_row,
        )
        .optional()?;
    raw.map(Classification::try_from).transpose()
}

pub fn list_for_year(conn: &Connection, tax_year: i32) -> Result<Vec<Classification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM euer_classifications WHERE tax_year = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([tax_year], read_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(Classification::try_from).collect()
}

/// Classifications of a year keyed by `"{source_type}:{source_id}"`.
pub fn list_for_year_as_map(conn: &Connection, tax_year: i32) -> Result<HashMap<String, Classification>> {
    Ok(list_for_year(conn, tax_year)?
        .into_iter()
        .map(|c| (c.map_key(), c))
        .collect())
}

/// State of one key before a write, for undo.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub key: ClassificationKey,
    pub previous: Option<Classification>,
}

pub fn snapshot(conn: &Connection, keys: &[ClassificationKey]) -> Result<Vec<Snapshot>> {
    keys.iter()
        .map(|key| {
            Ok(Snapshot {
                key: key.clone(),
                previous: get_by_key(conn, key)?,
            })
        })
        .collect()
}

/// Write snapshots back. Keys that had no row get a cleared row, since
/// classifications are never deleted.
pub fn restore(conn: &Connection, snapshots: &[Snapshot]) -> Result<Vec<Classification>> {
    let inputs: Vec<ClassificationInput> = snapshots
        .iter()
        .map(|s| match &s.previous {
            Some(prev) => ClassificationInput::from(prev),
            None => ClassificationInput::cleared(&s.key),
        })
        .collect();
    info!(count = inputs.len(), "restoring classification snapshot");
    upsert_many(conn, &inputs)
}
