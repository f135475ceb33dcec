use rusqlite::{Connection, Row};

use crate::error::{EuerError, Result};
use crate::models::{Rule, RuleInput};

const COLUMNS: &str = "id, tax_year, priority, field, operator, value, target_eur_line_id, is_active";

type RawRule = (i64, i32, i64, String, String, String, String, bool);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRule> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn into_rule(raw: RawRule) -> Result<Rule> {
    let (id, tax_year, priority, field, operator, value, target_eur_line_id, active) = raw;
    Ok(Rule {
        id,
        tax_year,
        priority,
        field: field.parse()?,
        operator: operator.parse()?,
        value,
        target_eur_line_id,
        active,
    })
}

fn query_rules(conn: &Connection, sql: &str, tax_year: i32) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare(sql)?;
    let raw = stmt
        .query_map([tax_year], read_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raw.into_iter().map(into_rule).collect()
}

pub fn get_rule(conn: &Connection, id: i64) -> Result<Rule> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM euer_rules WHERE id = ?1"),
            [id],
            read_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => EuerError::Other(format!("No rule with ID {id}")),
            other => EuerError::Db(other),
        })?;
    into_rule(raw)
}

pub fn add_rule(conn: &Connection, input: &RuleInput) -> Result<Rule> {
    conn.execute(
        "INSERT INTO euer_rules (tax_year, priority, field, operator, value, target_eur_line_id, is_active) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            input.tax_year,
            input.priority,
            input.field.as_str(),
            input.operator.as_str(),
            input.value,
            input.target_eur_line_id,
            input.active,
        ],
    )?;
    get_rule(conn, conn.last_insert_rowid())
}

/// Insert when `input.id` is `None`, otherwise overwrite the existing rule.
pub fn upsert_rule(conn: &Connection, input: &RuleInput) -> Result<Rule> {
    let Some(id) = input.id else {
        return add_rule(conn, input);
    };
    let changed = conn.execute(
        "UPDATE euer_rules SET tax_year = ?1, priority = ?2, field = ?3, operator = ?4, value = ?5, \
         target_eur_line_id = ?6, is_active = ?7 WHERE id = ?8",
        rusqlite::params![
            input.tax_year,
            input.priority,
            input.field.as_str(),
            input.operator.as_str(),
            input.value,
            input.target_eur_line_id,
            input.active,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(EuerError::Other(format!("No rule with ID {id}")));
    }
    get_rule(conn, id)
}

pub fn delete_rule(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM euer_rules WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(EuerError::Other(format!("No rule with ID {id}")));
    }
    Ok(())
}

pub fn list_rules(conn: &Connection, tax_year: i32) -> Result<Vec<Rule>> {
    query_rules(
        conn,
        &format!("SELECT {COLUMNS} FROM euer_rules WHERE tax_year = ?1 ORDER BY priority ASC, id ASC"),
        tax_year,
    )
}

/// Active rules of a year in evaluation order.
pub fn list_active_rules(conn: &Connection, tax_year: i32) -> Result<Vec<Rule>> {
    query_rules(
        conn,
        &format!(
            "SELECT {COLUMNS} FROM euer_rules WHERE tax_year = ?1 AND is_active = 1 \
             ORDER BY priority ASC, id ASC"
        ),
        tax_year,
    )
}
