use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS euer_classifications (
    id INTEGER PRIMARY KEY,
    source_type TEXT NOT NULL,
    source_id TEXT NOT NULL,
    tax_year INTEGER NOT NULL,
    eur_line_id TEXT,
    is_excluded INTEGER NOT NULL DEFAULT 0,
    vat_mode TEXT NOT NULL DEFAULT 'none',
    note TEXT,
    updated_at TEXT NOT NULL,
    UNIQUE (source_type, source_id, tax_year)
);

CREATE TABLE IF NOT EXISTS euer_rules (
    id INTEGER PRIMARY KEY,
    tax_year INTEGER NOT NULL,
    priority INTEGER NOT NULL DEFAULT 100,
    field TEXT NOT NULL,
    operator TEXT NOT NULL,
    value TEXT NOT NULL,
    target_eur_line_id TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_euer_rules_tax_year ON euer_rules (tax_year);

CREATE TABLE IF NOT EXISTS invoices (
    id INTEGER PRIMARY KEY,
    number TEXT NOT NULL,
    direction TEXT NOT NULL,
    counterparty TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    total_gross REAL NOT NULL,
    status TEXT NOT NULL DEFAULT 'open',
    paid_at TEXT,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS bank_transactions (
    id INTEGER PRIMARY KEY,
    account_id INTEGER,
    date TEXT NOT NULL,
    amount REAL NOT NULL,
    counterparty TEXT NOT NULL DEFAULT '',
    purpose TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'booked',
    linked_invoice_id INTEGER,
    deleted_at TEXT,
    FOREIGN KEY (linked_invoice_id) REFERENCES invoices(id)
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
