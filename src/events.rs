use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::error::{EuerError, Result};
use crate::fmt::round_cents;
use crate::models::{FlowType, RawEvent, SourceType};

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(EuerError::InvalidValue {
                field: "date range",
                value: format!("{from} > {to}"),
            });
        }
        Ok(Self { from, to })
    }

    pub fn calendar_year(year: i32) -> Result<Self> {
        let bound = |month, day| {
            NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| EuerError::InvalidValue {
                field: "tax year",
                value: year.to_string(),
            })
        };
        Self::new(bound(1, 1)?, bound(12, 31)?)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| EuerError::Parse(format!("date '{s}': {e}")))
}

/// Settled events feeding the pipeline and the aggregator.
pub trait EventSource {
    fn events(&self, range: &DateRange) -> Result<Vec<RawEvent>>;
}

impl EventSource for Vec<RawEvent> {
    fn events(&self, range: &DateRange) -> Result<Vec<RawEvent>> {
        Ok(self.iter().filter(|e| range.contains(e.date)).cloned().collect())
    }
}

/// Projection over `bank_transactions` and `invoices`.
pub struct SqliteEventSource<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteEventSource<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn transactions(&self, range: &DateRange) -> Result<Vec<RawEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, date, amount, counterparty, purpose, linked_invoice_id \
             FROM bank_transactions \
             WHERE status = 'booked' AND deleted_at IS NULL AND substr(date, 1, 10) BETWEEN ?1 AND ?2 \
             ORDER BY date, id",
        )?;
        let rows: Vec<(i64, Option<i64>, String, f64, String, String, Option<i64>)> = stmt
            .query_map(range_params(range), |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, account_id, date, amount, counterparty, purpose, linked)| -> Result<RawEvent> {
                let flow_type = if amount < 0.0 {
                    FlowType::Expense
                } else {
                    FlowType::Income
                };
                Ok(RawEvent {
                    source_type: SourceType::Transaction,
                    source_id: id.to_string(),
                    date: parse_date(&date)?,
                    amount_gross: to_amount(amount.abs())?,
                    flow_type,
                    counterparty,
                    purpose,
                    account_id,
                    linked_via_invoice: linked.is_some(),
                })
            })
            .collect()
    }

    /// Paid invoices. Outgoing invoices already reachable through a booked
    /// bank transaction are left out.
    fn invoices(&self, range: &DateRange) -> Result<Vec<RawEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, i.number, i.direction, i.counterparty, i.description, i.total_gross, i.paid_at \
             FROM invoices i \
             WHERE i.status = 'paid' AND i.deleted_at IS NULL AND i.paid_at IS NOT NULL \
             AND substr(i.paid_at, 1, 10) BETWEEN ?1 AND ?2 \
             AND NOT (i.direction = 'outgoing' AND EXISTS ( \
                 SELECT 1 FROM bank_transactions t WHERE t.linked_invoice_id = i.id \
                 AND t.status = 'booked' AND t.deleted_at IS NULL)) \
             ORDER BY i.paid_at, i.id",
        )?;
        let rows: Vec<(i64, String, String, String, String, f64, String)> = stmt
            .query_map(range_params(range), |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, number, direction, counterparty, description, total, paid_at)| -> Result<RawEvent> {
                let flow_type = match direction.as_str() {
                    "outgoing" => FlowType::Income,
                    "incoming" => FlowType::Expense,
                    other => {
                        return Err(EuerError::InvalidValue {
                            field: "invoice direction",
                            value: other.to_string(),
                        })
                    }
                };
                let purpose = if description.is_empty() {
                    format!("Rechnung {number}")
                } else {
                    format!("Rechnung {number} {description}")
                };
                Ok(RawEvent {
                    source_type: SourceType::Invoice,
                    source_id: id.to_string(),
                    date: parse_date(&paid_at)?,
                    amount_gross: to_amount(total.abs())?,
                    flow_type,
                    counterparty,
                    purpose,
                    account_id: None,
                    linked_via_invoice: false,
                })
            })
            .collect()
    }
}

impl EventSource for SqliteEventSource<'_> {
    fn events(&self, range: &DateRange) -> Result<Vec<RawEvent>> {
        let mut events = self.transactions(range)?;
        events.extend(self.invoices(range)?);
        events.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(events)
    }
}

fn range_params(range: &DateRange) -> [String; 2] {
    [
        range.from.format("%Y-%m-%d").to_string(),
        range.to.format("%Y-%m-%d").to_string(),
    ]
}

fn to_amount(value: f64) -> Result<Decimal> {
    Decimal::from_f64(value)
        .map(round_cents)
        .ok_or_else(|| EuerError::InvalidValue {
            field: "amount",
            value: value.to_string(),
        })
}
