//! Semicolon-separated export of a report for spreadsheet tools.

use crate::error::{EuerError, Result};
use crate::fmt::de_amount;
use crate::reports::Report;

const BOM: &str = "\u{feff}";
const HEADER: [&str; 3] = ["Kennziffer", "Bezeichnung", "Betrag"];

/// Exportable rows in catalog order. Fields containing `;`, `"` or a line
/// break are quoted with inner quotes doubled.
pub fn export_csv(report: &Report) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    wtr.write_record(HEADER)?;
    for row in report.rows.iter().filter(|r| r.exportable) {
        wtr.write_record([
            row.kennziffer.as_deref().unwrap_or(""),
            row.label.as_str(),
            de_amount(row.total).as_str(),
        ])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| EuerError::Io(e.into_error()))?;
    let body = String::from_utf8(bytes).map_err(|e| EuerError::Other(e.to_string()))?;
    Ok(format!("{BOM}{body}"))
}
