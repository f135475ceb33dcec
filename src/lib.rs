//! EÜR line classification and reporting.
//!
//! Events (booked bank transactions and paid invoices) are classified onto
//! lines of the yearly Anlage EÜR schedule, the suggestion pipeline proposes
//! lines for undecided events, and the aggregator turns decisions into line
//! totals and an export.

pub mod catalog;
pub mod classifications;
pub mod db;
pub mod error;
pub mod events;
pub mod export;
pub mod fmt;
pub mod models;
pub mod reports;
pub mod reviewer;
pub mod rules;
pub mod settings;
pub mod suggest;

pub use error::{CatalogError, EuerError, Result};
