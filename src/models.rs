use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EuerError;

macro_rules! text_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = EuerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(EuerError::InvalidValue {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Transaction,
    Invoice,
}

text_enum!(SourceType, "source type", {
    Transaction => "transaction",
    Invoice => "invoice",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    Income,
    Expense,
}

text_enum!(FlowType, "flow type", {
    Income => "income",
    Expense => "expense",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Income,
    Expense,
    Computed,
}

text_enum!(LineKind, "line kind", {
    Income => "income",
    Expense => "expense",
    Computed => "computed",
});

impl LineKind {
    /// Whether events of `flow` may be booked onto a line of this kind.
    pub fn accepts(&self, flow: FlowType) -> bool {
        matches!(
            (self, flow),
            (LineKind::Income, FlowType::Income) | (LineKind::Expense, FlowType::Expense)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VatMode {
    #[default]
    None,
    Default,
}

text_enum!(VatMode, "VAT mode", {
    None => "none",
    Default => "default",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleField {
    Counterparty,
    Purpose,
    Any,
}

text_enum!(RuleField, "rule field", {
    Counterparty => "counterparty",
    Purpose => "purpose",
    Any => "any",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Contains,
    Equals,
    StartsWith,
}

text_enum!(RuleOperator, "rule operator", {
    Contains => "contains",
    Equals => "equals",
    StartsWith => "starts_with",
});

/// Unique key of a classification row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassificationKey {
    pub source_type: SourceType,
    pub source_id: String,
    pub tax_year: i32,
}

impl ClassificationKey {
    pub fn new(source_type: SourceType, source_id: impl Into<String>, tax_year: i32) -> Self {
        Self {
            source_type,
            source_id: source_id.into(),
            tax_year,
        }
    }
}

/// `"{source_type}:{source_id}"`, the lookup key used during aggregation.
pub fn source_key(source_type: SourceType, source_id: &str) -> String {
    format!("{source_type}:{source_id}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub id: i64,
    pub source_type: SourceType,
    pub source_id: String,
    pub tax_year: i32,
    pub eur_line_id: Option<String>,
    pub excluded: bool,
    pub vat_mode: VatMode,
    pub note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Classification {
    pub fn key(&self) -> ClassificationKey {
        ClassificationKey::new(self.source_type, self.source_id.clone(), self.tax_year)
    }

    pub fn map_key(&self) -> String {
        source_key(self.source_type, &self.source_id)
    }

    /// Neither a line nor an exclusion has been decided.
    pub fn is_undecided(&self) -> bool {
        !self.excluded && self.eur_line_id.is_none()
    }
}

/// Write payload for the classification store.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationInput {
    pub source_type: SourceType,
    pub source_id: String,
    pub tax_year: i32,
    pub eur_line_id: Option<String>,
    pub excluded: bool,
    pub vat_mode: VatMode,
    pub note: Option<String>,
}

impl ClassificationInput {
    pub fn line(key: &ClassificationKey, eur_line_id: impl Into<String>, vat_mode: VatMode) -> Self {
        Self {
            source_type: key.source_type,
            source_id: key.source_id.clone(),
            tax_year: key.tax_year,
            eur_line_id: Some(eur_line_id.into()),
            excluded: false,
            vat_mode,
            note: None,
        }
    }

    pub fn excluded(key: &ClassificationKey) -> Self {
        Self {
            source_type: key.source_type,
            source_id: key.source_id.clone(),
            tax_year: key.tax_year,
            eur_line_id: None,
            excluded: true,
            vat_mode: VatMode::None,
            note: None,
        }
    }

    /// A row carrying no decision, used when undoing a first-time classification.
    pub fn cleared(key: &ClassificationKey) -> Self {
        Self {
            source_type: key.source_type,
            source_id: key.source_id.clone(),
            tax_year: key.tax_year,
            eur_line_id: None,
            excluded: false,
            vat_mode: VatMode::None,
            note: None,
        }
    }
}

impl From<&Classification> for ClassificationInput {
    fn from(c: &Classification) -> Self {
        Self {
            source_type: c.source_type,
            source_id: c.source_id.clone(),
            tax_year: c.tax_year,
            eur_line_id: c.eur_line_id.clone(),
            excluded: c.excluded,
            vat_mode: c.vat_mode,
            note: c.note.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub tax_year: i32,
    pub priority: i64,
    pub field: RuleField,
    pub operator: RuleOperator,
    pub value: String,
    pub target_eur_line_id: String,
    pub active: bool,
}

/// Write payload for the rule store; `id: None` inserts.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleInput {
    pub id: Option<i64>,
    pub tax_year: i32,
    pub priority: i64,
    pub field: RuleField,
    pub operator: RuleOperator,
    pub value: String,
    pub target_eur_line_id: String,
    pub active: bool,
}

/// Read-only projection of a settled bank transaction or paid invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawEvent {
    pub source_type: SourceType,
    pub source_id: String,
    pub date: NaiveDate,
    pub amount_gross: Decimal,
    pub flow_type: FlowType,
    pub counterparty: String,
    pub purpose: String,
    pub account_id: Option<i64>,
    pub linked_via_invoice: bool,
}

impl RawEvent {
    pub fn map_key(&self) -> String {
        source_key(self.source_type, &self.source_id)
    }

    pub fn key(&self, tax_year: i32) -> ClassificationKey {
        ClassificationKey::new(self.source_type, self.source_id.clone(), tax_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_text_roundtrip() {
        assert_eq!("starts_with".parse::<RuleOperator>().unwrap(), RuleOperator::StartsWith);
        assert_eq!(RuleOperator::StartsWith.as_str(), "starts_with");
        assert_eq!("invoice".parse::<SourceType>().unwrap(), SourceType::Invoice);
        assert_eq!(VatMode::Default.to_string(), "default");
    }

    #[test]
    fn test_unknown_enum_text_is_rejected() {
        let err = "regex".parse::<RuleOperator>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid rule operator: regex");
    }

    #[test]
    fn test_line_kind_accepts_matching_flow_only() {
        assert!(LineKind::Income.accepts(FlowType::Income));
        assert!(!LineKind::Income.accepts(FlowType::Expense));
        assert!(!LineKind::Computed.accepts(FlowType::Expense));
    }

    #[test]
    fn test_source_key_format() {
        assert_eq!(source_key(SourceType::Transaction, "42"), "transaction:42");
    }

    #[test]
    fn test_event_serializes_dates_as_iso() {
        let event = RawEvent {
            source_type: SourceType::Invoice,
            source_id: "7".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            amount_gross: Decimal::new(11900, 2),
            flow_type: FlowType::Income,
            counterparty: "ACME AG".into(),
            purpose: "Rechnung RE-7".into(),
            account_id: None,
            linked_via_invoice: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["date"], "2025-03-01");
        assert_eq!(json["source_type"], "invoice");
        assert_eq!(json["flow_type"], "income");
    }
}
