use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::models::{FlowType, LineKind};

/// One row of an Anlage EÜR schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDefinition {
    pub id: String,
    pub tax_year: i32,
    pub kennziffer: Option<String>,
    pub label: String,
    pub kind: LineKind,
    pub exportable: bool,
    pub sort_order: i32,
    pub computed_from_ids: Vec<String>,
    pub source_version: String,
}

impl LineDefinition {
    pub fn is_computed(&self) -> bool {
        self.kind == LineKind::Computed
    }

    fn kennziffer_key(&self) -> Option<&str> {
        self.kennziffer
            .as_deref()
            .map(str::trim)
            .filter(|kz| !kz.is_empty())
    }
}

pub const SUPPORTED_YEARS: &[i32] = &[2024, 2025];

/// Kennziffer used when no other heuristic places an event.
pub const DEFAULT_INCOME_KENNZIFFER: &str = "112";
pub const DEFAULT_EXPENSE_KENNZIFFER: &str = "183";

type LineSpec = (
    &'static str,
    Option<&'static str>,
    LineKind,
    &'static str,
    bool,
    i32,
    &'static [&'static str],
);

// (slug, kennziffer, kind, label, exportable, sort_order, computed_from slugs)
const SCHEDULE: &[LineSpec] = &[
    // Betriebseinnahmen
    ("ku-einnahmen", Some("111"), LineKind::Income, "Betriebseinnahmen als umsatzsteuerlicher Kleinunternehmer", true, 10, &[]),
    ("steuerpflichtig", Some("112"), LineKind::Income, "Umsatzsteuerpflichtige Betriebseinnahmen", true, 20, &[]),
    ("steuerfrei", Some("103"), LineKind::Income, "Umsatzsteuerfreie, nicht umsatzsteuerbare Betriebseinnahmen", true, 30, &[]),
    ("anlageverkauf", Some("102"), LineKind::Income, "Veräußerung oder Entnahme von Anlagevermögen", true, 40, &[]),
    ("ust-vereinnahmt", Some("140"), LineKind::Income, "Vereinnahmte Umsatzsteuer", true, 50, &[]),
    ("ust-erstattet", Some("141"), LineKind::Income, "Vom Finanzamt erstattete und ggf. verrechnete Umsatzsteuer", true, 60, &[]),
    (
        "summe-einnahmen", Some("159"), LineKind::Computed, "Summe Betriebseinnahmen", true, 90,
        &["ku-einnahmen", "steuerpflichtig", "steuerfrei", "anlageverkauf", "ust-vereinnahmt", "ust-erstattet"],
    ),
    // Betriebsausgaben
    ("waren", Some("100"), LineKind::Expense, "Waren, Rohstoffe und Hilfsstoffe einschließlich der Nebenkosten", true, 110, &[]),
    ("fremdleistungen", Some("110"), LineKind::Expense, "Bezogene Fremdleistungen", true, 120, &[]),
    ("personal", Some("120"), LineKind::Expense, "Ausgaben für eigenes Personal", true, 130, &[]),
    ("miete", Some("150"), LineKind::Expense, "Miete/Pacht für Geschäftsräume und betrieblich genutzte Grundstücke", true, 140, &[]),
    ("telekommunikation", Some("280"), LineKind::Expense, "Aufwendungen für Telekommunikation", true, 150, &[]),
    ("edv", Some("228"), LineKind::Expense, "Laufende EDV-Kosten", true, 160, &[]),
    ("beratung", Some("194"), LineKind::Expense, "Rechts- und Steuerberatung, Buchführung", true, 170, &[]),
    ("werbung", Some("224"), LineKind::Expense, "Werbeaufwendungen", true, 180, &[]),
    ("reisekosten", Some("221"), LineKind::Expense, "Übernachtungs- und Reisenebenkosten bei Geschäftsreisen", true, 190, &[]),
    ("kfz-leasing", Some("145"), LineKind::Expense, "Leasingkosten für Kraftfahrzeuge", true, 200, &[]),
    ("kfz-steuer", Some("146"), LineKind::Expense, "Steuern, Versicherungen und Maut für Kraftfahrzeuge", true, 210, &[]),
    ("kfz-sonstige", Some("147"), LineKind::Expense, "Sonstige tatsächliche Fahrtkosten ohne AfA", true, 220, &[]),
    (
        "kfz-summe", None, LineKind::Computed, "Kraftfahrzeugkosten (Zwischensumme)", false, 230,
        &["kfz-leasing", "kfz-steuer", "kfz-sonstige"],
    ),
    ("gebuehren", Some("223"), LineKind::Expense, "Beiträge, Gebühren, Abgaben und Versicherungen", true, 240, &[]),
    ("zinsen", Some("234"), LineKind::Expense, "Übrige Schuldzinsen", true, 250, &[]),
    ("vorsteuer", Some("185"), LineKind::Expense, "Gezahlte Vorsteuerbeträge", true, 260, &[]),
    ("ust-gezahlt", Some("186"), LineKind::Expense, "An das Finanzamt gezahlte und ggf. verrechnete Umsatzsteuer", true, 270, &[]),
    ("sonstige", Some("183"), LineKind::Expense, "Übrige unbeschränkt abziehbare Betriebsausgaben", true, 280, &[]),
    (
        "summe-ausgaben", Some("199"), LineKind::Computed, "Summe Betriebsausgaben", true, 290,
        &[
            "waren", "fremdleistungen", "personal", "miete", "telekommunikation", "edv", "beratung",
            "werbung", "reisekosten", "kfz-summe", "gebuehren", "zinsen", "vorsteuer", "ust-gezahlt",
            "sonstige",
        ],
    ),
];

pub fn line_id(tax_year: i32, slug: &str) -> String {
    format!("{tax_year}-{slug}")
}

/// All built-in line definitions, every supported year.
pub fn definitions() -> Vec<LineDefinition> {
    SUPPORTED_YEARS
        .iter()
        .flat_map(|&year| {
            SCHEDULE
                .iter()
                .map(move |(slug, kz, kind, label, exportable, sort_order, children)| LineDefinition {
                    id: line_id(year, slug),
                    tax_year: year,
                    kennziffer: kz.map(str::to_string),
                    label: label.to_string(),
                    kind: *kind,
                    exportable: *exportable,
                    sort_order: *sort_order,
                    computed_from_ids: children.iter().map(|c| line_id(year, c)).collect(),
                    source_version: format!("Anlage EÜR {year}"),
                })
        })
        .collect()
}

/// Structural checks over a set of definitions, possibly spanning several years.
pub fn validate(lines: &[LineDefinition]) -> Result<(), CatalogError> {
    let mut by_id: HashMap<&str, &LineDefinition> = HashMap::with_capacity(lines.len());
    for line in lines {
        if by_id.insert(line.id.as_str(), line).is_some() {
            return Err(CatalogError::DuplicateId(line.id.clone()));
        }
    }

    let mut kennziffern: HashSet<(i32, &str)> = HashSet::new();
    for line in lines {
        if let Some(kz) = line.kennziffer_key() {
            if !kennziffern.insert((line.tax_year, kz)) {
                return Err(CatalogError::DuplicateKennziffer {
                    tax_year: line.tax_year,
                    kennziffer: kz.to_string(),
                });
            }
        }
    }

    for line in lines.iter().filter(|l| l.is_computed()) {
        for child in &line.computed_from_ids {
            match by_id.get(child.as_str()) {
                None => {
                    return Err(CatalogError::UnknownChild {
                        line: line.id.clone(),
                        child: child.clone(),
                    })
                }
                Some(c) if c.tax_year != line.tax_year => {
                    return Err(CatalogError::CrossYearChild {
                        line: line.id.clone(),
                        child: child.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }

    detect_cycle(lines, &by_id)
}

fn children_of<'a>(line: &'a LineDefinition) -> &'a [String] {
    if line.is_computed() {
        &line.computed_from_ids
    } else {
        &[]
    }
}

/// Iterative DFS. `visiting` holds the nodes on the current path, `done` the
/// nodes whose whole subtree has been explored.
fn detect_cycle(
    lines: &[LineDefinition],
    by_id: &HashMap<&str, &LineDefinition>,
) -> Result<(), CatalogError> {
    let mut visiting: HashSet<&str> = HashSet::new();
    let mut done: HashSet<&str> = HashSet::new();

    for root in lines.iter().filter(|l| l.is_computed()) {
        if done.contains(root.id.as_str()) {
            continue;
        }
        let mut stack: Vec<(&LineDefinition, usize)> = vec![(root, 0)];
        visiting.insert(root.id.as_str());

        while let Some(frame) = stack.last_mut() {
            let (node, next) = (frame.0, frame.1);
            let children = children_of(node);
            if next < children.len() {
                frame.1 += 1;
                let child_id = children[next].as_str();
                if visiting.contains(child_id) {
                    return Err(CatalogError::Cycle(child_id.to_string()));
                }
                if done.contains(child_id) {
                    continue;
                }
                // references were checked before, a miss cannot happen here
                if let Some(child) = by_id.get(child_id) {
                    visiting.insert(child_id);
                    stack.push((*child, 0));
                }
            } else {
                visiting.remove(node.id.as_str());
                done.insert(node.id.as_str());
                stack.pop();
            }
        }
    }
    Ok(())
}

/// Validated schedule of a single tax year, ordered by `sort_order`.
#[derive(Debug, Clone)]
pub struct Catalog {
    tax_year: i32,
    lines: Vec<LineDefinition>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Validate `lines` as a whole and keep the ones belonging to `tax_year`.
    pub fn from_lines(tax_year: i32, lines: Vec<LineDefinition>) -> Result<Self, CatalogError> {
        validate(&lines)?;
        let mut lines: Vec<LineDefinition> =
            lines.into_iter().filter(|l| l.tax_year == tax_year).collect();
        if lines.is_empty() {
            return Err(CatalogError::UnsupportedYear(tax_year));
        }
        lines.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));
        let index = lines
            .iter()
            .enumerate()
            .map(|(i, l)| (l.id.clone(), i))
            .collect();
        Ok(Self {
            tax_year,
            lines,
            index,
        })
    }

    pub fn tax_year(&self) -> i32 {
        self.tax_year
    }

    pub fn lines(&self) -> &[LineDefinition] {
        &self.lines
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&LineDefinition> {
        self.index_of(id).map(|i| &self.lines[i])
    }

    pub fn by_kennziffer(&self, kennziffer: &str) -> Option<&LineDefinition> {
        self.lines
            .iter()
            .find(|l| l.kennziffer_key() == Some(kennziffer))
    }

    /// Known and not computed: events may be classified onto it.
    pub fn is_bookable(&self, id: &str) -> bool {
        self.get(id).is_some_and(|l| !l.is_computed())
    }

    pub fn default_line(&self, flow: FlowType) -> Option<&LineDefinition> {
        let kz = match flow {
            FlowType::Income => DEFAULT_INCOME_KENNZIFFER,
            FlowType::Expense => DEFAULT_EXPENSE_KENNZIFFER,
        };
        self.by_kennziffer(kz).filter(|l| l.kind.accepts(flow))
    }
}

/// Load and validate the built-in schedule for `tax_year`.
pub fn load(tax_year: i32) -> Result<Catalog, CatalogError> {
    if !SUPPORTED_YEARS.contains(&tax_year) {
        return Err(CatalogError::UnsupportedYear(tax_year));
    }
    Catalog::from_lines(tax_year, definitions())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn line(id: &str, kind: LineKind, children: &[&str]) -> LineDefinition {
        LineDefinition {
            id: id.to_string(),
            tax_year: 2025,
            kennziffer: None,
            label: id.to_string(),
            kind,
            exportable: true,
            sort_order: 0,
            computed_from_ids: children.iter().map(|c| c.to_string()).collect(),
            source_version: "test".to_string(),
        }
    }

    #[test]
    fn test_builtin_schedules_load() {
        for &year in SUPPORTED_YEARS {
            let catalog = load(year).unwrap();
            assert_eq!(catalog.tax_year(), year);
            assert!(catalog.lines().iter().all(|l| l.tax_year == year));
            assert!(catalog.lines().len() >= 20);
        }
    }

    #[test]
    fn test_builtin_ids_are_globally_unique() {
        validate(&definitions()).unwrap();
        let all = definitions();
        let ids: HashSet<&str> = all.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids.len(), all.len());
    }

    #[test]
    fn test_unknown_year_is_rejected() {
        assert_eq!(load(1999).unwrap_err(), CatalogError::UnsupportedYear(1999));
    }

    #[test]
    fn test_lines_sorted_by_sort_order() {
        let catalog = load(2025).unwrap();
        let orders: Vec<i32> = catalog.lines().iter().map(|l| l.sort_order).collect();
        let mut sorted = orders.clone();
        sorted.sort();
        assert_eq!(orders, sorted);
    }

    #[test]
    fn test_default_lines() {
        let catalog = load(2025).unwrap();
        let income = catalog.default_line(FlowType::Income).unwrap();
        assert_eq!(income.kennziffer.as_deref(), Some("112"));
        let expense = catalog.default_line(FlowType::Expense).unwrap();
        assert_eq!(expense.kind, LineKind::Expense);
        assert_eq!(expense.id, "2025-sonstige");
    }

    #[test]
    fn test_bookable_excludes_computed() {
        let catalog = load(2024).unwrap();
        assert!(catalog.is_bookable("2024-miete"));
        assert!(!catalog.is_bookable("2024-summe-ausgaben"));
        assert!(!catalog.is_bookable("2025-miete"));
    }

    #[test]
    fn test_duplicate_id() {
        let lines = vec![line("a", LineKind::Income, &[]), line("a", LineKind::Expense, &[])];
        assert_eq!(validate(&lines).unwrap_err(), CatalogError::DuplicateId("a".into()));
    }

    #[test]
    fn test_duplicate_kennziffer_within_year() {
        let mut a = line("a", LineKind::Income, &[]);
        let mut b = line("b", LineKind::Income, &[]);
        a.kennziffer = Some("112".into());
        b.kennziffer = Some("112".into());
        assert!(matches!(
            validate(&[a.clone(), b.clone()]),
            Err(CatalogError::DuplicateKennziffer { tax_year: 2025, .. })
        ));

        b.tax_year = 2024;
        validate(&[a, b]).unwrap();
    }

    #[test]
    fn test_empty_kennziffer_is_not_a_duplicate() {
        let mut a = line("a", LineKind::Income, &[]);
        let mut b = line("b", LineKind::Income, &[]);
        a.kennziffer = Some(String::new());
        b.kennziffer = Some("  ".into());
        validate(&[a, b]).unwrap();
    }

    #[test]
    fn test_unknown_child() {
        let lines = vec![line("sum", LineKind::Computed, &["missing"])];
        assert_eq!(
            validate(&lines).unwrap_err(),
            CatalogError::UnknownChild {
                line: "sum".into(),
                child: "missing".into()
            }
        );
    }

    #[test]
    fn test_cross_year_child() {
        let mut old = line("old", LineKind::Expense, &[]);
        old.tax_year = 2024;
        let lines = vec![old, line("sum", LineKind::Computed, &["old"])];
        assert!(matches!(validate(&lines), Err(CatalogError::CrossYearChild { .. })));
    }

    #[test]
    fn test_cycle_names_node_on_cycle() {
        let lines = vec![
            line("a", LineKind::Computed, &["b"]),
            line("b", LineKind::Computed, &["c"]),
            line("c", LineKind::Computed, &["a"]),
        ];
        match validate(&lines).unwrap_err() {
            CatalogError::Cycle(node) => assert!(["a", "b", "c"].contains(&node.as_str())),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let lines = vec![line("a", LineKind::Computed, &["a"])];
        assert_eq!(validate(&lines).unwrap_err(), CatalogError::Cycle("a".into()));
    }

    #[test]
    fn test_shared_children_are_not_a_cycle() {
        let lines = vec![
            line("x", LineKind::Expense, &[]),
            line("y", LineKind::Expense, &[]),
            line("left", LineKind::Computed, &["x", "y"]),
            line("right", LineKind::Computed, &["x", "left"]),
            line("top", LineKind::Computed, &["left", "right"]),
        ];
        validate(&lines).unwrap();
    }

    #[test]
    fn test_children_ignored_on_non_computed_lines() {
        let lines = vec![line("a", LineKind::Expense, &["a"])];
        validate(&lines).unwrap();
    }

    #[test]
    fn test_from_lines_rejects_broken_catalog() {
        let lines = vec![line("a", LineKind::Computed, &["a"])];
        assert!(Catalog::from_lines(2025, lines).is_err());
    }
}
