use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{normalize, LabeledExample};

#[derive(Debug, Clone)]
struct Entry {
    line_id: String,
    updated_at: DateTime<Utc>,
}

/// Latest confirmed line per normalized counterparty name.
#[derive(Debug, Clone, Default)]
pub struct CounterpartyMemory {
    entries: HashMap<String, Entry>,
}

impl CounterpartyMemory {
    /// Later examples win ties on `updated_at`.
    pub fn build(examples: &[LabeledExample]) -> Self {
        let mut entries: HashMap<String, Entry> = HashMap::new();
        for example in examples {
            let name = normalize(&example.counterparty);
            if name.is_empty() {
                continue;
            }
            let newer = entries
                .get(&name)
                .map_or(true, |e| example.updated_at >= e.updated_at);
            if newer {
                entries.insert(
                    name,
                    Entry {
                        line_id: example.eur_line_id.clone(),
                        updated_at: example.updated_at,
                    },
                );
            }
        }
        Self { entries }
    }

    pub fn lookup(&self, counterparty: &str) -> Option<&str> {
        self.entries
            .get(&normalize(counterparty))
            .map(|e| e.line_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
