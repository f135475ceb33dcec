//! Multinomial naive Bayes over counterparty and purpose text.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use super::LabeledExample;

/// Below this many labeled examples no model is trained.
pub const MIN_TRAINING_EXAMPLES: usize = 20;

/// Predictions with a lower confidence are dropped.
pub const CONFIDENCE_THRESHOLD: f64 = 0.6;

fn disallowed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9äöüß\s]").expect("token filter regex"))
}

/// Lower-case, drop everything but letters, digits and whitespace, split,
/// and discard single-character tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    disallowed_re()
        .replace_all(&lower, "")
        .split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default, Clone)]
struct ClassStats {
    documents: usize,
    words: HashMap<String, usize>,
    total_words: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub line_id: String,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct NaiveBayes {
    classes: BTreeMap<String, ClassStats>,
    vocabulary_size: usize,
    total_documents: usize,
}

impl NaiveBayes {
    /// `None` when there are fewer than [`MIN_TRAINING_EXAMPLES`] examples.
    pub fn train(examples: &[LabeledExample]) -> Option<Self> {
        if examples.len() < MIN_TRAINING_EXAMPLES {
            return None;
        }
        let mut classes: BTreeMap<String, ClassStats> = BTreeMap::new();
        let mut vocabulary: HashSet<String> = HashSet::new();

        for example in examples {
            let stats = classes.entry(example.eur_line_id.clone()).or_default();
            stats.documents += 1;
            for token in tokenize(&example.text()) {
                stats.total_words += 1;
                *stats.words.entry(token.clone()).or_insert(0) += 1;
                vocabulary.insert(token);
            }
        }

        Some(Self {
            classes,
            vocabulary_size: vocabulary.len(),
            total_documents: examples.len(),
        })
    }

    #[cfg(test)]
    fn class_count(&self) -> usize {
        self.classes.len()
    }

    fn log_probability(&self, stats: &ClassStats, tokens: &[String]) -> f64 {
        let prior = (stats.documents as f64 / self.total_documents as f64).ln();
        let denominator = (stats.total_words + self.vocabulary_size) as f64;
        tokens.iter().fold(prior, |acc, token| {
            let count = stats.words.get(token).copied().unwrap_or(0);
            acc + ((count + 1) as f64 / denominator).ln()
        })
    }

    /// Best class with a logistic confidence over the gap to the runner-up.
    pub fn predict(&self, text: &str) -> Option<Prediction> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return None;
        }

        let mut best: Option<(&str, f64)> = None;
        let mut second: Option<f64> = None;
        for (line_id, stats) in &self.classes {
            let score = self.log_probability(stats, &tokens);
            match best {
                Some((_, top)) if score <= top => {
                    if second.map_or(true, |s| score > s) {
                        second = Some(score);
                    }
                }
                _ => {
                    second = best.map(|(_, top)| top);
                    best = Some((line_id.as_str(), score));
                }
            }
        }

        let (line_id, top) = best?;
        let confidence = match second {
            Some(runner_up) => 1.0 / (1.0 + (-(top - runner_up)).exp()),
            None => 1.0,
        };
        if confidence < CONFIDENCE_THRESHOLD {
            return None;
        }
        Some(Prediction {
            line_id: line_id.to_string(),
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggest::tests::example;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Telekom-Rechnung 04/2025, Büro Straße x"),
            vec!["telekomrechnung", "042025", "büro", "straße"]
        );
        assert!(tokenize("a - ! ?").is_empty());
    }

    #[test]
    fn test_no_model_below_threshold() {
        let examples: Vec<_> = (0..MIN_TRAINING_EXAMPLES - 1)
            .map(|i| example(&format!("Vendor {i}"), "Rechnung", "2025-edv"))
            .collect();
        assert!(NaiveBayes::train(&examples).is_none());
    }

    #[test]
    fn test_model_at_threshold() {
        let examples: Vec<_> = (0..MIN_TRAINING_EXAMPLES)
            .map(|i| example(&format!("Vendor {i}"), "Rechnung", "2025-edv"))
            .collect();
        let model = NaiveBayes::train(&examples).unwrap();
        assert_eq!(model.class_count(), 1);
    }

    #[test]
    fn test_single_class_has_full_confidence() {
        let examples: Vec<_> = (0..20)
            .map(|_| example("Hetzner Online", "Server", "2025-edv"))
            .collect();
        let model = NaiveBayes::train(&examples).unwrap();
        let p = model.predict("hetzner server").unwrap();
        assert_eq!(p.line_id, "2025-edv");
        assert_eq!(p.confidence, 1.0);
    }

    #[test]
    fn test_identical_balanced_classes_give_no_prediction() {
        let mut examples = Vec::new();
        for _ in 0..10 {
            examples.push(example("Muster GmbH", "Leistung Mai", "2025-edv"));
            examples.push(example("Muster GmbH", "Leistung Mai", "2025-werbung"));
        }
        let model = NaiveBayes::train(&examples).unwrap();
        assert!(model.predict("Muster GmbH Leistung Mai").is_none());
    }

    #[test]
    fn test_distinct_classes_predict_confidently() {
        let mut examples = Vec::new();
        for _ in 0..10 {
            examples.push(example("Hetzner Online", "Server Miete Cloud", "2025-edv"));
            examples.push(example("Google Ireland", "Ads Kampagne Werbung", "2025-werbung"));
        }
        let model = NaiveBayes::train(&examples).unwrap();
        let p = model.predict("Kampagne Werbung Juni").unwrap();
        assert_eq!(p.line_id, "2025-werbung");
        assert!(p.confidence >= CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn test_confidence_follows_logistic_gap() {
        let mut examples = Vec::new();
        for _ in 0..15 {
            examples.push(example("Alpha", "eins", "a"));
        }
        for _ in 0..5 {
            examples.push(example("Beta", "zwei", "b"));
        }
        let model = NaiveBayes::train(&examples).unwrap();
        let tokens = tokenize("alpha");
        let a = model.log_probability(&model.classes["a"], &tokens);
        let b = model.log_probability(&model.classes["b"], &tokens);
        let expected = 1.0 / (1.0 + (-(a - b)).exp());
        let p = model.predict("alpha").unwrap();
        assert_eq!(p.line_id, "a");
        assert!((p.confidence - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_tokens_never_predict() {
        let examples: Vec<_> = (0..20).map(|_| example("Hetzner", "Server", "2025-edv")).collect();
        let model = NaiveBayes::train(&examples).unwrap();
        assert!(model.predict("- / x").is_none());
    }
}
