//! Keyword-based classifier stub.
//!
//! Matches a small fixed candidate table against lower-cased keyword
//! sets; unmatched descriptions get a random candidate with a low
//! confidence. Chosen codes are upserted into the catalog so reviews
//! can reference them.

use rand::Rng;

use crate::db::{code_repo, Database};

use super::{Alternative, Classification, Classifier, ClassifyError};

/// Catalog defaults seeded for codes the classifier introduces.
const DEFAULT_CATEGORY: &str = "Товары народного потребления";
const DEFAULT_SUBCATEGORY: &str = "Общая группа";

struct Candidate {
    code: &'static str,
    description: &'static str,
}

const CANDIDATES: &[Candidate] = &[
    Candidate {
        code: "8703.10.00",
        description: "Автомобили легковые",
    },
    Candidate {
        code: "6203.42.31",
        description: "Брюки мужские из хлопка",
    },
    Candidate {
        code: "0901.11.00",
        description: "Кофе не обжаренный",
    },
    Candidate {
        code: "8471.30.00",
        description: "Машины вычислительные портативные",
    },
    Candidate {
        code: "6204.62.31",
        description: "Брюки женские из хлопка",
    },
];

const VEHICLE_KEYWORDS: &[&str] = &["автомобиль", "машина", "авто"];
const TROUSER_KEYWORDS: &[&str] = &["брюки", "штаны"];
const COFFEE_KEYWORDS: &[&str] = &["кофе", "coffee"];
const COMPUTER_KEYWORDS: &[&str] = &["компьютер", "ноутбук", "laptop"];

pub struct KeywordClassifier {
    db: Database,
}

impl KeywordClassifier {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Keyword rules in priority order; first match wins.
    fn match_keywords(description: &str) -> Option<(&'static Candidate, f64)> {
        let contains_any =
            |keywords: &[&str]| keywords.iter().any(|kw| description.contains(kw));

        if contains_any(VEHICLE_KEYWORDS) {
            Some((&CANDIDATES[0], 0.85))
        } else if contains_any(TROUSER_KEYWORDS) {
            let candidate = if description.contains("мужск") {
                &CANDIDATES[1]
            } else {
                &CANDIDATES[4]
            };
            Some((candidate, 0.75))
        } else if contains_any(COFFEE_KEYWORDS) {
            Some((&CANDIDATES[2], 0.90))
        } else if contains_any(COMPUTER_KEYWORDS) {
            Some((&CANDIDATES[3], 0.80))
        } else {
            None
        }
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, description: &str) -> Result<Classification, ClassifyError> {
        let mut rng = rand::rng();

        let lowered = description.to_lowercase();
        let (candidate, confidence) = match Self::match_keywords(&lowered) {
            Some(matched) => matched,
            None => {
                let candidate = &CANDIDATES[rng.random_range(0..CANDIDATES.len())];
                (candidate, rng.random_range(0.3..0.7))
            }
        };

        code_repo::get_or_create(
            &self.db,
            candidate.code,
            candidate.description,
            DEFAULT_CATEGORY,
            Some(DEFAULT_SUBCATEGORY),
        )?;

        // Two distinct candidates; the chosen code is not excluded.
        let alternatives = rand::seq::index::sample(&mut rng, CANDIDATES.len(), 2)
            .iter()
            .map(|i| Alternative {
                code: CANDIDATES[i].code.to_string(),
                confidence: rng.random_range(0.2..0.6),
            })
            .collect();

        let preview: String = description.chars().take(50).collect();
        Ok(Classification {
            code: candidate.code.to_string(),
            confidence,
            rationale: format!(
                "Классификация на основе ключевых слов в описании: \"{}...\"",
                preview
            ),
            alternatives,
        })
    }
}
