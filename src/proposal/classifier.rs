//! Axiom classification.
//!
//! The governor only depends on the [`Classifier`] contract. The bundled
//! [`KeywordClassifier`] is a lexicon lookup that can be swapped for a
//! better model without touching the voting pipeline.

use crate::core::Axiom;
use crate::proposal::operation::words;
use std::collections::BTreeSet;

/// Maps free text to the policy concerns it touches.
pub trait Classifier: Send + Sync {
    /// Classify `text` into a set of axioms.
    fn classify(&self, text: &str) -> BTreeSet<Axiom>;
}

/// Words shorter than this only match exactly.
const MIN_STEM_LEN: usize = 5;

/// Lexicon-based classifier.
///
/// A keyword matches a word exactly, or as a prefix when the keyword is at
/// least five characters long ("archive" matches "archived").
#[derive(Clone, Debug, Default)]
pub struct KeywordClassifier {
    lexicon: Vec<(Axiom, Vec<String>)>,
}

impl KeywordClassifier {
    /// Create an empty classifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with the default lexicon.
    pub fn with_defaults() -> Self {
        Self::new()
            .with_keywords(
                Axiom::Preservation,
                &[
                    "delete", "erase", "purge", "wipe", "destroy", "remove", "removing", "clear",
                    "reset", "drop", "dropping", "truncate", "archive", "backup", "preserve",
                    "history", "retain", "keep", "snapshot",
                ],
            )
            .with_keywords(
                Axiom::Efficiency,
                &[
                    "speed", "fast", "faster", "optimize", "optimise", "performance", "efficient",
                    "efficiency", "compress", "reclaim", "space", "cache", "latency",
                    "throughput", "cleanup",
                ],
            )
            .with_keywords(
                Axiom::Transparency,
                &[
                    "log", "logs", "logging", "logged", "audit", "report", "status", "explain",
                    "record", "trace", "monitor", "disclose",
                ],
            )
            .with_keywords(
                Axiom::Safety,
                &[
                    "shutdown", "disable", "production", "security", "critical", "emergency",
                    "risk", "rollback", "irreversible",
                ],
            )
            .with_keywords(
                Axiom::Autonomy,
                &[
                    "force", "forced", "override", "bypass", "consent", "opt", "user", "users",
                    "mandatory", "coerce",
                ],
            )
    }

    /// Add keywords for an axiom.
    pub fn with_keywords(mut self, axiom: Axiom, keywords: &[&str]) -> Self {
        let keywords = keywords.iter().map(|k| k.to_ascii_lowercase());
        match self.lexicon.iter_mut().find(|(a, _)| *a == axiom) {
            Some((_, existing)) => existing.extend(keywords),
            None => self.lexicon.push((axiom, keywords.collect())),
        }
        self
    }

    fn matches(keyword: &str, word: &str) -> bool {
        word == keyword || (keyword.len() >= MIN_STEM_LEN && word.starts_with(keyword))
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> BTreeSet<Axiom> {
        let words: Vec<String> = words(text).map(|(_, w)| w.to_ascii_lowercase()).collect();

        self.lexicon
            .iter()
            .filter(|(_, keywords)| {
                keywords
                    .iter()
                    .any(|k| words.iter().any(|w| Self::matches(k, w)))
            })
            .map(|(axiom, _)| axiom.clone())
            .collect()
    }
}
