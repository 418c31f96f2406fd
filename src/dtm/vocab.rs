// Vocabulary — ordered term-to-index mapping with document-frequency
// trimming.
//
// Terms keep first-encountered order (document order, then within-document
// order), which makes vocabulary construction bit-identical across runs on
// the same input and gives top-terms queries a stable tie-break.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Ordered mapping from term to dense column index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    terms: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build the vocabulary from per-document term lists, keeping only terms
    /// that appear in at least `min_doc_frequency` documents. Below-threshold
    /// terms are excluded entirely.
    pub fn build(term_lists: &[Vec<String>], min_doc_frequency: usize) -> Self {
        // Document frequency per term, in first-encountered order.
        let mut order: Vec<String> = Vec::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for terms in term_lists {
            let mut seen_in_doc: HashMap<&str, ()> = HashMap::new();
            for term in terms {
                if seen_in_doc.insert(term, ()).is_none() {
                    let count = doc_freq.entry(term.clone()).or_insert(0);
                    if *count == 0 {
                        order.push(term.clone());
                    }
                    *count += 1;
                }
            }
        }

        let total = order.len();
        let terms: Vec<String> = order
            .into_iter()
            .filter(|t| doc_freq[t] >= min_doc_frequency)
            .collect();

        info!(
            kept = terms.len(),
            seen = total,
            min_doc_frequency,
            "Built vocabulary"
        );

        Self::from_terms(terms)
    }

    /// Rebuild the index map from an ordered term list (used after
    /// deserialization, where the map is skipped).
    pub fn from_terms(terms: Vec<String>) -> Self {
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self { terms, index }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Column index of a term, if it survived trimming.
    pub fn get(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    /// Term at a column index.
    pub fn term(&self, index: usize) -> &str {
        &self.terms[index]
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}
