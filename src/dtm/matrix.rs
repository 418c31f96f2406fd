// Sparse document-term matrix with derived weighting variants.
//
// Rows are surviving documents, columns the trimmed vocabulary. The count
// matrix is the canonical artifact; TF-IDF and proportion weightings are
// produced as separate copies and never mutate the counts.

use serde::{Deserialize, Serialize};

use super::vocab::Vocabulary;

/// Weighting scheme carried by a matrix variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weighting {
    Count,
    TfIdf,
    Proportion,
}

/// Sparse matrix in row-major form; each row holds (column, value) pairs
/// sorted by column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocTermMatrix {
    rows: Vec<Vec<(usize, f64)>>,
    n_cols: usize,
    weighting: Weighting,
}

impl DocTermMatrix {
    /// Build the count matrix from per-document term lists. Terms that were
    /// trimmed from the vocabulary contribute nothing.
    pub fn from_terms(term_lists: &[Vec<String>], vocab: &Vocabulary) -> Self {
        let rows = term_lists
            .iter()
            .map(|terms| {
                let mut counts: std::collections::HashMap<usize, usize> =
                    std::collections::HashMap::new();
                for term in terms {
                    if let Some(col) = vocab.get(term) {
                        *counts.entry(col).or_insert(0) += 1;
                    }
                }
                let mut entries: Vec<(usize, f64)> =
                    counts.into_iter().map(|(c, n)| (c, n as f64)).collect();
                entries.sort_by_key(|&(c, _)| c);
                entries
            })
            .collect();

        Self {
            rows,
            n_cols: vocab.len(),
            weighting: Weighting::Count,
        }
    }

    /// Build a count matrix directly from sparse rows (used by the model
    /// search to assemble training splits).
    pub(crate) fn from_counts(rows: Vec<Vec<(usize, f64)>>, n_cols: usize) -> Self {
        Self {
            rows,
            n_cols,
            weighting: Weighting::Count,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    /// Sparse entries of one row, sorted by column.
    pub fn row(&self, doc: usize) -> &[(usize, f64)] {
        &self.rows[doc]
    }

    pub fn row_sum(&self, doc: usize) -> f64 {
        self.rows[doc].iter().map(|&(_, v)| v).sum()
    }

    /// Number of documents with a nonzero entry in `col`.
    pub fn document_frequency(&self, col: usize) -> usize {
        self.rows
            .iter()
            .filter(|row| row.binary_search_by_key(&col, |&(c, _)| c).is_ok())
            .count()
    }

    /// Derived TF-IDF variant: tf × ln(N / df). The count matrix is left
    /// untouched.
    pub fn tf_idf(&self) -> DocTermMatrix {
        let n_docs = self.rows.len() as f64;
        let mut df = vec![0usize; self.n_cols];
        for row in &self.rows {
            for &(col, _) in row {
                df[col] += 1;
            }
        }
        let idf: Vec<f64> = df
            .iter()
            .map(|&d| if d == 0 { 0.0 } else { (n_docs / d as f64).ln() })
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&(col, tf)| (col, tf * idf[col]))
                    .collect()
            })
            .collect();

        DocTermMatrix {
            rows,
            n_cols: self.n_cols,
            weighting: Weighting::TfIdf,
        }
    }

    /// Derived proportion variant: each row divided by its row sum, giving a
    /// probability-like weighting for lexicon lookups.
    pub fn proportions(&self) -> DocTermMatrix {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let total: f64 = row.iter().map(|&(_, v)| v).sum();
                if total == 0.0 {
                    row.clone()
                } else {
                    row.iter().map(|&(col, v)| (col, v / total)).collect()
                }
            })
            .collect();

        DocTermMatrix {
            rows,
            n_cols: self.n_cols,
            weighting: Weighting::Proportion,
        }
    }

    /// The N terms with the highest aggregate (column-sum) score under this
    /// matrix's weighting. Ties break toward first-encountered vocabulary
    /// order.
    pub fn top_terms(&self, vocab: &Vocabulary, n: usize) -> Vec<(String, f64)> {
        let mut totals = vec![0.0f64; self.n_cols];
        for row in &self.rows {
            for &(col, v) in row {
                totals[col] += v;
            }
        }
        let mut ranked: Vec<(usize, f64)> = totals.into_iter().enumerate().collect();
        // Stable sort keeps vocabulary order within equal scores.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
            .into_iter()
            .take(n)
            .map(|(col, score)| (vocab.term(col).to_string(), score))
            .collect()
    }
}
