// Sentiment scoring — the lexicon path and the embedding path.
//
// Both paths produce per-document ScoreRecords and share one normalization
// discipline: polarity scores (positive/negative) sum to 1 and emotion
// scores (8 categories) sum to 1, independently, never mixed. A group with
// zero total mass gets NaN for its members; aggregates exclude NaN rather
// than zero-filling them. The two paths stay distinguishable in outputs —
// callers label which scorer produced a table.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::dtm::{DocTermMatrix, Vocabulary};
use crate::embed::docvec::DocEmbedding;
use crate::embed::{cosine, word2vec::WordEmbeddings};
use crate::sentiment::lexicon::{Category, Lexicon};

/// Normalized category scores for one document or aggregation bucket.
///
/// NaN marks a group that had zero mass for this record.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRecord {
    scores: BTreeMap<Category, f64>,
}

impl ScoreRecord {
    fn from_raw(mut raw: BTreeMap<Category, f64>) -> Self {
        normalize_group(&mut raw, &Category::SENTIMENTS);
        normalize_group(&mut raw, &Category::EMOTIONS);
        Self { scores: raw }
    }

    /// Build a record from already-normalized values (used by aggregation).
    pub(crate) fn from_normalized(scores: BTreeMap<Category, f64>) -> Self {
        Self { scores }
    }

    pub fn get(&self, category: Category) -> f64 {
        self.scores.get(&category).copied().unwrap_or(f64::NAN)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        self.scores.iter().map(|(&c, &v)| (c, v))
    }
}

/// Normalize one category group in place. Zero total mass turns every
/// member into NaN — the defined "undefined" marker, excluded downstream.
fn normalize_group(raw: &mut BTreeMap<Category, f64>, group: &[Category]) {
    let total: f64 = group
        .iter()
        .map(|c| raw.get(c).copied().unwrap_or(0.0))
        .sum();
    for c in group {
        let entry = raw.entry(*c).or_insert(0.0);
        if total > 0.0 {
            *entry /= total;
        } else {
            *entry = f64::NAN;
        }
    }
}

/// Lexicon path: sum each document's proportional term weights into the
/// categories the terms belong to, then normalize the two groups.
///
/// Expects the proportion variant of the matrix so scores are comparable
/// across documents of different lengths.
pub fn score_lexicon(
    proportions: &DocTermMatrix,
    vocab: &Vocabulary,
    lexicon: &Lexicon,
) -> Vec<ScoreRecord> {
    // Category memberships per column, resolved once.
    let column_categories: Vec<Vec<Category>> = (0..vocab.len())
        .map(|col| lexicon.categories_of(vocab.term(col)))
        .collect();

    (0..proportions.n_rows())
        .map(|doc| {
            let mut raw: BTreeMap<Category, f64> = BTreeMap::new();
            for &(col, weight) in proportions.row(doc) {
                for &category in &column_categories[col] {
                    *raw.entry(category).or_insert(0.0) += weight;
                }
            }
            ScoreRecord::from_raw(raw)
        })
        .collect()
}

/// Embedding path: cosine similarity between each document embedding and
/// every category vector, negatives clamped to zero, then the same group
/// normalization. A zero category vector scores exactly 0, never NaN.
pub fn score_embedding(
    doc_embeddings: &[DocEmbedding],
    lexicon: &Lexicon,
    embeddings: &WordEmbeddings,
) -> Vec<ScoreRecord> {
    let category_vectors: Vec<(Category, Vec<f64>)> = Category::ALL
        .into_iter()
        .map(|c| (c, lexicon.category_vector(c, embeddings)))
        .collect();

    doc_embeddings
        .iter()
        .map(|doc| {
            let raw: BTreeMap<Category, f64> = category_vectors
                .iter()
                .map(|(category, vector)| {
                    (*category, cosine(&doc.vector, vector).max(0.0))
                })
                .collect();
            ScoreRecord::from_raw(raw)
        })
        .collect()
}
