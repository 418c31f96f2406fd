// Model-selection search over candidate topic counts.
//
// For every candidate K a model is fitted on a training split (a seeded
// held-out word subset is masked per document) and four diagnostics are
// reported. The choice of K is the analyst's: nothing here picks a winner.

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::corpus::document::Document;
use crate::dtm::DocTermMatrix;
use crate::error::Result;
use crate::topics::model::{self, FitOptions, TopicModel};

/// Diagnostics for one candidate topic count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KDiagnostics {
    pub k: usize,
    /// Mean log-likelihood of the masked held-out tokens under the fitted
    /// model. Peaks near a good K.
    pub heldout_log_likelihood: f64,
    /// Mean UMass coherence of each topic's top terms. Declines as topics
    /// fragment.
    pub semantic_coherence: f64,
    /// Mean per-token training log-likelihood (the bound the sampler
    /// improves). Flattening gains signal diminishing returns.
    pub lower_bound: f64,
    /// Multinomial Pearson dispersion of observed vs expected counts.
    pub residual_dispersion: f64,
}

/// Token instances split into a training matrix and held-out word lists.
struct HoldoutSplit {
    train: DocTermMatrix,
    /// Held-out word ids per document, aligned with the matrix rows.
    held: Vec<Vec<usize>>,
}

/// Mask a seeded fraction of each document's token instances. Documents keep
/// at least one training token, so no row goes empty that wasn't already.
fn split_holdout(dtm: &DocTermMatrix, fraction: f64, seed: u64) -> HoldoutSplit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_rows = Vec::with_capacity(dtm.n_rows());
    let mut held = Vec::with_capacity(dtm.n_rows());

    for mut instances in model::expand_tokens(dtm) {
        let n = instances.len();
        let n_hold = ((n as f64 * fraction).floor() as usize).min(n.saturating_sub(1));

        // Partial Fisher-Yates: the last n_hold positions become the mask.
        for i in 0..n_hold {
            let j = rng.random_range(0..n - i);
            instances.swap(j, n - 1 - i);
        }
        let held_words = instances.split_off(n - n_hold);

        let mut counts: std::collections::HashMap<usize, usize> = std::collections::HashMap::new();
        for w in &instances {
            *counts.entry(*w).or_insert(0) += 1;
        }
        let mut row: Vec<(usize, f64)> = counts.into_iter().map(|(c, n)| (c, n as f64)).collect();
        row.sort_by_key(|&(c, _)| c);

        train_rows.push(row);
        held.push(held_words);
    }

    HoldoutSplit {
        train: DocTermMatrix::from_counts(train_rows, dtm.n_cols()),
        held,
    }
}

/// Mean log p of held-out words under the fitted distributions
/// (document-completion held-out likelihood).
fn heldout_log_likelihood(model: &TopicModel, held: &[Vec<usize>]) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for (d, words) in held.iter().enumerate() {
        for &w in words {
            let p: f64 = model.doc_topic[d]
                .iter()
                .zip(model.topic_term.iter().map(|row| row[w]))
                .map(|(&t, pw)| t * pw)
                .sum();
            total += p.max(1e-300).ln();
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Mean UMass coherence over topics: sum over ranked top-term pairs of
/// ln((D(wi, wj) + 1) / D(wj)), with document frequencies from the full
/// count matrix.
fn semantic_coherence(model: &TopicModel, dtm: &DocTermMatrix, top_n: usize) -> f64 {
    let mut per_topic = Vec::with_capacity(model.k);

    for row in &model.topic_term {
        let mut ranked: Vec<(usize, f64)> = row.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let top: Vec<usize> = ranked.into_iter().take(top_n).map(|(w, _)| w).collect();

        // Document sets for just these terms.
        let doc_sets: Vec<std::collections::HashSet<usize>> = top
            .iter()
            .map(|&w| {
                (0..dtm.n_rows())
                    .filter(|&d| {
                        dtm.row(d)
                            .binary_search_by_key(&w, |&(c, _)| c)
                            .is_ok()
                    })
                    .collect()
            })
            .collect();

        let mut score = 0.0;
        for i in 1..top.len() {
            for j in 0..i {
                let co = doc_sets[i].intersection(&doc_sets[j]).count() as f64;
                let dj = doc_sets[j].len() as f64;
                if dj > 0.0 {
                    score += ((co + 1.0) / dj).ln();
                }
            }
        }
        per_topic.push(score);
    }

    per_topic.iter().sum::<f64>() / per_topic.len().max(1) as f64
}

/// Multinomial Pearson dispersion of observed counts against model
/// expectations. Zero cells are handled through the identity
/// sum_w (x-e)^2/e = sum_{x>0}[(x-e)^2/e - e] + N_d, so the sparse rows are
/// never densified.
fn residual_dispersion(model: &TopicModel, dtm: &DocTermMatrix) -> f64 {
    let v = dtm.n_cols();
    let mut total = 0.0;
    let mut df = 0.0;

    for d in 0..dtm.n_rows() {
        let n_d = dtm.row_sum(d);
        if n_d == 0.0 {
            continue;
        }
        let mut row_stat = n_d;
        for &(w, x) in dtm.row(d) {
            let p: f64 = model.doc_topic[d]
                .iter()
                .zip(model.topic_term.iter().map(|row| row[w]))
                .map(|(&t, pw)| t * pw)
                .sum();
            let e = (n_d * p).max(1e-300);
            let r = x - e;
            row_stat += r * r / e - e;
        }
        total += row_stat;
        df += (v - 1) as f64;
    }

    if df == 0.0 {
        0.0
    } else {
        total / df
    }
}

/// Fit a model per candidate K (in the supplied order) and report the four
/// diagnostics for each. Candidates that fail (for example K larger than the
/// usable document count) propagate their error.
pub fn search_k(
    dtm: &DocTermMatrix,
    documents: &[Document],
    config: &Config,
) -> Result<Vec<KDiagnostics>> {
    let split = split_holdout(dtm, config.holdout_fraction, config.seed);

    let bar = ProgressBar::new(config.candidate_k.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] K search {pos}/{len}")
            .expect("static template")
            .progress_chars("#>-"),
    );

    let mut results = Vec::with_capacity(config.candidate_k.len());
    for &k in &config.candidate_k {
        let options = FitOptions::from_config(config, k);
        let model = TopicModel::fit(&split.train, documents, Some(&config.prevalence), &options)?;

        let diagnostics = KDiagnostics {
            k,
            heldout_log_likelihood: heldout_log_likelihood(&model, &split.held),
            semantic_coherence: semantic_coherence(&model, dtm, 10),
            lower_bound: model.mean_token_log_likelihood,
            residual_dispersion: residual_dispersion(&model, dtm),
        };
        info!(
            k,
            heldout = diagnostics.heldout_log_likelihood,
            coherence = diagnostics.semantic_coherence,
            bound = diagnostics.lower_bound,
            dispersion = diagnostics.residual_dispersion,
            "Candidate fitted"
        );
        results.push(diagnostics);
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtm::Vocabulary;
    use chrono::NaiveDate;

    fn corpus() -> (Vec<Vec<String>>, Vec<Document>) {
        let themes: [&[&str]; 2] = [
            &["asylum", "refugee", "border", "visa", "court"],
            &["flood", "relief", "shelter", "water", "camp"],
        ];
        let mut term_lists = Vec::new();
        let mut documents = Vec::new();
        for i in 0..16 {
            let theme = themes[i % 2];
            let terms: Vec<String> = (0..8).map(|j| theme[(i + j) % theme.len()].to_string()).collect();
            term_lists.push(terms);
            documents.push(Document {
                id: i,
                organisation: if i < 8 { "A" } else { "B" }.to_string(),
                title: String::new(),
                date: NaiveDate::from_yo_opt(2019, (i as u32) * 20 + 1).unwrap(),
                day_of_year: (i as u16) * 20 + 1,
                text: String::new(),
            });
        }
        (term_lists, documents)
    }

    fn search_config(candidates: Vec<usize>) -> Config {
        Config {
            candidate_k: candidates,
            gibbs_sweeps: 30,
            burn_in: 10,
            prior_update_interval: 10,
            holdout_fraction: 0.2,
            min_doc_frequency: 1,
            ..Config::default()
        }
    }

    #[test]
    fn holdout_split_preserves_token_totals() {
        let (term_lists, _) = corpus();
        let vocab = Vocabulary::build(&term_lists, 1);
        let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);
        let split = split_holdout(&dtm, 0.2, 11);
        for d in 0..dtm.n_rows() {
            let total = split.train.row_sum(d) + split.held[d].len() as f64;
            assert_eq!(total, dtm.row_sum(d));
            assert!(split.train.row_sum(d) >= 1.0);
        }
    }

    #[test]
    fn holdout_split_is_seed_deterministic() {
        let (term_lists, _) = corpus();
        let vocab = Vocabulary::build(&term_lists, 1);
        let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);
        let a = split_holdout(&dtm, 0.2, 11);
        let b = split_holdout(&dtm, 0.2, 11);
        assert_eq!(a.held, b.held);
    }

    #[test]
    fn reports_one_diagnostic_per_candidate_in_order() {
        let (term_lists, documents) = corpus();
        let vocab = Vocabulary::build(&term_lists, 1);
        let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);
        let config = search_config(vec![2, 3]);
        let diagnostics = search_k(&dtm, &documents, &config).unwrap();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].k, 2);
        assert_eq!(diagnostics[1].k, 3);
        for d in &diagnostics {
            assert!(d.heldout_log_likelihood < 0.0);
            assert!(d.lower_bound < 0.0);
            assert!(d.semantic_coherence.is_finite());
            assert!(d.residual_dispersion.is_finite());
        }
    }

    #[test]
    fn oversized_candidate_propagates_insufficient_data() {
        let (term_lists, documents) = corpus();
        let vocab = Vocabulary::build(&term_lists, 1);
        let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);
        let config = search_config(vec![64]);
        assert!(search_k(&dtm, &documents, &config).is_err());
    }
}
