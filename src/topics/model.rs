// Topic model fit — collapsed Gibbs sampling with document-specific priors
// tied to the prevalence regression.
//
// Token instances are expanded from the sparse count matrix and each gets a
// topic assignment. Standard collapsed Gibbs updates run over all positions;
// after burn-in the current document-topic proportions are regressed on the
// prevalence design every `prior_update_interval` sweeps and the fitted
// means are folded back into each document's Dirichlet prior. That is how
// date and organisation condition the inferred topics.
//
// All randomness comes from one StdRng seeded explicitly, so a fixed seed
// and initialization mode reproduce the fit bit for bit.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, PrevalenceSpec};
use crate::corpus::document::Document;
use crate::dtm::{DocTermMatrix, Vocabulary};
use crate::error::{PipelineError, Result};
use crate::topics::prevalence::{Covariate, EffectCurve, PrevalenceDesign, PrevalenceFit};

/// How topic assignments are initialized before sweeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Initialization {
    /// Random assignments drawn from the seeded generator.
    Seeded,
    /// Greedy cosine assignment of TF-IDF document rows to K centroids
    /// seeded from the first K non-trivial documents. Fully determined by
    /// document order.
    Deterministic,
}

/// Fit parameters, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub k: usize,
    pub sweeps: usize,
    pub burn_in: usize,
    pub prior_update_interval: usize,
    /// Base symmetric document-topic prior.
    pub alpha: f64,
    /// Symmetric topic-term prior.
    pub beta: f64,
    pub init: Initialization,
    pub seed: u64,
}

impl FitOptions {
    pub fn from_config(config: &Config, k: usize) -> Self {
        Self {
            k,
            sweeps: config.gibbs_sweeps,
            burn_in: config.burn_in,
            prior_update_interval: config.prior_update_interval.max(1),
            alpha: 50.0 / k as f64,
            beta: 0.01,
            init: Initialization::Seeded,
            seed: config.seed,
        }
    }
}

/// A fitted topic model.
#[derive(Debug, Clone)]
pub struct TopicModel {
    pub k: usize,
    /// Row-stochastic documents × K.
    pub doc_topic: Vec<Vec<f64>>,
    /// Row-stochastic K × vocabulary.
    pub topic_term: Vec<Vec<f64>>,
    /// Fitted prevalence regression, when covariates were supplied.
    pub prevalence: Option<PrevalenceFit>,
    /// Mean per-token log-likelihood over the training tokens.
    pub mean_token_log_likelihood: f64,
}

struct GibbsState {
    k: usize,
    beta: f64,
    /// Word id per token instance, per document.
    tokens: Vec<Vec<usize>>,
    /// Topic assignment per token instance.
    z: Vec<Vec<usize>>,
    /// Document × topic counts.
    ndk: Vec<Vec<usize>>,
    /// Topic × word counts.
    nkw: Vec<Vec<usize>>,
    /// Tokens per topic.
    nk: Vec<usize>,
    /// Per-document Dirichlet prior, refreshed from the prevalence fit.
    alpha: Vec<Vec<f64>>,
}

impl GibbsState {
    fn assign(&mut self, doc: usize, pos: usize, topic: usize) {
        let word = self.tokens[doc][pos];
        self.z[doc][pos] = topic;
        self.ndk[doc][topic] += 1;
        self.nkw[topic][word] += 1;
        self.nk[topic] += 1;
    }

    fn unassign(&mut self, doc: usize, pos: usize) {
        let word = self.tokens[doc][pos];
        let topic = self.z[doc][pos];
        self.ndk[doc][topic] -= 1;
        self.nkw[topic][word] -= 1;
        self.nk[topic] -= 1;
    }

    /// One full collapsed Gibbs sweep.
    fn sweep(&mut self, rng: &mut StdRng, vocab_size: usize) {
        let vb = vocab_size as f64 * self.beta;
        let mut weights = vec![0.0f64; self.k];

        for doc in 0..self.tokens.len() {
            for pos in 0..self.tokens[doc].len() {
                self.unassign(doc, pos);
                let word = self.tokens[doc][pos];

                let mut total = 0.0;
                for t in 0..self.k {
                    let left = self.ndk[doc][t] as f64 + self.alpha[doc][t];
                    let right =
                        (self.nkw[t][word] as f64 + self.beta) / (self.nk[t] as f64 + vb);
                    weights[t] = left * right;
                    total += weights[t];
                }

                let topic = if total <= f64::EPSILON {
                    rng.random_range(0..self.k)
                } else {
                    let mut u = rng.random::<f64>() * total;
                    let mut chosen = self.k - 1;
                    for (t, &w) in weights.iter().enumerate() {
                        if u < w {
                            chosen = t;
                            break;
                        }
                        u -= w;
                    }
                    chosen
                };

                self.assign(doc, pos, topic);
            }
        }
    }

    /// Current document-topic proportions from counts and priors.
    fn theta(&self) -> Vec<Vec<f64>> {
        self.ndk
            .iter()
            .zip(&self.alpha)
            .map(|(counts, alpha)| {
                let denom =
                    counts.iter().sum::<usize>() as f64 + alpha.iter().sum::<f64>();
                counts
                    .iter()
                    .zip(alpha)
                    .map(|(&n, &a)| (n as f64 + a) / denom)
                    .collect()
            })
            .collect()
    }

    /// Current topic-term distributions from counts and the symmetric prior.
    fn phi(&self, vocab_size: usize) -> Vec<Vec<f64>> {
        let vb = vocab_size as f64 * self.beta;
        self.nkw
            .iter()
            .zip(&self.nk)
            .map(|(counts, &total)| {
                let denom = total as f64 + vb;
                counts
                    .iter()
                    .map(|&n| (n as f64 + self.beta) / denom)
                    .collect()
            })
            .collect()
    }
}

impl TopicModel {
    /// Fit a K-topic model on the count matrix.
    ///
    /// `documents` must be index-aligned with the matrix rows (the surviving
    /// corpus). Covariates are optional; without them the prior stays
    /// symmetric. Fails with `InsufficientData` when fewer than K documents
    /// have any retained tokens.
    pub fn fit(
        dtm: &DocTermMatrix,
        documents: &[Document],
        covariates: Option<&PrevalenceSpec>,
        options: &FitOptions,
    ) -> Result<TopicModel> {
        let vocab_size = dtm.n_cols();
        let tokens = expand_tokens(dtm);

        let non_trivial = tokens.iter().filter(|t| !t.is_empty()).count();
        if non_trivial < options.k {
            return Err(PipelineError::InsufficientData {
                required: options.k,
                available: non_trivial,
            });
        }

        let mut rng = StdRng::seed_from_u64(options.seed);
        let n_docs = tokens.len();
        let k = options.k;

        let mut state = GibbsState {
            k,
            beta: options.beta,
            z: tokens.iter().map(|t| vec![0; t.len()]).collect(),
            ndk: vec![vec![0; k]; n_docs],
            nkw: vec![vec![0; vocab_size]; k],
            nk: vec![0; k],
            alpha: vec![vec![options.alpha; k]; n_docs],
            tokens,
        };

        // Initial assignments.
        match options.init {
            Initialization::Seeded => {
                for doc in 0..n_docs {
                    for pos in 0..state.tokens[doc].len() {
                        let topic = rng.random_range(0..k);
                        state.assign(doc, pos, topic);
                    }
                }
            }
            Initialization::Deterministic => {
                let clusters = greedy_clusters(dtm, k);
                for doc in 0..n_docs {
                    for pos in 0..state.tokens[doc].len() {
                        state.assign(doc, pos, clusters[doc]);
                    }
                }
            }
        }

        let design = covariates.map(|spec| {
            (
                PrevalenceDesign::build(documents, spec),
                spec.ridge,
            )
        });

        let total_sweeps = options.burn_in + options.sweeps;
        let alpha_total = options.alpha * k as f64;

        for sweep in 0..total_sweeps {
            state.sweep(&mut rng, vocab_size);

            let past_burn_in = sweep >= options.burn_in;
            if past_burn_in && (sweep - options.burn_in) % options.prior_update_interval == 0 {
                if let Some((design, ridge)) = &design {
                    let theta = state.theta();
                    let fit = PrevalenceFit::fit(design.clone(), &theta, *ridge)?;
                    for doc in 0..n_docs {
                        let mu = fit.predicted_proportions(design.row(doc));
                        for t in 0..k {
                            state.alpha[doc][t] = mu[t] * alpha_total;
                        }
                    }
                }
            }

            if (sweep + 1) % 50 == 0 {
                debug!(sweep = sweep + 1, total = total_sweeps, "Gibbs sweep");
            }
        }

        let doc_topic = state.theta();
        let topic_term = state.phi(vocab_size);

        let prevalence = match &design {
            Some((design, ridge)) => {
                Some(PrevalenceFit::fit(design.clone(), &doc_topic, *ridge)?)
            }
            None => None,
        };

        let mean_token_log_likelihood =
            mean_token_log_likelihood(&state.tokens, &doc_topic, &topic_term);

        Ok(TopicModel {
            k,
            doc_topic,
            topic_term,
            prevalence,
            mean_token_log_likelihood,
        })
    }

    /// Top-N documents by this topic's probability mass, ties broken by
    /// document order.
    pub fn thoughts(&self, topic: usize, n: usize) -> Result<Vec<(usize, f64)>> {
        if topic >= self.k {
            return Err(PipelineError::IndexOutOfRange {
                index: topic,
                len: self.k,
            });
        }
        let mut ranked: Vec<(usize, f64)> = self
            .doc_topic
            .iter()
            .enumerate()
            .map(|(d, row)| (d, row[topic]))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        Ok(ranked)
    }

    /// Top-N terms per topic, ties broken by vocabulary order.
    pub fn top_terms(&self, vocab: &Vocabulary, n: usize) -> Vec<Vec<(String, f64)>> {
        self.topic_term
            .iter()
            .map(|row| {
                let mut ranked: Vec<(usize, f64)> =
                    row.iter().copied().enumerate().collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
                ranked
                    .into_iter()
                    .take(n)
                    .map(|(w, p)| (vocab.term(w).to_string(), p))
                    .collect()
            })
            .collect()
    }

    /// Prevalence effect for one topic and covariate. Requires the model to
    /// have been fitted with covariates.
    pub fn effect(&self, topic: usize, covariate: Covariate) -> Result<EffectCurve> {
        let fit = self.prevalence.as_ref().ok_or_else(|| {
            PipelineError::InvalidConfig("model was fitted without covariates".into())
        })?;
        fit.effect(topic, covariate)
    }

    /// Dominant topic per document: argmax of each row, ties broken by the
    /// lowest topic index.
    pub fn dominant_topics(&self) -> Vec<usize> {
        self.doc_topic
            .iter()
            .map(|row| {
                let mut best = 0;
                for (t, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = t;
                    }
                }
                best
            })
            .collect()
    }
}

/// Expand each sparse count row into word-id token instances.
pub(crate) fn expand_tokens(dtm: &DocTermMatrix) -> Vec<Vec<usize>> {
    (0..dtm.n_rows())
        .map(|d| {
            let mut instances = Vec::new();
            for &(col, count) in dtm.row(d) {
                for _ in 0..count.round() as usize {
                    instances.push(col);
                }
            }
            instances
        })
        .collect()
}

/// Deterministic document clustering for the `Deterministic` init mode:
/// centroids are the TF-IDF rows of the first K non-trivial documents, and
/// every document goes to its nearest centroid by cosine. Zero rows fall
/// back to round-robin.
fn greedy_clusters(dtm: &DocTermMatrix, k: usize) -> Vec<usize> {
    let tfidf = dtm.tf_idf();
    let v = tfidf.n_cols();

    let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(k);
    for d in 0..tfidf.n_rows() {
        if centroids.len() == k {
            break;
        }
        let row = tfidf.row(d);
        if row.iter().any(|&(_, w)| w > 0.0) {
            let mut dense = vec![0.0f64; v];
            for &(col, w) in row {
                dense[col] = w;
            }
            centroids.push(dense);
        }
    }

    (0..tfidf.n_rows())
        .map(|d| {
            let row = tfidf.row(d);
            let norm: f64 = row.iter().map(|&(_, w)| w * w).sum::<f64>().sqrt();
            if norm == 0.0 || centroids.is_empty() {
                return d % k;
            }
            let mut best = 0;
            let mut best_sim = f64::NEG_INFINITY;
            for (c, centroid) in centroids.iter().enumerate() {
                let c_norm: f64 = centroid.iter().map(|w| w * w).sum::<f64>().sqrt();
                if c_norm == 0.0 {
                    continue;
                }
                let dot: f64 = row.iter().map(|&(col, w)| w * centroid[col]).sum();
                let sim = dot / (norm * c_norm);
                if sim > best_sim {
                    best_sim = sim;
                    best = c;
                }
            }
            best
        })
        .collect()
}

/// Mean log p(w | d) over token instances under fitted distributions.
pub(crate) fn mean_token_log_likelihood(
    tokens: &[Vec<usize>],
    doc_topic: &[Vec<f64>],
    topic_term: &[Vec<f64>],
) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for (d, instances) in tokens.iter().enumerate() {
        for &w in instances {
            let p: f64 = doc_topic[d]
                .iter()
                .zip(topic_term.iter().map(|row| row[w]))
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
