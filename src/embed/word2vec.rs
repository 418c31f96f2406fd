// Skip-gram embedding training with negative sampling.
//
// The trainer consumes the flattened token stream (order-preserving
// concatenation across documents; windows spanning a document boundary are
// an accepted approximation). Noise words are drawn from the unigram^0.75
// distribution through a cumulative table. Every random draw comes from one
// StdRng seeded explicitly, so training is reproducible.

use std::collections::HashMap;

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::config::EmbeddingConfig;
use crate::error::{PipelineError, Result};

/// Trained term vectors, read-only after training.
#[derive(Debug, Clone)]
pub struct WordEmbeddings {
    dim: usize,
    terms: Vec<String>,
    index: HashMap<String, usize>,
    /// Input (center-word) vectors, one row per term.
    vectors: Array2<f32>,
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Train skip-gram embeddings over the flattened token stream.
///
/// Tokens below `min_count` corpus frequency are discarded before training.
/// Fails with `InsufficientData` when nothing survives the frequency cut.
pub fn train(stream: &[String], config: &EmbeddingConfig, seed: u64) -> Result<WordEmbeddings> {
    // Vocabulary: frequency-sorted, ties by first appearance.
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for token in stream {
        let entry = counts.entry(token.as_str()).or_insert(0);
        if *entry == 0 {
            first_seen.push(token.as_str());
        }
        *entry += 1;
    }
    let mut order: HashMap<&str, usize> = HashMap::new();
    for (i, t) in first_seen.iter().enumerate() {
        order.insert(t, i);
    }
    let mut kept: Vec<(&str, usize)> = counts
        .into_iter()
        .filter(|&(_, c)| c >= config.min_count)
        .collect();
    kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| order[a.0].cmp(&order[b.0])));

    if kept.is_empty() {
        return Err(PipelineError::InsufficientData {
            required: 1,
            available: 0,
        });
    }

    let terms: Vec<String> = kept.iter().map(|&(t, _)| t.to_string()).collect();
    let index: HashMap<String, usize> = terms
        .iter()
        .enumerate()
        .map(|(i, t)| (t.clone(), i))
        .collect();
    let term_counts: Vec<usize> = kept.iter().map(|&(_, c)| c).collect();

    // Cumulative unigram^0.75 noise distribution.
    let mut noise_cdf: Vec<f64> = Vec::with_capacity(term_counts.len());
    let mut acc = 0.0;
    for &c in &term_counts {
        acc += (c as f64).powf(0.75);
        noise_cdf.push(acc);
    }
    let noise_total = acc;

    // Stream as word ids, out-of-vocabulary tokens dropped.
    let ids: Vec<usize> = stream.iter().filter_map(|t| index.get(t).copied()).collect();

    let vocab_size = terms.len();
    let dim = config.dim;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut syn0 = Array2::<f32>::zeros((vocab_size, dim));
    let mut syn1 = Array2::<f32>::zeros((vocab_size, dim));
    let scale = 1.0 / dim as f32;
    for i in 0..vocab_size {
        for j in 0..dim {
            syn0[[i, j]] = (rng.random::<f32>() - 0.5) * scale;
        }
    }

    info!(
        vocab = vocab_size,
        tokens = ids.len(),
        dim,
        epochs = config.epochs,
        "Training skip-gram embeddings"
    );

    let bar = ProgressBar::new(config.epochs as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] epoch {pos}/{len}")
            .expect("static template")
            .progress_chars("#>-"),
    );

    let mut gradient = vec![0.0f32; dim];

    for epoch in 0..config.epochs {
        let progress = epoch as f32 / config.epochs.max(1) as f32;
        let lr = (config.learning_rate * (1.0 - progress)).max(config.learning_rate * 1e-4);

        for pos in 0..ids.len() {
            let center = ids[pos];
            let radius = rng.random_range(1..=config.window);
            let start = pos.saturating_sub(radius);
            let end = (pos + radius + 1).min(ids.len());

            for ctx_pos in start..end {
                if ctx_pos == pos {
                    continue;
                }
                let context = ids[ctx_pos];
                gradient.iter_mut().for_each(|g| *g = 0.0);

                // Positive pair, then the negative draws.
                for sample in 0..=config.negative_samples {
                    let (target, label) = if sample == 0 {
                        (context, 1.0f32)
                    } else {
                        let u = rng.random::<f64>() * noise_total;
                        let drawn = noise_cdf.partition_point(|&c| c <= u).min(vocab_size - 1);
                        if drawn == context {
                            continue;
                        }
                        (drawn, 0.0f32)
                    };

                    let mut dot = 0.0f32;
                    for j in 0..dim {
                        dot += syn0[[center, j]] * syn1[[target, j]];
                    }
                    let g = lr * (label - sigmoid(dot));
                    for j in 0..dim {
                        gradient[j] += g * syn1[[target, j]];
                        syn1[[target, j]] += g * syn0[[center, j]];
                    }
                }

                for j in 0..dim {
                    syn0[[center, j]] += gradient[j];
                }
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(WordEmbeddings {
        dim,
        terms,
        index,
        vectors: syn0,
    })
}

impl WordEmbeddings {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.index.contains_key(term)
    }

    /// The vector for a term, as f64 for downstream scoring.
    pub fn vector(&self, term: &str) -> Option<Vec<f64>> {
        self.index
            .get(term)
            .map(|&i| self.vectors.row(i).iter().map(|&v| v as f64).collect())
    }

    /// Iterate (term, vector) pairs in frequency order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Vec<f64>)> + '_ {
        self.terms.iter().enumerate().map(|(i, t)| {
            (
                t.as_str(),
                self.vectors.row(i).iter().map(|&v| v as f64).collect(),
            )
        })
    }

    /// Top-N terms nearest to `term` by cosine similarity, excluding the
    /// term itself.
    pub fn nearest(&self, term: &str, n: usize) -> Result<Vec<(String, f64)>> {
        let &query = self
            .index
            .get(term)
            .ok_or_else(|| PipelineError::UnknownTerm(term.to_string()))?;
        let query_vec: Vec<f64> = self.vectors.row(query).iter().map(|&v| v as f64).collect();

        let mut ranked: Vec<(usize, f64)> = (0..self.terms.len())
            .filter(|&i| i != query)
            .map(|i| {
                let v: Vec<f64> = self.vectors.row(i).iter().map(|&x| x as f64).collect();
                (i, super::cosine(&query_vec, &v))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(ranked
            .into_iter()
            .take(n)
            .map(|(i, sim)| (self.terms[i].clone(), sim))
            .collect())
    }

    /// Mean vector of the in-vocabulary tokens, or None when nothing is in
    /// vocabulary. This is the document-embedding inference path.
    pub fn mean_of(&self, tokens: &[String]) -> Option<Vec<f64>> {
        let mut sum = vec![0.0f64; self.dim];
        let mut hits = 0usize;
        for token in tokens {
            if let Some(&i) = self.index.get(token) {
                for (j, &v) in self.vectors.row(i).iter().enumerate() {
                    sum[j] += v as f64;
                }
                hits += 1;
            }
        }
        if hits == 0 {
            return None;
        }
        for v in &mut sum {
            *v /= hits as f64;
        }
        Some(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> Vec<String> {
        // Two interleaved micro-themes, repeated enough for min_count.
        let mut out = Vec::new();
        for _ in 0..30 {
            for w in ["asylum", "refugee", "border"] {
                out.push(w.to_string());
            }
            for w in ["flood", "relief", "water"] {
                out.push(w.to_string());
            }
        }
        out
    }

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            dim: 16,
            window: 2,
            min_count: 2,
            epochs: 2,
            negative_samples: 3,
            learning_rate: 0.05,
        }
    }

    #[test]
    fn trains_vectors_of_configured_dimension() {
        let embeddings = train(&stream(), &config(), 3).unwrap();
        assert_eq!(embeddings.dim(), 16);
        assert_eq!(embeddings.vector("asylum").unwrap().len(), 16);
    }

    #[test]
    fn min_count_drops_rare_terms() {
        let mut tokens = stream();
        tokens.push("hapax".to_string());
        let embeddings = train(&tokens, &config(), 3).unwrap();
        assert!(!embeddings.contains("hapax"));
        assert!(embeddings.contains("asylum"));
    }

    #[test]
    fn empty_vocabulary_fails() {
        let tokens = vec!["once".to_string()];
        let err = train(&tokens, &config(), 3).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { .. }));
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let a = train(&stream(), &config(), 42).unwrap();
        let b = train(&stream(), &config(), 42).unwrap();
        for (term, vec_a) in a.iter() {
            assert_eq!(vec_a, b.vector(term).unwrap());
        }
    }

    #[test]
    fn nearest_excludes_the_query_term() {
        let embeddings = train(&stream(), &config(), 7).unwrap();
        let nearest = embeddings.nearest("asylum", 3).unwrap();
        assert_eq!(nearest.len(), 3);
        assert!(nearest.iter().all(|(t, _)| t != "asylum"));
        for pair in nearest.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn nearest_unknown_term_errors() {
        let embeddings = train(&stream(), &config(), 7).unwrap();
        assert!(matches!(
            embeddings.nearest("nope", 3),
            Err(PipelineError::UnknownTerm(_))
        ));
    }

    #[test]
    fn mean_of_ignores_out_of_vocab_tokens() {
        let embeddings = train(&stream(), &config(), 7).unwrap();
        let with_noise = vec!["asylum".to_string(), "zzz".to_string()];
        let clean = vec!["asylum".to_string()];
        assert_eq!(
            embeddings.mean_of(&with_noise).unwrap(),
            embeddings.mean_of(&clean).unwrap()
        );
        assert!(embeddings.mean_of(&["zzz".to_string()]).is_none());
    }
}
