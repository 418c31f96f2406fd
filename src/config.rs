use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Central configuration for a pipeline run.
///
/// Loaded from a JSON file; every field has a default so a missing file or a
/// partial file is fine. The same struct is written back out alongside the
/// artifacts so a run can be reproduced exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Regex patterns stripped from raw text before tokenization
    /// (disclaimers, footers, share-button boilerplate).
    pub boilerplate_patterns: Vec<String>,
    /// Lowercase text before tokenization.
    pub lowercase: bool,
    /// Strip URLs before tokenization.
    pub strip_urls: bool,
    /// Replace punctuation and symbols with whitespace.
    pub strip_punctuation: bool,
    /// Drop digits from tokens.
    pub strip_numbers: bool,
    /// Remove English stopwords (stop-words crate list).
    pub remove_stopwords: bool,
    /// Domain-specific stopwords removed in addition to the built-in list.
    pub extra_stopwords: Vec<String>,
    /// Apply Snowball English stemming.
    pub stem: bool,
    /// Largest n-gram emitted into the term set (1 = unigrams only,
    /// 2 = unigrams + bigrams).
    pub ngram_max: usize,

    /// Minimum number of documents a term must appear in to enter the
    /// vocabulary.
    pub min_doc_frequency: usize,

    /// Candidate topic counts for the model-selection search.
    pub candidate_k: Vec<usize>,
    /// Chosen topic count for a final fit.
    pub k: usize,
    /// Prevalence covariates for the topic model.
    pub prevalence: PrevalenceSpec,
    /// Gibbs sweeps after burn-in.
    pub gibbs_sweeps: usize,
    /// Burn-in sweeps before prior updates begin.
    pub burn_in: usize,
    /// Sweeps between prevalence-regression prior refreshes.
    pub prior_update_interval: usize,
    /// Fraction of token instances masked per document for the held-out
    /// likelihood diagnostic.
    pub holdout_fraction: f64,

    /// Word-embedding training parameters.
    pub embedding: EmbeddingConfig,

    /// Seed threaded through every stochastic stage.
    pub seed: u64,
}

/// Covariates entering the topic-prevalence regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrevalenceSpec {
    /// Smooth effect of publication day-of-year (cubic spline).
    pub day_of_year: bool,
    /// Number of interior spline knots for the day-of-year effect.
    pub spline_knots: usize,
    /// Categorical organisation effect.
    pub organisation: bool,
    /// Ridge penalty for the prevalence regression.
    pub ridge: f64,
}

/// Skip-gram embedding training parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub dim: usize,
    pub window: usize,
    pub min_count: usize,
    pub epochs: usize,
    pub negative_samples: usize,
    pub learning_rate: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            boilerplate_patterns: Vec::new(),
            lowercase: true,
            strip_urls: true,
            strip_punctuation: true,
            strip_numbers: true,
            remove_stopwords: true,
            extra_stopwords: Vec::new(),
            stem: true,
            ngram_max: 2,
            min_doc_frequency: 5,
            candidate_k: vec![4, 6, 8, 10],
            k: 8,
            prevalence: PrevalenceSpec::default(),
            gibbs_sweeps: 200,
            burn_in: 50,
            prior_update_interval: 25,
            holdout_fraction: 0.1,
            embedding: EmbeddingConfig::default(),
            seed: 42,
        }
    }
}

impl Default for PrevalenceSpec {
    fn default() -> Self {
        Self {
            day_of_year: true,
            spline_knots: 3,
            organisation: true,
            ridge: 0.1,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dim: 100,
            window: 5,
            min_count: 5,
            epochs: 5,
            negative_samples: 5,
            learning_rate: 0.025,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, or defaults when `path` is None.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => serde_json::from_str(&fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        Ok(config)
    }

    /// Check the invariants the pipeline stages rely on.
    pub fn validate(&self) -> Result<()> {
        if self.ngram_max == 0 || self.ngram_max > 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "ngram_max must be 1 or 2, got {}",
                self.ngram_max
            )));
        }
        if self.k == 0 {
            return Err(PipelineError::InvalidConfig("k must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            return Err(PipelineError::InvalidConfig(format!(
                "holdout_fraction must be in [0, 1), got {}",
                self.holdout_fraction
            )));
        }
        if self.embedding.dim == 0 || self.embedding.window == 0 {
            return Err(PipelineError::InvalidConfig(
                "embedding dim and window must be nonzero".into(),
            ));
        }
        Ok(())
    }
}
