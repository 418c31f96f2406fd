// Text normalization — boilerplate stripping, tokenization, stopword
// removal, stemming, and n-gram expansion.
//
// Every step is independently toggleable through Config. The output keeps
// two views per surviving document: the ordered unigram stream (consumed by
// the embedding trainer) and the expanded unigram+bigram term list (consumed
// by the DTM builder). A document that is empty after cleaning is dropped
// here, so nothing downstream ever sees its id.

use std::collections::HashSet;

use regex_lite::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use stop_words::{get, LANGUAGE};
use tracing::info;

use crate::config::Config;
use crate::corpus::document::Document;
use crate::error::{PipelineError, Result};

/// The cleaned corpus: surviving documents plus their token views.
///
/// `documents`, `tokens`, and `terms` are index-aligned. Documents dropped
/// during cleaning are listed in `dropped` by their ingestion id.
#[derive(Debug, Clone)]
pub struct NormalizedCorpus {
    pub documents: Vec<Document>,
    /// Ordered stemmed unigrams per document.
    pub tokens: Vec<Vec<String>>,
    /// Unigrams plus space-joined bigrams per document.
    pub terms: Vec<Vec<String>>,
    /// Ingestion ids of documents rendered empty by cleaning.
    pub dropped: Vec<usize>,
}

/// Configured normalizer. Build once per run, apply to the whole corpus.
pub struct Normalizer {
    boilerplate: Vec<Regex>,
    url: Option<Regex>,
    stopwords: HashSet<String>,
    stemmer: Option<Stemmer>,
    lowercase: bool,
    strip_punctuation: bool,
    strip_numbers: bool,
    ngram_max: usize,
}

impl Normalizer {
    pub fn new(config: &Config) -> Result<Self> {
        let boilerplate = config
            .boilerplate_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    PipelineError::InvalidConfig(format!("bad boilerplate pattern '{p}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let url = if config.strip_urls {
            // regex-lite has no lookaround; a greedy non-space match is enough
            // for URLs embedded in prose.
            Some(Regex::new(r"(https?://|www\.)\S+").expect("static pattern"))
        } else {
            None
        };

        let mut stopwords: HashSet<String> = HashSet::new();
        if config.remove_stopwords {
            stopwords.extend(get(LANGUAGE::English));
        }
        stopwords.extend(config.extra_stopwords.iter().cloned());

        let stemmer = config.stem.then(|| Stemmer::create(Algorithm::English));

        Ok(Self {
            boilerplate,
            url,
            stopwords,
            stemmer,
            lowercase: config.lowercase,
            strip_punctuation: config.strip_punctuation,
            strip_numbers: config.strip_numbers,
            ngram_max: config.ngram_max,
        })
    }

    /// Normalize one raw text into its ordered unigram stream.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut cleaned = text.to_string();

        for pattern in &self.boilerplate {
            cleaned = pattern.replace_all(&cleaned, " ").into_owned();
        }
        if let Some(url) = &self.url {
            cleaned = url.replace_all(&cleaned, " ").into_owned();
        }
        if self.lowercase {
            cleaned = cleaned.to_lowercase();
        }

        let cleaned: String = cleaned
            .chars()
            .map(|c| {
                if c.is_alphabetic() {
                    c
                } else if c.is_ascii_digit() {
                    if self.strip_numbers {
                        ' '
                    } else {
                        c
                    }
                } else if self.strip_punctuation {
                    ' '
                } else if c.is_whitespace() {
                    ' '
                } else {
                    c
                }
            })
            .collect();

        cleaned
            .split_whitespace()
            .filter(|tok| tok.chars().count() >= 2)
            .filter(|tok| !self.stopwords.contains(*tok))
            .map(|tok| match &self.stemmer {
                Some(stemmer) => stemmer.stem(tok).into_owned(),
                None => tok.to_string(),
            })
            .collect()
    }

    /// Expand a unigram stream into the term set for the DTM: the unigrams
    /// themselves plus space-joined bigrams when configured.
    pub fn expand_terms(&self, tokens: &[String]) -> Vec<String> {
        let mut terms = tokens.to_vec();
        if self.ngram_max >= 2 {
            terms.extend(
                tokens
                    .windows(2)
                    .map(|pair| format!("{} {}", pair[0], pair[1])),
            );
        }
        terms
    }

    /// Normalize the whole corpus, dropping documents rendered empty.
    ///
    /// The surviving documents keep their original ingestion ids, but every
    /// index-aligned structure downstream (DTM rows, topic distributions,
    /// score tables) is built over this filtered set only.
    pub fn normalize_corpus(&self, documents: &[Document]) -> NormalizedCorpus {
        let mut surviving = Vec::new();
        let mut tokens = Vec::new();
        let mut terms = Vec::new();
        let mut dropped = Vec::new();

        for doc in documents {
            let toks = self.tokenize(&doc.text);
            if toks.is_empty() {
                dropped.push(doc.id);
                continue;
            }
            terms.push(self.expand_terms(&toks));
            tokens.push(toks);
            surviving.push(doc.clone());
        }

        info!(
            surviving = surviving.len(),
            dropped = dropped.len(),
            "Normalized corpus"
        );

        NormalizedCorpus {
            documents: surviving,
            tokens,
            terms,
            dropped,
        }
    }
}

/// Stem a single term with the normalizer's algorithm.
///
/// The sentiment lexicon runs its member terms through this so lookups match
/// the stemmed vocabulary.
pub fn stem_term(term: &str) -> String {
    Stemmer::create(Algorithm::English)
        .stem(&term.to_lowercase())
        .into_owned()
}
