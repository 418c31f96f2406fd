// Pipeline orchestration — wires the stages together in their batch order
// and writes each stage's artifact exactly once.
//
// Every stage consumes the complete output of its predecessor: normalize →
// DTM → topic model → embeddings → scores. Results are immutable structures
// handed forward, never shared mutable state.

use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::corpus::document::{Document, TimelineEvent};
use crate::corpus::normalize::{NormalizedCorpus, Normalizer};
use crate::dtm::{DocTermMatrix, Vocabulary};
use crate::embed::docvec::{self, DocEmbedding};
use crate::embed::word2vec::{self, WordEmbeddings};
use crate::error::Result;
use crate::output::artifacts::ArtifactWriter;
use crate::sentiment::aggregate::{
    self, keys_by_date, keys_by_dominant_topic, keys_by_organisation,
};
use crate::sentiment::lexicon::Lexicon;
use crate::sentiment::scorer::{self, ScoreRecord};
use crate::topics::model::{FitOptions, TopicModel};
use crate::topics::prevalence::Covariate;
use crate::topics::search::{self, KDiagnostics};

/// Output of the normalize + DTM stages, consumed by everything after.
pub struct PreparedCorpus {
    pub corpus: NormalizedCorpus,
    pub vocab: Vocabulary,
    pub counts: DocTermMatrix,
}

/// Normalize the raw documents and build the vocabulary and count matrix.
pub fn prepare(documents: &[Document], config: &Config) -> Result<PreparedCorpus> {
    let normalizer = Normalizer::new(config)?;
    let corpus = normalizer.normalize_corpus(documents);
    let vocab = Vocabulary::build(&corpus.terms, config.min_doc_frequency);
    let counts = DocTermMatrix::from_terms(&corpus.terms, &vocab);
    Ok(PreparedCorpus {
        corpus,
        vocab,
        counts,
    })
}

/// Model-selection search over the configured candidate K list.
pub fn search_topics(prepared: &PreparedCorpus, config: &Config) -> Result<Vec<KDiagnostics>> {
    search::search_k(&prepared.counts, &prepared.corpus.documents, config)
}

/// Fit the topic model at a fixed K with the configured covariates.
pub fn fit_topics(prepared: &PreparedCorpus, config: &Config, k: usize) -> Result<TopicModel> {
    let options = FitOptions::from_config(config, k);
    TopicModel::fit(
        &prepared.counts,
        &prepared.corpus.documents,
        Some(&config.prevalence),
        &options,
    )
}

/// Train word embeddings on the flattened token stream and embed every
/// document.
pub fn train_embeddings(
    prepared: &PreparedCorpus,
    config: &Config,
) -> Result<(WordEmbeddings, Vec<DocEmbedding>)> {
    let stream: Vec<String> = prepared.corpus.tokens.iter().flatten().cloned().collect();
    let embeddings = word2vec::train(&stream, &config.embedding, config.seed)?;
    let doc_embeddings = docvec::embed_documents(&embeddings, &prepared.corpus.tokens);
    Ok((embeddings, doc_embeddings))
}

/// Per-document scores from both paths, kept distinguishable.
pub struct ScoreTables {
    pub lexicon: Vec<ScoreRecord>,
    pub embedding: Vec<ScoreRecord>,
}

/// Score every document via the lexicon path and the embedding path.
pub fn score_documents(
    prepared: &PreparedCorpus,
    lexicon: &Lexicon,
    embeddings: &WordEmbeddings,
    doc_embeddings: &[DocEmbedding],
) -> ScoreTables {
    let proportions = prepared.counts.proportions();
    ScoreTables {
        lexicon: scorer::score_lexicon(&proportions, &prepared.vocab, lexicon),
        embedding: scorer::score_embedding(doc_embeddings, lexicon, embeddings),
    }
}

/// The full batch run: every stage in order, artifacts for each.
pub fn run_full(
    documents: &[Document],
    events: &[TimelineEvent],
    lexicon: &Lexicon,
    config: &Config,
    out_dir: &Path,
) -> Result<()> {
    let writer = ArtifactWriter::new(out_dir)?;
    writer.write_config(config)?;

    let prepared = prepare(documents, config)?;
    writer.write_vocabulary(&prepared.vocab)?;
    writer.write_dtm(&prepared.counts, "dtm_counts")?;
    writer.write_dtm(&prepared.counts.tf_idf(), "dtm_tfidf")?;
    writer.write_dtm(&prepared.counts.proportions(), "dtm_proportions")?;

    let model = fit_topics(&prepared, config, config.k)?;
    writer.write_doc_topics(&model, &prepared.corpus.documents)?;
    writer.write_top_terms(&model, &prepared.vocab, 10)?;

    let mut curves = Vec::new();
    for topic in 0..model.k {
        if config.prevalence.day_of_year {
            curves.push(model.effect(topic, Covariate::DayOfYear)?);
        }
        if config.prevalence.organisation {
            curves.push(model.effect(topic, Covariate::Organisation)?);
        }
    }
    writer.write_effects(&curves)?;

    let (embeddings, doc_embeddings) = train_embeddings(&prepared, config)?;
    writer.write_embeddings(&embeddings)?;

    let scores = score_documents(&prepared, lexicon, &embeddings, &doc_embeddings);
    let doc_labels: Vec<String> = prepared
        .corpus
        .documents
        .iter()
        .map(|d| format!("doc {}", d.id))
        .collect();
    writer.write_scores("scores_lexicon_doc", &doc_labels, &scores.lexicon)?;
    writer.write_scores("scores_embedding_doc", &doc_labels, &scores.embedding)?;

    // Aggregations: by date, organisation, and dominant topic — for both
    // scoring paths.
    let groupings = [
        ("by_date", keys_by_date(&prepared.corpus.documents)),
        (
            "by_organisation",
            keys_by_organisation(&prepared.corpus.documents),
        ),
        ("by_topic", keys_by_dominant_topic(&model)),
    ];
    for (suffix, keys) in &groupings {
        writer.write_bucket_scores(
            &format!("scores_lexicon_{suffix}"),
            &aggregate::aggregate(&scores.lexicon, keys),
        )?;
        writer.write_bucket_scores(
            &format!("scores_embedding_{suffix}"),
            &aggregate::aggregate(&scores.embedding, keys),
        )?;
    }

    if !events.is_empty() {
        writer.write_events(events)?;
    }

    writer.finish();
    info!(
        documents = prepared.corpus.documents.len(),
        dropped = prepared.corpus.dropped.len(),
        vocabulary = prepared.vocab.len(),
        k = model.k,
        "Pipeline complete"
    );
    Ok(())
}
