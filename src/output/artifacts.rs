// Artifact writers — one file per stage output, written once.
//
// Formats: JSON for structured artifacts (sparse matrices, vocabulary,
// diagnostics), CSV for the tables the plotting collaborators consume, and
// the word2vec text format for the embedding table. NaN scores are written
// as "NA" so downstream tooling sees an explicit missing value, not a zero.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::corpus::document::{Document, TimelineEvent};
use crate::dtm::{DocTermMatrix, Vocabulary};
use crate::embed::word2vec::WordEmbeddings;
use crate::error::Result;
use crate::sentiment::lexicon::Category;
use crate::sentiment::scorer::ScoreRecord;
use crate::sentiment::GroupKey;
use crate::topics::model::TopicModel;
use crate::topics::prevalence::{Covariate, EffectCurve};
use crate::topics::search::KDiagnostics;

/// Writer rooted at the output directory.
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    /// Create the output directory if needed.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// The run's configuration, for reproducibility.
    pub fn write_config(&self, config: &Config) -> Result<()> {
        let file = File::create(self.path("config.json"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), config)?;
        Ok(())
    }

    /// One term per line, in vocabulary (column) order.
    pub fn write_vocabulary(&self, vocab: &Vocabulary) -> Result<()> {
        let mut writer = BufWriter::new(File::create(self.path("vocabulary.txt"))?);
        for term in vocab.terms() {
            writeln!(writer, "{term}")?;
        }
        Ok(())
    }

    /// Sparse matrix as JSON, named by its weighting variant.
    pub fn write_dtm(&self, dtm: &DocTermMatrix, name: &str) -> Result<()> {
        let file = File::create(self.path(&format!("{name}.json")))?;
        serde_json::to_writer(BufWriter::new(file), dtm)?;
        Ok(())
    }

    /// Per-document topic distribution table.
    pub fn write_doc_topics(&self, model: &TopicModel, documents: &[Document]) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.path("doc_topics.csv"))?;
        let mut header = vec![
            "doc_id".to_string(),
            "organisation".to_string(),
            "date".to_string(),
        ];
        header.extend((0..model.k).map(|t| format!("topic_{t}")));
        writer.write_record(&header)?;

        for (doc, row) in documents.iter().zip(&model.doc_topic) {
            let mut record = vec![
                doc.id.to_string(),
                doc.organisation.clone(),
                doc.date.to_string(),
            ];
            record.extend(row.iter().map(|p| format!("{p:.6}")));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Top terms per topic.
    pub fn write_top_terms(
        &self,
        model: &TopicModel,
        vocab: &Vocabulary,
        n: usize,
    ) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.path("topic_terms.csv"))?;
        writer.write_record(["topic", "rank", "term", "probability"])?;
        for (topic, terms) in model.top_terms(vocab, n).iter().enumerate() {
            for (rank, (term, probability)) in terms.iter().enumerate() {
                writer.write_record([
                    topic.to_string(),
                    (rank + 1).to_string(),
                    term.clone(),
                    format!("{probability:.6}"),
                ])?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Embedding table in the word2vec text format: a `vocab dim` header,
    /// then one term and its components per line.
    pub fn write_embeddings(&self, embeddings: &WordEmbeddings) -> Result<()> {
        let mut writer = BufWriter::new(File::create(self.path("embeddings.txt"))?);
        writeln!(writer, "{} {}", embeddings.len(), embeddings.dim())?;
        for (term, vector) in embeddings.iter() {
            write!(writer, "{term}")?;
            for v in vector {
                write!(writer, " {v}")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// A score table; `name` distinguishes the lexicon and embedding paths
    /// and the aggregation level. NaN becomes "NA".
    pub fn write_scores(
        &self,
        name: &str,
        labels: &[String],
        records: &[ScoreRecord],
    ) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.path(&format!("{name}.csv")))?;
        let mut header = vec!["bucket".to_string()];
        header.extend(Category::ALL.iter().map(|c| c.label().to_string()));
        writer.write_record(&header)?;

        for (label, record) in labels.iter().zip(records) {
            let mut row = vec![label.clone()];
            for category in Category::ALL {
                let value = record.get(category);
                row.push(if value.is_finite() {
                    format!("{value:.6}")
                } else {
                    "NA".to_string()
                });
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Aggregated buckets with their group labels.
    pub fn write_bucket_scores(
        &self,
        name: &str,
        buckets: &[(GroupKey, ScoreRecord)],
    ) -> Result<()> {
        let labels: Vec<String> = buckets.iter().map(|(k, _)| k.label()).collect();
        let records: Vec<ScoreRecord> = buckets.iter().map(|(_, r)| r.clone()).collect();
        self.write_scores(name, &labels, &records)
    }

    /// K-search diagnostics, one row per candidate in search order.
    pub fn write_diagnostics(&self, diagnostics: &[KDiagnostics]) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.path("k_diagnostics.csv"))?;
        writer.write_record([
            "k",
            "heldout_log_likelihood",
            "semantic_coherence",
            "lower_bound",
            "residual_dispersion",
        ])?;
        for d in diagnostics {
            writer.write_record([
                d.k.to_string(),
                format!("{:.6}", d.heldout_log_likelihood),
                format!("{:.6}", d.semantic_coherence),
                format!("{:.6}", d.lower_bound),
                format!("{:.6}", d.residual_dispersion),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Prevalence effect curves for every topic and covariate.
    pub fn write_effects(&self, curves: &[EffectCurve]) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.path("effects.csv"))?;
        writer.write_record(["topic", "covariate", "x", "level", "estimate", "lower", "upper"])?;
        for curve in curves {
            let covariate = match curve.covariate {
                Covariate::DayOfYear => "day_of_year",
                Covariate::Organisation => "organisation",
            };
            for point in &curve.points {
                writer.write_record([
                    curve.topic.to_string(),
                    covariate.to_string(),
                    point.x.to_string(),
                    point.label.clone().unwrap_or_default(),
                    format!("{:.6}", point.estimate),
                    format!("{:.6}", point.lower),
                    format!("{:.6}", point.upper),
                ])?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Event timeline passthrough for downstream annotation.
    pub fn write_events(&self, events: &[TimelineEvent]) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.path("events.csv"))?;
        writer.write_record(["date", "event"])?;
        for event in events {
            writer.write_record([event.date.to_string(), event.event.clone()])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn finish(&self) {
        info!(dir = %self.dir.display(), "Artifacts written");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lists(docs: &[&[&str]]) -> Vec<Vec<String>> {
        docs.iter()
            .map(|d| d.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn vocabulary_and_dtm_round_trip() {
        let dir = std::env::temp_dir().join("refract_artifacts_test");
        let writer = ArtifactWriter::new(&dir).unwrap();

        let docs = lists(&[&["aid", "camp"], &["aid"]]);
        let vocab = Vocabulary::build(&docs, 1);
        let dtm = DocTermMatrix::from_terms(&docs, &vocab);

        writer.write_vocabulary(&vocab).unwrap();
        writer.write_dtm(&dtm, "dtm_counts").unwrap();

        let text = fs::read_to_string(dir.join("vocabulary.txt")).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["aid", "camp"]);

        let json = fs::read_to_string(dir.join("dtm_counts.json")).unwrap();
        let parsed: DocTermMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.n_rows(), 2);
        assert_eq!(parsed.row(0), dtm.row(0));
    }

    #[test]
    fn nan_scores_written_as_na() {
        use std::collections::BTreeMap;

        let dir = std::env::temp_dir().join("refract_artifacts_na_test");
        let writer = ArtifactWriter::new(&dir).unwrap();

        let mut map = BTreeMap::new();
        for category in Category::ALL {
            map.insert(category, f64::NAN);
        }
        let record = ScoreRecord::from_normalized(map);
        writer
            .write_scores("scores_test", &["doc 0".to_string()], &[record])
            .unwrap();

        let text = fs::read_to_string(dir.join("scores_test.csv")).unwrap();
        assert!(text.lines().nth(1).unwrap().contains("NA"));
    }
}
