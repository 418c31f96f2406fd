// Unit tests for the topic model: invariants, determinism under a fixed
// seed, failure modes, and the post-fit queries.

use chrono::NaiveDate;

use refract::config::{Config, PrevalenceSpec};
use refract::corpus::document::Document;
use refract::dtm::{DocTermMatrix, Vocabulary};
use refract::error::PipelineError;
use refract::topics::model::{FitOptions, Initialization, TopicModel};
use refract::topics::prevalence::Covariate;
use refract::topics::search;

fn doc(id: usize, org: &str, day: u16) -> Document {
    Document {
        id,
        organisation: org.to_string(),
        title: String::new(),
        date: NaiveDate::from_yo_opt(2019, day as u32).unwrap(),
        day_of_year: day,
        text: String::new(),
    }
}

/// A corpus with eight distinguishable term clusters, large enough for K=8.
fn clustered_corpus() -> (Vec<Vec<String>>, Vec<Document>) {
    let themes: [&[&str]; 8] = [
        &["asylum", "refugee", "border"],
        &["flood", "relief", "water"],
        &["school", "teacher", "classroom"],
        &["clinic", "vaccine", "nurse"],
        &["harvest", "drought", "farm"],
        &["shelter", "housing", "tenant"],
        &["court", "appeal", "ruling"],
        &["donor", "funding", "grant"],
    ];
    let mut term_lists = Vec::new();
    let mut documents = Vec::new();
    for i in 0..40 {
        let theme = themes[i % themes.len()];
        let terms: Vec<String> = (0..9).map(|j| theme[j % theme.len()].to_string()).collect();
        term_lists.push(terms);
        documents.push(doc(
            i,
            if i % 2 == 0 { "RedCross" } else { "Oxfam" },
            ((i * 9) % 365 + 1) as u16,
        ));
    }
    (term_lists, documents)
}

fn options(k: usize, seed: u64) -> FitOptions {
    FitOptions {
        k,
        sweeps: 40,
        burn_in: 10,
        prior_update_interval: 10,
        alpha: 50.0 / k as f64,
        beta: 0.01,
        init: Initialization::Seeded,
        seed,
    }
}

// ============================================================
// Invariants
// ============================================================

#[test]
fn fitted_distributions_are_row_stochastic() {
    let (term_lists, documents) = clustered_corpus();
    let vocab = Vocabulary::build(&term_lists, 1);
    let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);
    let model = TopicModel::fit(&dtm, &documents, None, &options(8, 17)).unwrap();

    assert_eq!(model.doc_topic.len(), dtm.n_rows());
    assert_eq!(model.topic_term.len(), 8);
    for row in &model.doc_topic {
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(row.iter().all(|&p| p >= 0.0));
    }
    for row in &model.topic_term {
        assert_eq!(row.len(), vocab.len());
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}

// ============================================================
// Determinism under a fixed seed
// ============================================================

#[test]
fn k8_fit_with_same_seed_is_identical() {
    let (term_lists, documents) = clustered_corpus();
    let vocab = Vocabulary::build(&term_lists, 1);
    let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);
    let spec = PrevalenceSpec::default();

    let a = TopicModel::fit(&dtm, &documents, Some(&spec), &options(8, 123)).unwrap();
    let b = TopicModel::fit(&dtm, &documents, Some(&spec), &options(8, 123)).unwrap();

    assert_eq!(a.doc_topic, b.doc_topic);
    assert_eq!(a.topic_term, b.topic_term);
}

#[test]
fn deterministic_initialization_with_fixed_seed_is_identical() {
    let (term_lists, documents) = clustered_corpus();
    let vocab = Vocabulary::build(&term_lists, 1);
    let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);

    let mut opts = options(8, 55);
    opts.init = Initialization::Deterministic;
    let a = TopicModel::fit(&dtm, &documents, None, &opts).unwrap();
    let b = TopicModel::fit(&dtm, &documents, None, &opts).unwrap();
    assert_eq!(a.doc_topic, b.doc_topic);
}

#[test]
fn different_seeds_generally_differ() {
    let (term_lists, documents) = clustered_corpus();
    let vocab = Vocabulary::build(&term_lists, 1);
    let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);

    let a = TopicModel::fit(&dtm, &documents, None, &options(8, 1)).unwrap();
    let b = TopicModel::fit(&dtm, &documents, None, &options(8, 2)).unwrap();
    assert_ne!(a.doc_topic, b.doc_topic);
}

// ============================================================
// Failure modes
// ============================================================

#[test]
fn fewer_non_trivial_documents_than_k_fails() {
    let term_lists: Vec<Vec<String>> = (0..3).map(|_| vec!["aid".to_string()]).collect();
    let documents: Vec<Document> = (0..3).map(|i| doc(i, "A", 1)).collect();
    let vocab = Vocabulary::build(&term_lists, 1);
    let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);

    let err = TopicModel::fit(&dtm, &documents, None, &options(8, 1)).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InsufficientData {
            required: 8,
            available: 3
        }
    ));
}

#[test]
fn out_of_range_topic_index_fails() {
    let (term_lists, documents) = clustered_corpus();
    let vocab = Vocabulary::build(&term_lists, 1);
    let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);
    let spec = PrevalenceSpec::default();
    let model = TopicModel::fit(&dtm, &documents, Some(&spec), &options(4, 3)).unwrap();

    assert!(matches!(
        model.thoughts(4, 3),
        Err(PipelineError::IndexOutOfRange { index: 4, len: 4 })
    ));
    assert!(matches!(
        model.effect(7, Covariate::DayOfYear),
        Err(PipelineError::IndexOutOfRange { index: 7, len: 4 })
    ));
}

// ============================================================
// Queries
// ============================================================

#[test]
fn thoughts_returns_documents_ranked_by_topic_mass() {
    let (term_lists, documents) = clustered_corpus();
    let vocab = Vocabulary::build(&term_lists, 1);
    let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);
    let model = TopicModel::fit(&dtm, &documents, None, &options(4, 9)).unwrap();

    let ranked = model.thoughts(1, 10).unwrap();
    assert_eq!(ranked.len(), 10);
    for pair in ranked.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }
    // Every returned index addresses a real document row.
    assert!(ranked.iter().all(|&(d, _)| d < dtm.n_rows()));
}

#[test]
fn effect_curve_covers_the_year_with_bounds() {
    let (term_lists, documents) = clustered_corpus();
    let vocab = Vocabulary::build(&term_lists, 1);
    let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);
    let spec = PrevalenceSpec::default();
    let model = TopicModel::fit(&dtm, &documents, Some(&spec), &options(4, 3)).unwrap();

    let curve = model.effect(2, Covariate::DayOfYear).unwrap();
    assert!(curve.points.first().unwrap().x <= 1.0);
    assert!(curve.points.last().unwrap().x >= 360.0);
    for point in &curve.points {
        assert!(point.lower <= point.estimate && point.estimate <= point.upper);
    }

    let orgs = model.effect(2, Covariate::Organisation).unwrap();
    assert_eq!(orgs.points.len(), 2);
    assert!(orgs.points.iter().any(|p| p.label.as_deref() == Some("Oxfam")));
}

// ============================================================
// Model-selection search
// ============================================================

#[test]
fn search_reports_diagnostics_per_candidate_in_supplied_order() {
    let (term_lists, documents) = clustered_corpus();
    let vocab = Vocabulary::build(&term_lists, 1);
    let dtm = DocTermMatrix::from_terms(&term_lists, &vocab);

    let config = Config {
        candidate_k: vec![8, 4, 6],
        gibbs_sweeps: 20,
        burn_in: 5,
        prior_update_interval: 10,
        holdout_fraction: 0.2,
        ..Config::default()
    };
    let diagnostics = search::search_k(&dtm, &documents, &config).unwrap();

    let ks: Vec<usize> = diagnostics.iter().map(|d| d.k).collect();
    assert_eq!(ks, vec![8, 4, 6]);
    for d in &diagnostics {
        assert!(d.heldout_log_likelihood.is_finite());
        assert!(d.semantic_coherence.is_finite());
        assert!(d.lower_bound.is_finite());
        assert!(d.residual_dispersion.is_finite());
    }
}
