// Unit tests for the text normalizer: boilerplate dropping, drop
// propagation, and rebuild determinism.

use chrono::NaiveDate;

use refract::config::Config;
use refract::corpus::document::Document;
use refract::corpus::normalize::Normalizer;
use refract::dtm::{DocTermMatrix, Vocabulary};

fn doc(id: usize, text: &str) -> Document {
    Document {
        id,
        organisation: "RedCross".to_string(),
        title: format!("post {id}"),
        date: NaiveDate::from_ymd_opt(2019, 3, 10).unwrap(),
        day_of_year: 69,
        text: text.to_string(),
    }
}

// ============================================================
// Boilerplate-only documents
// ============================================================

#[test]
fn disclaimer_only_document_is_removed_from_corpus() {
    let config = Config {
        boilerplate_patterns: vec!["Disclaimer.*All rights reserved".to_string()],
        remove_stopwords: false,
        stem: false,
        ..Config::default()
    };
    let normalizer = Normalizer::new(&config).unwrap();

    let docs = vec![
        doc(0, "Disclaimer this content is provided as is All rights reserved"),
        doc(1, "Volunteers delivered food parcels across the region"),
        doc(2, "New shelter opened for displaced families"),
    ];
    let corpus = normalizer.normalize_corpus(&docs);

    // Document set count decreases by exactly 1.
    assert_eq!(corpus.documents.len(), 2);
    assert_eq!(corpus.dropped, vec![0]);
}

#[test]
fn dropped_document_is_absent_from_every_downstream_structure() {
    let config = Config {
        boilerplate_patterns: vec!["Disclaimer.*reserved".to_string()],
        remove_stopwords: false,
        stem: false,
        min_doc_frequency: 1,
        ..Config::default()
    };
    let normalizer = Normalizer::new(&config).unwrap();

    let docs = vec![
        doc(0, "shelter camp water"),
        doc(1, "Disclaimer all of this is boilerplate reserved"),
        doc(2, "shelter relief convoy"),
    ];
    let corpus = normalizer.normalize_corpus(&docs);
    let vocab = Vocabulary::build(&corpus.terms, 1);
    let dtm = DocTermMatrix::from_terms(&corpus.terms, &vocab);

    // Two rows, aligned with the two surviving documents; no trace of the
    // boilerplate text in the vocabulary.
    assert_eq!(dtm.n_rows(), 2);
    assert_eq!(corpus.documents[0].id, 0);
    assert_eq!(corpus.documents[1].id, 2);
    assert!(vocab.get("disclaimer").is_none());
    assert!(vocab.get("boilerplate").is_none());
}

// ============================================================
// Idempotence
// ============================================================

#[test]
fn normalizer_and_dtm_rebuild_bit_identical() {
    let config = Config {
        min_doc_frequency: 1,
        ..Config::default()
    };

    let docs = vec![
        doc(0, "Asylum seekers waited at the border crossing for days."),
        doc(1, "The flood relief operation reached remote villages."),
        doc(2, "Asylum applications rose sharply after the border closed."),
    ];

    let run = |docs: &[Document]| {
        let normalizer = Normalizer::new(&config).unwrap();
        let corpus = normalizer.normalize_corpus(docs);
        let vocab = Vocabulary::build(&corpus.terms, config.min_doc_frequency);
        let dtm = DocTermMatrix::from_terms(&corpus.terms, &vocab);
        (corpus, vocab, dtm)
    };

    let (corpus_a, vocab_a, dtm_a) = run(&docs);
    let (corpus_b, vocab_b, dtm_b) = run(&docs);

    assert_eq!(corpus_a.tokens, corpus_b.tokens);
    assert_eq!(vocab_a.terms(), vocab_b.terms());
    assert_eq!(dtm_a.n_rows(), dtm_b.n_rows());
    for d in 0..dtm_a.n_rows() {
        assert_eq!(dtm_a.row(d), dtm_b.row(d));
    }
}

// ============================================================
// Step toggles
// ============================================================

#[test]
fn disabled_steps_leave_text_alone() {
    let config = Config {
        lowercase: false,
        strip_urls: false,
        strip_punctuation: false,
        strip_numbers: false,
        remove_stopwords: false,
        stem: false,
        ..Config::default()
    };
    let normalizer = Normalizer::new(&config).unwrap();
    let tokens = normalizer.tokenize("The Camp42 shelters");
    assert_eq!(tokens, vec!["The", "Camp42", "shelters"]);
}

#[test]
fn ngram_max_one_emits_no_bigrams() {
    let config = Config {
        ngram_max: 1,
        remove_stopwords: false,
        stem: false,
        ..Config::default()
    };
    let normalizer = Normalizer::new(&config).unwrap();
    let corpus = normalizer.normalize_corpus(&[doc(0, "border camp shelter")]);
    assert_eq!(corpus.terms[0].len(), 3);
    assert!(corpus.terms[0].iter().all(|t| !t.contains(' ')));
}

#[test]
fn token_stream_and_term_set_stay_aligned() {
    let config = Config {
        remove_stopwords: false,
        stem: false,
        ..Config::default()
    };
    let normalizer = Normalizer::new(&config).unwrap();
    let corpus = normalizer.normalize_corpus(&[doc(0, "border camp shelter")]);
    // Unigram stream is preserved in order; terms add the bigrams after.
    assert_eq!(corpus.tokens[0], vec!["border", "camp", "shelter"]);
    assert_eq!(
        corpus.terms[0],
        vec!["border", "camp", "shelter", "border camp", "camp shelter"]
    );
}
