// Colored terminal output for diagnostics, topics, and score summaries.
//
// This module handles all terminal-specific formatting; main.rs delegates
// here after each stage.

use colored::Colorize;

use crate::dtm::Vocabulary;
use crate::sentiment::lexicon::Category;
use crate::sentiment::scorer::ScoreRecord;
use crate::sentiment::GroupKey;
use crate::topics::model::TopicModel;
use crate::topics::search::KDiagnostics;

/// Display the K-search diagnostics table. The choice of K is the
/// analyst's; this just lays the evidence out.
pub fn display_diagnostics(diagnostics: &[KDiagnostics]) {
    println!("\n{}", "=== Topic count diagnostics ===".bold());
    println!();
    println!(
        "  {:>4}  {:>14}  {:>12}  {:>12}  {:>12}",
        "K".dimmed(),
        "Held-out LL".dimmed(),
        "Coherence".dimmed(),
        "Bound".dimmed(),
        "Dispersion".dimmed(),
    );
    println!("  {}", "-".repeat(62).dimmed());

    for d in diagnostics {
        println!(
            "  {:>4}  {:>14.4}  {:>12.4}  {:>12.4}  {:>12.4}",
            d.k, d.heldout_log_likelihood, d.semantic_coherence, d.lower_bound,
            d.residual_dispersion,
        );
    }
    println!();
    println!(
        "  {}",
        "Prefer a held-out likelihood peak with acceptable coherence.".dimmed()
    );
}

/// Display each topic's corpus share and top terms as a bar list.
pub fn display_topics(model: &TopicModel, vocab: &Vocabulary, top_n: usize) {
    println!(
        "\n{}",
        format!("=== Fitted topics (K = {}) ===", model.k).bold()
    );
    println!();

    let n_docs = model.doc_topic.len().max(1) as f64;
    let shares: Vec<f64> = (0..model.k)
        .map(|t| model.doc_topic.iter().map(|row| row[t]).sum::<f64>() / n_docs)
        .collect();
    let top_terms = model.top_terms(vocab, top_n);

    let bar_width: usize = 20;
    for (topic, (share, terms)) in shares.iter().zip(&top_terms).enumerate() {
        let filled = (share * bar_width as f64).round() as usize;
        let bar = format!(
            "[{}{}]",
            "=".repeat(filled.min(bar_width)),
            " ".repeat(bar_width.saturating_sub(filled))
        );
        let colored_bar = if *share >= 0.25 {
            bar.bright_green()
        } else if *share >= 0.10 {
            bar.bright_yellow()
        } else {
            bar.bright_blue()
        };

        println!("  {:>3}. {} {:.3}", topic, colored_bar, share);
        let terms_str = terms
            .iter()
            .map(|(t, _)| t.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!("       {}", terms_str.dimmed());
    }
}

/// Display an aggregated score table, one bucket per row.
pub fn display_bucket_scores(title: &str, buckets: &[(GroupKey, ScoreRecord)]) {
    println!("\n{}", format!("=== {title} ===").bold());
    println!();

    print!("  {:<18}", "bucket".dimmed());
    for category in Category::ALL {
        print!(" {:>9}", category.label().dimmed());
    }
    println!();
    println!("  {}", "-".repeat(18 + 10 * Category::ALL.len()).dimmed());

    for (key, record) in buckets {
        print!("  {:<18}", key.label());
        for category in Category::ALL {
            let value = record.get(category);
            if value.is_finite() {
                print!(" {value:>9.3}");
            } else {
                print!(" {:>9}", "NA".dimmed());
            }
        }
        println!();
    }
}
