use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use refract::config::Config;
use refract::corpus::document;
use refract::output::{artifacts::ArtifactWriter, terminal};
use refract::pipeline;
use refract::sentiment::aggregate::{
    self, keys_by_date, keys_by_dominant_topic, keys_by_organisation,
};
use refract::sentiment::lexicon::Lexicon;

/// Refract: topic and sentiment analytics for organisational blog corpora.
///
/// Cleans a blog-article table, fits a covariate-conditioned topic model,
/// trains word embeddings, and derives lexicon- and embedding-based
/// sentiment scores for downstream reporting.
#[derive(Parser)]
#[command(name = "refract", version, about)]
struct Cli {
    /// Path to a JSON configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the model-selection search over candidate topic counts
    Search {
        /// CSV document table {organisation, title, date, text}
        input: PathBuf,

        /// Comma-separated candidate K list (overrides the config)
        #[arg(long)]
        candidates: Option<String>,

        /// Directory to write k_diagnostics.csv into
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Fit the topic model at a fixed K and write its artifacts
    Fit {
        /// CSV document table {organisation, title, date, text}
        input: PathBuf,

        /// Topic count (overrides the config)
        #[arg(long)]
        k: Option<usize>,

        /// Output directory for artifacts
        #[arg(long, default_value = "artifacts")]
        out: PathBuf,
    },

    /// Train word embeddings and write the embedding table
    Embed {
        /// CSV document table {organisation, title, date, text}
        input: PathBuf,

        /// Output directory for artifacts
        #[arg(long, default_value = "artifacts")]
        out: PathBuf,

        /// Print the nearest terms to this one after training
        #[arg(long)]
        probe: Option<String>,
    },

    /// Score documents with the lexicon and embedding paths
    Score {
        /// CSV document table {organisation, title, date, text}
        input: PathBuf,

        /// NRC-format lexicon TSV (built-in default when omitted)
        #[arg(long)]
        lexicon: Option<PathBuf>,

        /// Output directory for artifacts
        #[arg(long, default_value = "artifacts")]
        out: PathBuf,
    },

    /// Run the full pipeline: normalize, fit, embed, score, write artifacts
    Run {
        /// CSV document table {organisation, title, date, text}
        input: PathBuf,

        /// Optional CSV event timeline {date, event}
        #[arg(long)]
        events: Option<PathBuf>,

        /// NRC-format lexicon TSV (built-in default when omitted)
        #[arg(long)]
        lexicon: Option<PathBuf>,

        /// Output directory for artifacts
        #[arg(long, default_value = "artifacts")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("refract=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    config.validate().context("validating configuration")?;

    match cli.command {
        Commands::Search {
            input,
            candidates,
            out,
        } => {
            if let Some(list) = candidates {
                config.candidate_k = list
                    .split(',')
                    .map(|s| s.trim().parse::<usize>())
                    .collect::<std::result::Result<_, _>>()
                    .context("parsing --candidates")?;
            }

            let documents = document::read_documents(&input)?;
            let prepared = pipeline::prepare(&documents, &config)?;
            let diagnostics = pipeline::search_topics(&prepared, &config)?;

            terminal::display_diagnostics(&diagnostics);
            if let Some(dir) = out {
                let writer = ArtifactWriter::new(&dir)?;
                writer.write_diagnostics(&diagnostics)?;
                writer.finish();
            }
        }

        Commands::Fit { input, k, out } => {
            if let Some(k) = k {
                config.k = k;
            }

            let documents = document::read_documents(&input)?;
            let prepared = pipeline::prepare(&documents, &config)?;
            let model = pipeline::fit_topics(&prepared, &config, config.k)?;

            terminal::display_topics(&model, &prepared.vocab, 8);

            let writer = ArtifactWriter::new(&out)?;
            writer.write_config(&config)?;
            writer.write_vocabulary(&prepared.vocab)?;
            writer.write_dtm(&prepared.counts, "dtm_counts")?;
            writer.write_doc_topics(&model, &prepared.corpus.documents)?;
            writer.write_top_terms(&model, &prepared.vocab, 10)?;
            writer.finish();
        }

        Commands::Embed { input, out, probe } => {
            let documents = document::read_documents(&input)?;
            let prepared = pipeline::prepare(&documents, &config)?;
            let (embeddings, _) = pipeline::train_embeddings(&prepared, &config)?;

            println!(
                "Trained {} vectors of dimension {}.",
                embeddings.len(),
                embeddings.dim()
            );
            if let Some(term) = probe {
                match embeddings.nearest(&term, 10) {
                    Ok(nearest) => {
                        println!("\n{}", format!("Nearest terms to '{term}':").bold());
                        for (neighbour, similarity) in nearest {
                            println!("  {neighbour:<24} {similarity:.3}");
                        }
                    }
                    Err(e) => println!("{} {e}", "!".yellow()),
                }
            }

            let writer = ArtifactWriter::new(&out)?;
            writer.write_embeddings(&embeddings)?;
            writer.finish();
        }

        Commands::Score {
            input,
            lexicon,
            out,
        } => {
            let documents = document::read_documents(&input)?;
            let lexicon = load_lexicon(lexicon.as_deref(), config.stem)?;
            let prepared = pipeline::prepare(&documents, &config)?;
            let model = pipeline::fit_topics(&prepared, &config, config.k)?;
            let (embeddings, doc_embeddings) =
                pipeline::train_embeddings(&prepared, &config)?;
            let scores =
                pipeline::score_documents(&prepared, &lexicon, &embeddings, &doc_embeddings);

            let by_org = aggregate::aggregate(
                &scores.lexicon,
                &keys_by_organisation(&prepared.corpus.documents),
            );
            terminal::display_bucket_scores("Lexicon scores by organisation", &by_org);
            let by_topic =
                aggregate::aggregate(&scores.embedding, &keys_by_dominant_topic(&model));
            terminal::display_bucket_scores("Embedding scores by dominant topic", &by_topic);

            let writer = ArtifactWriter::new(&out)?;
            let labels: Vec<String> = prepared
                .corpus
                .documents
                .iter()
                .map(|d| format!("doc {}", d.id))
                .collect();
            writer.write_scores("scores_lexicon_doc", &labels, &scores.lexicon)?;
            writer.write_scores("scores_embedding_doc", &labels, &scores.embedding)?;
            writer.write_bucket_scores("scores_lexicon_by_organisation", &by_org)?;
            writer.write_bucket_scores("scores_embedding_by_topic", &by_topic)?;
            writer.write_bucket_scores(
                "scores_lexicon_by_date",
                &aggregate::aggregate(
                    &scores.lexicon,
                    &keys_by_date(&prepared.corpus.documents),
                ),
            )?;
            writer.finish();
        }

        Commands::Run {
            input,
            events,
            lexicon,
            out,
        } => {
            let documents = document::read_documents(&input)?;
            let events = match events {
                Some(path) => document::read_events(&path)?,
                None => Vec::new(),
            };
            let lexicon = load_lexicon(lexicon.as_deref(), config.stem)?;

            pipeline::run_full(&documents, &events, &lexicon, &config, &out)?;
            println!(
                "Pipeline complete. Artifacts written to {}",
                out.display().to_string().bold()
            );
        }
    }

    Ok(())
}

/// Load the NRC lexicon from a TSV path, or fall back to the built-in
/// default. Member terms are stemmed when the normalizer stems, so lookups
/// match the processed vocabulary.
fn load_lexicon(path: Option<&std::path::Path>, stem: bool) -> Result<Lexicon> {
    let lexicon = match path {
        Some(p) => {
            info!(path = %p.display(), "Using external lexicon");
            Lexicon::from_nrc_tsv(p)?
        }
        None => Lexicon::builtin(),
    };
    Ok(if stem { lexicon.stemmed() } else { lexicon })
}
