//! lfmat - label database maintenance tool
//!
//! Labeling functions are Rust closures, so applying them goes through the
//! library API. This binary covers everything around it: schema setup,
//! inspection, matrix export and label/key cleanup.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lfmat_common::db::{self, init_database};
use lfmat_common::{LabelerConfig, SplitFilter};
use lfmat_labeler::{keys, store, AnnotationKind, Labeler};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lfmat
#[derive(Parser, Debug)]
#[command(name = "lfmat")]
#[command(about = "Inspect and maintain a label database")]
#[command(version)]
struct Args {
    /// Label database file (overrides LFMAT_DATABASE and the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or upgrade the database schema
    Init,

    /// List registered keys
    Keys {
        /// List gold annotators instead of LF keys
        #[arg(long)]
        gold: bool,
    },

    /// Show document, candidate, label and key counts
    Stats,

    /// Export the label matrix of one candidate class as JSON
    Matrix {
        /// Candidate class name
        #[arg(long)]
        class: String,

        /// Split of the candidates to export
        #[arg(long, default_value_t = 0)]
        split: i32,

        /// Export candidates of every split
        #[arg(long, conflicts_with = "split")]
        all_splits: bool,

        /// Export gold labels instead of LF labels
        #[arg(long)]
        gold: bool,

        /// Restrict gold labels to one annotator
        #[arg(long, requires = "gold")]
        annotator: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Delete label keys by name
    DropKeys {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Delete labels of one split
    Clear {
        #[arg(long, default_value_t = 0)]
        split: i32,

        /// Also delete every label key
        #[arg(long)]
        train: bool,
    },

    /// Delete every label and label key
    ClearAll,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lfmat=info,lfmat_labeler=info,lfmat_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config =
        LabelerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let db_path = config.resolve_database_path(args.database.as_deref());
    info!("Database: {}", db_path.display());

    let pool = init_database(&db_path, &config)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match args.command {
        Command::Init => {
            info!("Schema ready (version {})", db::SCHEMA_VERSION);
        }
        Command::Keys { gold } => {
            let kind = if gold {
                AnnotationKind::GoldLabel
            } else {
                AnnotationKind::Label
            };
            for name in keys::list_keys(&pool, kind).await? {
                println!("{}", name);
            }
        }
        Command::Stats => print_stats(&pool).await?,
        Command::Matrix {
            class,
            split,
            all_splits,
            gold,
            annotator,
            out,
        } => {
            let class = Arc::new(
                db::load_candidate_class(&pool, &class)
                    .await
                    .with_context(|| format!("Unknown candidate class {}", class))?,
            );
            let split = if all_splits {
                SplitFilter::All
            } else {
                SplitFilter::Split(split)
            };
            let candidates = db::get_candidates_by_split(&pool, &class, split).await?;

            let labeler = Labeler::with_config(pool.clone(), vec![Arc::clone(&class)], &config);
            let cand_lists = vec![candidates];
            let mut matrices = if gold {
                labeler
                    .get_gold_label_matrices(&cand_lists, annotator.as_deref())
                    .await?
            } else {
                labeler.get_label_matrices(&cand_lists).await?
            };
            let matrix = matrices.pop().context("No matrix produced")?;

            info!(
                class = class.name(),
                split = %split,
                rows = matrix.shape().0,
                cols = matrix.shape().1,
                nnz = matrix.matrix.nnz(),
                "Label matrix materialized"
            );

            let json = serde_json::to_string_pretty(&matrix)?;
            match out {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{}", json),
            }
        }
        Command::DropKeys { names } => {
            let deleted = labeler_for(&pool, &config).await?.drop_keys(names).await?;
            info!("Dropped {} label keys", deleted);
        }
        Command::Clear { split, train } => {
            labeler_for(&pool, &config).await?.clear(train, split).await?;
        }
        Command::ClearAll => {
            labeler_for(&pool, &config).await?.clear_all().await?;
        }
    }

    pool.close().await;
    Ok(())
}

/// Labeler over every candidate class registered in the database
async fn labeler_for(pool: &SqlitePool, config: &LabelerConfig) -> Result<Labeler> {
    let mut classes = Vec::new();
    for name in db::list_candidate_classes(pool).await? {
        classes.push(Arc::new(db::load_candidate_class(pool, &name).await?));
    }
    Ok(Labeler::with_config(pool.clone(), classes, config))
}

async fn print_stats(pool: &SqlitePool) -> Result<()> {
    println!("documents: {}", db::count_documents(pool).await?);
    for (split, count) in db::count_candidates_by_split(pool).await? {
        println!("candidates (split {}): {}", split, count);
    }
    println!("labels: {}", store::count_labels(pool, AnnotationKind::Label).await?);
    println!(
        "label keys: {}",
        keys::list_keys(pool, AnnotationKind::Label).await?.len()
    );
    println!(
        "gold labels: {}",
        store::count_labels(pool, AnnotationKind::GoldLabel).await?
    );
    println!(
        "gold annotators: {}",
        keys::list_keys(pool, AnnotationKind::GoldLabel).await?.len()
    );
    Ok(())
}
