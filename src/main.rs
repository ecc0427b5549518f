use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use samplescope::session::BrowserSession;
use samplescope::similarity::Metric;
use samplescope::table::{FeatureTable, SampleRecord};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "samplescope", version, about = "Sample library browser core")]
struct Cli {
    /// Path to the dataset CSV
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show dataset statistics (rows, feature columns)
    Stats,

    /// List samples whose stem matches a case-insensitive regex
    Filter {
        /// Pattern, substring semantics ("kick" matches "BigKick")
        pattern: String,
    },

    /// Rank samples by similarity to a reference sample
    Similar {
        /// Stem of the reference sample
        reference: String,

        /// Feature columns to compare on
        #[arg(long, value_delimiter = ',', required = true)]
        features: Vec<String>,

        /// Distance metric
        #[arg(long, default_value = "euclidean")]
        metric: Metric,

        /// Restrict to stems matching this pattern first
        #[arg(long)]
        filter: Option<String>,

        /// Number of rows to print
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Resolve a plot coordinate to the nearest sample
    Nearest {
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,

        /// X axis feature column (default from config)
        #[arg(long)]
        x_col: Option<String>,

        /// Y axis feature column (default from config)
        #[arg(long)]
        y_col: Option<String>,

        /// Restrict to stems matching this pattern first
        #[arg(long)]
        filter: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = samplescope::config::AppConfig::load();

    // Resolve dataset path: CLI > config > default
    let dataset = cli
        .dataset
        .or(config.dataset.clone())
        .unwrap_or_else(samplescope::config::default_dataset_path);
    log::info!("Dataset: {}", dataset.display());

    let table = FeatureTable::load(&dataset)
        .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;
    let mut session = BrowserSession::new(table);

    match cli.command {
        Commands::Stats => {
            println!("Samples:  {}", session.table().len());
            println!("Features: {}", session.table().feature_columns().len());
            for col in session.table().feature_columns() {
                println!("  {col}");
            }
        }

        Commands::Filter { pattern } => {
            let outcome = session
                .set_filter(&pattern)
                .context("Filter not applied")?;
            for row in session.rows() {
                println!("{}", row.stem);
            }
            println!("{} files found", outcome.matched);
        }

        Commands::Similar {
            reference,
            features,
            metric,
            filter,
            limit,
        } => {
            if let Some(pattern) = &filter {
                session.set_filter(pattern).context("Filter not applied")?;
            }
            session
                .set_reference(&reference)
                .context("Unknown reference sample")?;
            session
                .compute_similarity(&features, metric)
                .context("Similarity ranking failed")?;

            println!(
                "Nearest to '{}' by {} over [{}]:",
                reference,
                metric,
                features.join(", ")
            );
            print_ranked(&session, limit);
        }

        Commands::Nearest {
            x,
            y,
            x_col,
            y_col,
            filter,
        } => {
            if let Some(pattern) = &filter {
                session.set_filter(pattern).context("Filter not applied")?;
            }
            let x_col = x_col.unwrap_or_else(|| config.x_axis.clone());
            let y_col = y_col.unwrap_or_else(|| config.y_axis.clone());
            session
                .set_axes(&x_col, &y_col)
                .context("Invalid axis columns")?;

            let record = session
                .pick_nearest(x, y)
                .context("Nothing to plot for these axes")?;
            println!("{}", record.stem);
            println!(
                "{}",
                samplescope::paths::sample_path(&config.samples_root, record).display()
            );
        }
    }

    Ok(())
}

/// Print the ranked view as a fixed-width table.
fn print_ranked(session: &BrowserSession, limit: usize) {
    println!("{:<40} {:>12}", "Stem", "Distance");
    println!("{}", "-".repeat(53));

    for row in session.rows().take(limit) {
        println!("{:<40} {}", clip(&row.stem, 40), format_distance(row));
    }
}

fn format_distance(row: &SampleRecord) -> String {
    match row.distance {
        Some(d) => format!("{d:>12.4}"),
        None => format!("{:>12}", "-"),
    }
}

fn clip(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    // Back off to a char boundary so multi-byte stems can't split
    let mut cut = max - 3;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}
