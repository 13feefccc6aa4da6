use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repeci::config::Settings;
use repeci::construct::{Database, PersistenceMode};
use repeci::discover::discover;
use repeci::graph::GraphAssembler;
use repeci::import::{CorpusImporter, ImportReport};
use repeci::interface::ParallelImporter;
use repeci::metrics::{MetricsEngine, alpha_range};
use repeci::refs::{CitationEdgeBuilder, RefsReport};
use repeci::Result;

/// Ingests ReDIF paper records and citations, and computes citation graph metrics
#[derive(Parser, Debug)]
#[command(name = "repeci")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file, instead of an optional repeci.toml in the working directory
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the configured one
    #[arg(long, short, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import every record file found below a directory
    Import {
        root: PathBuf,
        /// Stop after this many files (0 imports all)
        #[arg(long)]
        limit: Option<usize>,
        /// Number of worker threads
        #[arg(long, short)]
        workers: Option<usize>,
        /// Extension of the record files
        #[arg(long)]
        extension: Option<String>,
    },
    /// Link papers through a reference feed
    Refs {
        feed: PathBuf,
        /// Stop after this many lines (0 reads all)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print degree, PageRank, closeness and betweenness per paper
    Metrics {
        #[arg(long, short, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Only the papers with the highest PageRank
        #[arg(long)]
        top: Option<usize>,
    },
    /// Print PageRank for a range of damping factors
    Sensitivity {
        #[arg(long, default_value_t = 0.5)]
        from: f64,
        #[arg(long, default_value_t = 0.95)]
        to: f64,
        #[arg(long, default_value_t = 0.05)]
        step: f64,
        #[arg(long, short, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Csv,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| String::from("repeci=info")),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "repeci failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(path) = cli.database {
        settings.database.path = Some(path);
    }
    let mode = settings.database.mode();
    if mode == PersistenceMode::InMemory {
        tracing::warn!("no database file configured, nothing will outlive this run");
    }
    let db = Database::new(mode)?;

    match cli.command {
        Command::Import {
            root,
            limit,
            workers,
            extension,
        } => {
            let mut import = settings.import;
            if let Some(workers) = workers {
                import.workers = workers;
            }
            if let Some(extension) = extension {
                import.extension = extension;
            }
            let limit = limit.unwrap_or(import.limit);
            let files = discover(&root, &import.extension)?;
            let report = if import.workers > 1 {
                ParallelImporter::new(Arc::new(db), import).import_all(files, limit)?
            } else {
                CorpusImporter::with_settings(&db, &import).import_all(&files, limit)?
            };
            print_import(&report);
        }
        Command::Refs { feed, limit } => {
            let report = CitationEdgeBuilder::new(&db)
                .with_separator(settings.refs.separator)
                .import_refs_file(&feed, limit.unwrap_or(settings.refs.limit))?;
            print_refs(&report);
        }
        Command::Metrics { format, top } => {
            let graph = GraphAssembler::new(&db)
                .include_isolated(settings.metrics.include_isolated)
                .build_graph()?;
            let mut table = MetricsEngine::new(settings.metrics.page_rank()).compute_metrics(&graph)?;
            if let Some(top) = top {
                table = table.top(top);
            }
            match format {
                Format::Json => println!("{}", to_json(&table)?),
                Format::Csv => print!("{}", table.to_csv()),
            }
        }
        Command::Sensitivity {
            from,
            to,
            step,
            format,
        } => {
            let graph = GraphAssembler::new(&db)
                .include_isolated(settings.metrics.include_isolated)
                .build_graph()?;
            let alphas = alpha_range(from, to, step)?;
            let table = MetricsEngine::new(settings.metrics.page_rank())
                .page_rank_sensitivity(&graph, &alphas)?;
            match format {
                Format::Json => println!("{}", to_json(&table)?),
                Format::Csv => print!("{}", table.to_csv()),
            }
        }
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn print_import(report: &ImportReport) {
    println!("files processed:  {}", report.files_processed);
    println!("files skipped:    {}", report.files_skipped.len());
    println!("papers committed: {}", report.papers_committed);
    println!("records skipped:  {}", report.records_skipped);
    println!("records rejected: {}", report.rejected.len());
    for (kind, count) in report.rejections_by_kind() {
        println!("  {kind}: {count}");
    }
    println!("storage failures: {}", report.storage_failures);
}

fn print_refs(report: &RefsReport) {
    println!("lines processed:    {}", report.lines_processed);
    println!("edges created:      {}", report.edges_created);
    println!("edges existing:     {}", report.edges_existing);
    println!("self loops dropped: {}", report.self_loops_dropped);
    println!("duplicates dropped: {}", report.duplicates_dropped);
    println!("malformed lines:    {}", report.malformed.len());
    println!("storage failures:   {}", report.storage_failures);
}
