mod batch;
mod error;
mod input;
mod labels;
mod parser;
mod schema;
mod settings;
mod table;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use batch::{BatchPlan, Job};
use input::{RawRecord, SourceTexts};
use labels::ClassifierLabelMap;
use schema::Task;
use settings::Settings;

#[derive(Parser)]
#[command(name = "llm_output_parser", about = "Recover structured records from LLM annotation output")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one results file into one CSV table
    Parse {
        /// appearance, gbv-generative or gbv-classifier
        task: Task,
        /// JSONL results file
        #[arg(short, long)]
        input: PathBuf,
        /// Output CSV (default: <output_dir>/<input stem>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Model tag; selects the label table for classifier results
        #[arg(short, long)]
        model: Option<String>,
        /// Original comments (.json map or .csv)
        #[arg(short, long)]
        comments: Option<PathBuf>,
        /// Label map JSON (default: built-in tables)
        #[arg(long)]
        label_map: Option<PathBuf>,
    },
    /// Parse every configured model's results for one task and dataset
    Batch {
        task: Task,
        /// Dataset name used in result file names (e.g. "Tweets")
        #[arg(short, long)]
        dataset: String,
        /// Comma-separated model tags (default: configured models)
        #[arg(short, long, value_delimiter = ',')]
        models: Vec<String>,
        #[arg(long)]
        results_dir: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Original comments (.json map or .csv)
        #[arg(short, long)]
        comments: Option<PathBuf>,
        #[arg(long)]
        label_map: Option<PathBuf>,
        /// Records per parallel chunk
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Show every recovery stage for a single raw output (reads stdin if TEXT is omitted)
    Inspect {
        task: Task,
        text: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Parse {
            task,
            input,
            output,
            model,
            comments,
            label_map,
        } => {
            if task == Task::GbvClassifier && model.is_none() {
                bail!("classifier results need --model to pick a label table");
            }
            let output = output.unwrap_or_else(|| default_output(&settings.output_dir, &input));
            let sources = load_sources(comments.as_deref(), &settings)?;
            let labels = load_labels(task, label_map.or(settings.label_map.clone()))?;
            let job = Job {
                task,
                model_tag: model.as_deref().unwrap_or_default(),
                sources: &sources,
                labels: &labels,
                chunk_size: settings.chunk_size,
            };

            let counts = batch::run_file(&job, &input, &output)?;
            println!("Wrote {}", output.display());
            counts.print();
            Ok(())
        }
        Commands::Batch {
            task,
            dataset,
            models,
            results_dir,
            output_dir,
            comments,
            label_map,
            chunk_size,
        } => {
            let models = if models.is_empty() { settings.models.clone() } else { models };
            let results_dir = results_dir.unwrap_or_else(|| settings.results_dir.clone());
            let output_dir = output_dir.unwrap_or_else(|| settings.output_dir.clone());
            let sources = load_sources(comments.as_deref(), &settings)?;
            let labels = load_labels(task, label_map.or(settings.label_map.clone()))?;

            println!("Parsing {} results for {} model(s) on {}...", task, models.len(), dataset);
            let plan = BatchPlan {
                task,
                dataset: &dataset,
                results_dir: &results_dir,
                output_dir: &output_dir,
                sources: &sources,
                labels: &labels,
                chunk_size: chunk_size.unwrap_or(settings.chunk_size),
            };
            let (total, failures) = batch::run_models(&plan, &models);

            println!("\nAll models:");
            total.print();
            if failures.is_empty() {
                Ok(())
            } else {
                for f in &failures {
                    println!("  FAILED {}: {:#}", f.model_tag, f.error);
                }
                Err(anyhow::anyhow!("{} of {} model(s) failed", failures.len(), models.len()))
            }
        }
        Commands::Inspect { task, text } => inspect(task, text),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Trace one raw output through block extraction, repair, loading and normalization.
fn inspect(task: Task, text: Option<String>) -> anyhow::Result<()> {
    if task == Task::GbvClassifier {
        bail!("classifier output is a label code; there is nothing to inspect");
    }
    let raw_text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };

    let candidate = parser::block::candidate(&raw_text);
    let complete = !parser::block::extract(&raw_text).is_empty();
    let (outcome, tier) = parser::loader::load_with_tier(candidate);

    println!("--- candidate ({}) ---", if complete { "complete" } else { "salvaged tail" });
    println!("{}", candidate);
    println!("--- repaired ---");
    println!("{}", parser::repair::repair(candidate));
    println!("--- load: {:?} (structured: {}) ---", tier, outcome.is_structured());

    let raw = RawRecord {
        source_id: String::new(),
        model_tag: String::new(),
        raw_text,
    };
    let schema = task.schema();
    let recovered = parser::process_record(&raw, "", schema);
    println!("--- row via {:?} ---", recovered.path);
    for spec in schema.fields {
        if let Some(value) = recovered.record.get(spec.column) {
            println!("{:<26} {}", spec.column, table::render_value(value));
        }
    }
    Ok(())
}

fn load_sources(path: Option<&Path>, settings: &Settings) -> anyhow::Result<SourceTexts> {
    match path {
        Some(path) => {
            let sources = SourceTexts::load(path, &settings.id_column, &settings.text_column)?;
            info!(path = %path.display(), texts = sources.len(), "loaded source texts");
            Ok(sources)
        }
        None => {
            warn!("no --comments given; the comment column will be empty");
            Ok(SourceTexts::default())
        }
    }
}

fn load_labels(task: Task, path: Option<PathBuf>) -> anyhow::Result<ClassifierLabelMap> {
    if task != Task::GbvClassifier {
        return Ok(ClassifierLabelMap::default());
    }
    match path {
        Some(path) => {
            let labels = ClassifierLabelMap::from_json_file(&path)?;
            info!(path = %path.display(), models = ?labels.model_tags(), "loaded label map");
            Ok(labels)
        }
        None => Ok(ClassifierLabelMap::builtin()),
    }
}

fn default_output(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "parsed".to_string());
    output_dir.join(format!("{}.csv", stem))
}

/// Sub-minute runs keep a decimal; longer ones drop to whole units.
fn format_duration(d: std::time::Duration) -> String {
    let total = d.as_secs();
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{:.1}s", d.as_secs_f64()),
        (0, _) => format!("{}m {}s", minutes, seconds),
        _ => format!("{}h {}m {}s", hours, minutes, seconds),
    }
}

// ── Tests ──
