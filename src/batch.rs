use std::ops::AddAssign;
use std::path::Path;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::input::{read_jsonl, JsonlBatch, RawClassification, RawRecord, SourceTexts};
use crate::labels::ClassifierLabelMap;
use crate::parser::{self, RecoveryPath};
use crate::schema::Task;
use crate::table::{self, OutputTable};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchCounts {
    pub rows: usize,
    pub structured: usize,
    pub fallback: usize,
    /// Classifier rows, mapped from a label code rather than parsed.
    pub labelled: usize,
    pub undetermined: usize,
    pub skipped: usize,
}

impl BatchCounts {
    pub fn print(&self) {
        println!(
            "Wrote {} rows ({} structured, {} via fallback, {} from labels, {} undetermined, {} input lines skipped).",
            self.rows, self.structured, self.fallback, self.labelled, self.undetermined, self.skipped,
        );
    }
}

impl AddAssign for BatchCounts {
    fn add_assign(&mut self, other: Self) {
        self.rows += other.rows;
        self.structured += other.structured;
        self.fallback += other.fallback;
        self.labelled += other.labelled;
        self.undetermined += other.undetermined;
        self.skipped += other.skipped;
    }
}

/// Everything one output table needs. Shared read-only by every worker.
pub struct Job<'a> {
    pub task: Task,
    pub model_tag: &'a str,
    pub sources: &'a SourceTexts,
    pub labels: &'a ClassifierLabelMap,
    pub chunk_size: usize,
}

/// Parse one results file into one freshly truncated table.
pub fn run_file(job: &Job<'_>, input: &Path, output: &Path) -> Result<BatchCounts> {
    let schema = job.task.schema();
    info!(input = %input.display(), output = %output.display(), task = %schema.task, model = job.model_tag, "parsing");

    let counts = match job.task {
        Task::Appearance | Task::GbvGenerative => {
            let batch: JsonlBatch<RawRecord> = read_jsonl(input)?;
            if let Some(found) = batch
                .records
                .iter()
                .map(|r| r.model_tag.as_str())
                .find(|tag| !tag.is_empty() && !job.model_tag.is_empty() && *tag != job.model_tag)
            {
                warn!(expected = job.model_tag, found, "results file holds another model's output");
            }
            let mut table = OutputTable::create(output, schema)?;
            let mut counts = run_generative(job, &batch.records, &mut table)?;
            table.into_inner()?;
            counts.skipped = batch.skipped;
            counts
        }
        Task::GbvClassifier => {
            let batch: JsonlBatch<RawClassification> = read_jsonl(input)?;
            let mut table = OutputTable::create(output, schema)?;
            let mut counts = run_classifier(job, &batch.records, &mut table)?;
            table.into_inner()?;
            counts.skipped = batch.skipped;
            counts
        }
    };

    info!(
        rows = counts.rows,
        structured = counts.structured,
        fallback = counts.fallback,
        labelled = counts.labelled,
        undetermined = counts.undetermined,
        skipped = counts.skipped,
        "finished {}",
        output.display()
    );
    Ok(counts)
}

/// Chunks are recovered in parallel and appended in input order by this thread alone.
pub fn run_generative<W: std::io::Write>(
    job: &Job<'_>,
    records: &[RawRecord],
    table: &mut OutputTable<W>,
) -> Result<BatchCounts> {
    let schema = job.task.schema();
    let pb = progress_bar(records.len());
    let mut counts = BatchCounts::default();

    for chunk in records.chunks(job.chunk_size.max(1)) {
        let recovered: Vec<_> = chunk
            .par_iter()
            .map(|raw| parser::process_record(raw, job.sources.get(&raw.source_id), schema))
            .collect();

        for r in &recovered {
            debug!(id = %r.record.id, path = ?r.path, "recovered");
            match r.path {
                RecoveryPath::Structured => counts.structured += 1,
                RecoveryPath::Fallback => counts.fallback += 1,
            }
            if r.record.flag().is_none() {
                counts.undetermined += 1;
            }
        }
        table.append_all(recovered.iter().map(|r| &r.record))?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    counts.rows = table.rows();
    Ok(counts)
}

pub fn run_classifier<W: std::io::Write>(
    job: &Job<'_>,
    records: &[RawClassification],
    table: &mut OutputTable<W>,
) -> Result<BatchCounts> {
    if !job.labels.has_model(job.model_tag) {
        warn!(
            model = job.model_tag,
            known = ?job.labels.model_tags(),
            "no label map for model; every row will be unknown"
        );
    }

    let schema = job.task.schema();
    let pb = progress_bar(records.len());
    let mut counts = BatchCounts::default();

    for chunk in records.chunks(job.chunk_size.max(1)) {
        let rows: Vec<_> = chunk
            .par_iter()
            .map(|raw| {
                parser::process_classification(
                    raw,
                    job.model_tag,
                    job.sources.get(&raw.source_id),
                    job.labels,
                    schema,
                )
            })
            .collect();

        counts.labelled += rows.len();
        counts.undetermined += rows.iter().filter(|r| r.flag().is_none()).count();
        table.append_all(&rows)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    counts.rows = table.rows();
    Ok(counts)
}

pub struct ModelFailure {
    pub model_tag: String,
    pub error: anyhow::Error,
}

/// Where one task/dataset's results live and where its tables go.
pub struct BatchPlan<'a> {
    pub task: Task,
    pub dataset: &'a str,
    pub results_dir: &'a Path,
    pub output_dir: &'a Path,
    pub sources: &'a SourceTexts,
    pub labels: &'a ClassifierLabelMap,
    pub chunk_size: usize,
}

/// Run every model's results for one task/dataset. A failing model is logged
/// and skipped; the rest still run.
pub fn run_models(plan: &BatchPlan<'_>, models: &[String]) -> (BatchCounts, Vec<ModelFailure>) {
    let mut total = BatchCounts::default();
    let mut failures = Vec::new();

    for model_tag in models {
        let job = Job {
            task: plan.task,
            model_tag,
            sources: plan.sources,
            labels: plan.labels,
            chunk_size: plan.chunk_size,
        };
        let input = table::results_path(plan.results_dir, model_tag, plan.task, plan.dataset);
        let output = table::output_path(plan.output_dir, model_tag, plan.task, plan.dataset);

        match run_file(&job, &input, &output) {
            Ok(counts) => {
                println!("{}: {}", model_tag, output.display());
                counts.print();
                total += counts;
            }
            Err(e) => {
                error!(model = %model_tag, error = %format!("{:#}", e), "model failed, continuing");
                failures.push(ModelFailure {
                    model_tag: model_tag.clone(),
                    error: e,
                });
            }
        }
    }

    (total, failures)
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

// ── Tests ──
