use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::parser::normalize::{FieldValue, NormalizedRecord};
use crate::schema::{Task, TaskSchema};

/// Written for flags that could not be decided; distinct from `false`.
pub const UNDETERMINED: &str = "undetermined";
const LIST_SEPARATOR: &str = "; ";

pub fn results_path(dir: &Path, model_tag: &str, task: Task, dataset: &str) -> PathBuf {
    dir.join(format!("{}_{}_results_{}.jsonl", model_tag, task.file_tag(), dataset))
}

pub fn output_path(dir: &Path, model_tag: &str, task: Task, dataset: &str) -> PathBuf {
    dir.join(format!("{}_{}_parsed_{}.csv", model_tag, task.file_tag(), dataset))
}

/// Append-only CSV table with the schema's header row.
///
/// Rows are rendered into memory a chunk at a time and reach `inner` in a
/// single `write_all`, so the file only ever grows by whole rows.
pub struct OutputTable<W: Write = File> {
    inner: W,
    rows: usize,
}

impl OutputTable<File> {
    /// Truncates any previous contents: re-runs regenerate, never patch.
    pub fn create(path: &Path, schema: &TaskSchema) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        Self::from_writer(file, schema)
    }
}

impl<W: Write> OutputTable<W> {
    pub fn from_writer(inner: W, schema: &TaskSchema) -> Result<Self> {
        let mut table = OutputTable { inner, rows: 0 };
        let mut chunk = chunk_writer();
        chunk.write_record(schema.header())?;
        table.commit(chunk)?;
        Ok(table)
    }

    /// Append a chunk of rows as one write, then flush.
    pub fn append_all<'a>(&mut self, records: impl IntoIterator<Item = &'a NormalizedRecord>) -> Result<()> {
        let mut chunk = chunk_writer();
        let mut added = 0;
        for record in records {
            chunk.write_record(render_row(record))?;
            added += 1;
        }
        self.commit(chunk)?;
        self.rows += added;
        Ok(())
    }

    fn commit(&mut self, chunk: csv::Writer<Vec<u8>>) -> Result<()> {
        let bytes = chunk
            .into_inner()
            .map_err(|e| anyhow::anyhow!("rendering rows: {}", e.error()))?;
        if !bytes.is_empty() {
            self.inner.write_all(&bytes).context("writing output table")?;
        }
        self.inner.flush().context("flushing output table")?;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush().context("flushing output table")?;
        Ok(self.inner)
    }
}

fn chunk_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new())
}

pub fn render_row(record: &NormalizedRecord) -> Vec<String> {
    let mut row = Vec::with_capacity(record.fields.len() + 2);
    row.push(record.id.clone());
    row.push(record.source_text.clone());
    row.extend(record.fields.iter().map(|(_, v)| render_value(v)));
    row
}

pub fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Flag(Some(true)) => "true".to_string(),
        FieldValue::Flag(Some(false)) => "false".to_string(),
        FieldValue::Flag(None) => UNDETERMINED.to_string(),
        FieldValue::Text(text) => text.clone(),
        FieldValue::List(items) => items.join(LIST_SEPARATOR),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{APPEARANCE, GBV_GENERATIVE};

    fn record() -> NormalizedRecord {
        NormalizedRecord {
            id: "42".into(),
            source_text: "Go back to the kitchen, love".into(),
            fields: vec![
                ("contains_gbv", FieldValue::Flag(None)),
                ("gbv_primary_category", FieldValue::Text("Threats".into())),
                (
                    "gbv_secondary_categories",
                    FieldValue::List(vec!["Pejoratives".into(), "Silencing".into()]),
                ),
                ("target", FieldValue::Text(String::new())),
                ("segments", FieldValue::List(vec!["back to the \"kitchen\"".into()])),
                ("reason", FieldValue::Text("multi\nline".into())),
            ],
        }
    }

    #[test]
    fn values_render_flat() {
        assert_eq!(render_value(&FieldValue::Flag(Some(true))), "true");
        assert_eq!(render_value(&FieldValue::Flag(Some(false))), "false");
        assert_eq!(render_value(&FieldValue::Flag(None)), "undetermined");
        assert_eq!(
            render_value(&FieldValue::List(vec!["a".into(), "b".into()])),
            "a; b"
        );
        assert_eq!(render_value(&FieldValue::List(Vec::new())), "");
    }

    #[test]
    fn header_then_one_row_per_record() {
        let mut table = OutputTable::from_writer(Vec::new(), &GBV_GENERATIVE).unwrap();
        table.append_all([&record(), &record()]).unwrap();
        assert_eq!(table.rows(), 2);
        let bytes = table.into_inner().unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header, GBV_GENERATIVE.header());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "Go back to the kitchen, love");
        assert_eq!(&rows[0][2], "undetermined");
        assert_eq!(&rows[0][4], "Pejoratives; Silencing");
        assert_eq!(&rows[0][6], "back to the \"kitchen\"");
        assert_eq!(&rows[0][7], "multi\nline");
    }

    /// Records where each `write` call ends.
    #[derive(Default)]
    struct WriteLog {
        bytes: Vec<u8>,
        boundaries: Vec<usize>,
    }

    impl Write for WriteLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.bytes.extend_from_slice(buf);
            self.boundaries.push(self.bytes.len());
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_never_end_inside_a_row() {
        let long = NormalizedRecord {
            id: "7".into(),
            source_text: "x".repeat(3000),
            fields: vec![
                ("contains_appearance", FieldValue::Flag(Some(true))),
                ("sub_category", FieldValue::Text("body_features".into())),
                ("appearance_valence", FieldValue::Text("negative".into())),
                ("segments", FieldValue::List(vec!["a, b".into()])),
                ("reason", FieldValue::Text("multi\nline".into())),
            ],
        };
        let mut table = OutputTable::from_writer(WriteLog::default(), &APPEARANCE).unwrap();
        table.append_all(std::iter::repeat(&long).take(10)).unwrap();
        table.append_all(std::iter::repeat(&long).take(3)).unwrap();
        let log = table.into_inner().unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(log.bytes.as_slice());
        let mut row_ends = Vec::new();
        let mut record = csv::StringRecord::new();
        while reader.read_record(&mut record).unwrap() {
            row_ends.push(reader.position().byte() as usize);
        }
        assert_eq!(row_ends.len(), 14);
        assert_eq!(log.boundaries.len(), 3);
        for boundary in &log.boundaries {
            assert!(row_ends.contains(boundary), "write ended mid-row at {boundary}");
        }
    }

    #[test]
    fn create_truncates_stale_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path(), "llama3_8b", Task::GbvGenerative, "Tweets");
        assert!(path.ends_with("llama3_8b_gbv_parsed_Tweets.csv"));

        let mut first = OutputTable::create(&path, &GBV_GENERATIVE).unwrap();
        first.append_all([&record(), &record(), &record()]).unwrap();
        drop(first);

        let second = OutputTable::create(&path, &GBV_GENERATIVE).unwrap();
        drop(second);
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn create_makes_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/parsed/out.csv");
        OutputTable::create(&path, &GBV_GENERATIVE).unwrap();
        assert!(path.exists());
    }
}
