use crate::document::Document;
use crate::models::Collection;
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Destination for emitted document batches.
///
/// The pipeline calls `insert_batch` in record order and `finish_collection`
/// once a stage has emitted its last batch. Any error aborts the run.
pub trait DocumentSink {
    fn insert_batch(&mut self, collection: Collection, docs: &[Document]) -> Result<()>;

    fn finish_collection(&mut self, _collection: Collection) -> Result<()> {
        Ok(())
    }
}

/// Writes one `<collection>.jsonl` file per collection, one document per line.
pub struct JsonLinesSink {
    output_dir: PathBuf,
    writers: FxHashMap<Collection, BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn new(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            writers: FxHashMap::default(),
        })
    }

    pub fn path_for(&self, collection: Collection) -> PathBuf {
        self.output_dir.join(format!("{}.jsonl", collection.name()))
    }

    fn writer(&mut self, collection: Collection) -> Result<&mut BufWriter<File>> {
        if !self.writers.contains_key(&collection) {
            let path = self.path_for(collection);
            let file = File::create(&path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            debug!(path = ?path, "Opened collection file");
            self.writers
                .insert(collection, BufWriter::with_capacity(128 * 1024, file));
        }
        self.writers
            .get_mut(&collection)
            .context("Collection writer missing")
    }
}

impl DocumentSink for JsonLinesSink {
    fn insert_batch(&mut self, collection: Collection, docs: &[Document]) -> Result<()> {
        let writer = self.writer(collection)?;
        for doc in docs {
            serde_json::to_writer(&mut *writer, doc)
                .with_context(|| format!("Failed to serialize {collection} document"))?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn finish_collection(&mut self, collection: Collection) -> Result<()> {
        if let Some(mut writer) = self.writers.remove(&collection) {
            writer
                .flush()
                .with_context(|| format!("Failed to flush {collection} output"))?;
            info!(path = ?self.path_for(collection), "Collection written");
        }
        Ok(())
    }
}

/// Keeps every batch in memory, in arrival order.
#[derive(Default)]
pub struct MemorySink {
    pub batches: Vec<(Collection, Vec<Document>)>,
    pub finished: Vec<Collection>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All documents of one collection, flattened across batches
    pub fn documents(&self, collection: Collection) -> Vec<&Document> {
        self.batches
            .iter()
            .filter(|(c, _)| *c == collection)
            .flat_map(|(_, docs)| docs.iter())
            .collect()
    }

    pub fn batch_sizes(&self, collection: Collection) -> Vec<usize> {
        self.batches
            .iter()
            .filter(|(c, _)| *c == collection)
            .map(|(_, docs)| docs.len())
            .collect()
    }
}

impl DocumentSink for MemorySink {
    fn insert_batch(&mut self, collection: Collection, docs: &[Document]) -> Result<()> {
        self.batches.push((collection, docs.to_vec()));
        Ok(())
    }

    fn finish_collection(&mut self, collection: Collection) -> Result<()> {
        self.finished.push(collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FeatureDoc;
    use tempfile::TempDir;

    fn feature(id: u32, code: &str) -> Document {
        Document::Feature(FeatureDoc {
            id,
            code: code.to_string(),
            name: String::new(),
            desc: String::new(),
        })
    }

    #[test]
    fn json_lines_one_document_per_line() {
        let dir = TempDir::new().unwrap();
        let mut sink = JsonLinesSink::new(dir.path()).unwrap();
        sink.insert_batch(Collection::Features, &[feature(1, "A.ADM1"), feature(2, "P.PPL")])
            .unwrap();
        sink.insert_batch(Collection::Features, &[feature(3, "H.LK")])
            .unwrap();
        sink.finish_collection(Collection::Features).unwrap();

        let content = fs::read_to_string(dir.path().join("features.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], r#"{"_id":1,"c":"A.ADM1"}"#);
        assert_eq!(lines[2], r#"{"_id":3,"c":"H.LK"}"#);
    }

    #[test]
    fn json_lines_uses_collection_names() {
        let dir = TempDir::new().unwrap();
        let sink = JsonLinesSink::new(dir.path()).unwrap();
        assert_eq!(sink.path_for(Collection::Postals), dir.path().join("zips.jsonl"));
    }

    #[test]
    fn json_lines_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested").join("out");
        JsonLinesSink::new(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn finish_without_batches_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut sink = JsonLinesSink::new(dir.path()).unwrap();
        sink.finish_collection(Collection::Places).unwrap();
        assert!(!dir.path().join("places.jsonl").exists());
    }

    #[test]
    fn memory_sink_tracks_batches() {
        let mut sink = MemorySink::new();
        sink.insert_batch(Collection::Features, &[feature(1, "A.ADM1")])
            .unwrap();
        sink.insert_batch(Collection::Features, &[feature(2, "P.PPL"), feature(3, "H.LK")])
            .unwrap();
        sink.finish_collection(Collection::Features).unwrap();

        assert_eq!(sink.batch_sizes(Collection::Features), vec![1, 2]);
        assert_eq!(sink.documents(Collection::Features).len(), 3);
        assert_eq!(sink.finished, vec![Collection::Features]);
    }
}
