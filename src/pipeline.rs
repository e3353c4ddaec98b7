//! Ordered resolution pipeline.
//!
//! Stages run strictly in [`STAGES`] order. Each stage streams one dump (two for
//! admin divisions), registers its keys in the [`GeoIndex`] and hands documents
//! to the sink in fixed-size batches before the next stage starts. Terminal
//! stages (postal codes, places) only read the index; anything not registered by
//! then resolves to 0.

use crate::config::{PipelineConfig, PROGRESS_INTERVAL};
use crate::document::{self, CountryDoc, Document};
use crate::error::{MissingFields, PipelineError};
use crate::index::GeoIndex;
use crate::models::{AdminRec, Collection, CountryRec, FeatureRec, PlaceRec, PostalRec, TimezoneRec};
use crate::parser::DumpReader;
use crate::sink::DocumentSink;
use crate::stats::{RunReport, StageStats};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Locations of the raw dump files.
#[derive(Debug, Clone)]
pub struct DumpFiles {
    pub dir: PathBuf,
    pub admin1: String,
    pub admin2: String,
    pub countries: String,
    pub features: String,
    pub hierarchy: String,
    pub languages: String,
    pub places: String,
    pub postal: String,
    pub timezones: String,
}

impl DumpFiles {
    /// Standard GeoNames file names inside `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            admin1: "admin1CodesASCII.txt".to_string(),
            admin2: "admin2Codes.txt".to_string(),
            countries: "countryInfo.txt".to_string(),
            features: "featureCodes_en.txt".to_string(),
            hierarchy: "hierarchy.txt".to_string(),
            languages: "iso-languagecodes.txt".to_string(),
            places: "allCountries.txt".to_string(),
            postal: "zip_allCountries.txt".to_string(),
            timezones: "timeZones.txt".to_string(),
        }
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Every path a pipeline stage reads, in stage order.
    /// The hierarchy and language dumps are fetched but not staged.
    pub fn all_paths(&self) -> Vec<PathBuf> {
        [
            &self.timezones,
            &self.features,
            &self.countries,
            &self.admin1,
            &self.admin2,
            &self.postal,
            &self.places,
        ]
        .into_iter()
        .map(|name| self.path(name))
        .collect()
    }
}

/// Everything one run owns: configuration and the lookup tables built so far.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub index: GeoIndex,
}

type StageFn = fn(&mut StageContext<'_>) -> Result<(), PipelineError>;

struct StageDescriptor {
    collection: Collection,
    run: StageFn,
}

/// The single valid stage order. Each entry only reads lookups filled by earlier ones.
const STAGES: &[StageDescriptor] = &[
    StageDescriptor {
        collection: Collection::Timezones,
        run: load_timezones,
    },
    StageDescriptor {
        collection: Collection::Features,
        run: load_features,
    },
    StageDescriptor {
        collection: Collection::Countries,
        run: load_countries,
    },
    StageDescriptor {
        collection: Collection::Admins,
        run: load_admins,
    },
    StageDescriptor {
        collection: Collection::Postals,
        run: load_postals,
    },
    StageDescriptor {
        collection: Collection::Places,
        run: load_places,
    },
];

/// Collections in the order the pipeline emits them
pub fn stage_order() -> Vec<Collection> {
    STAGES.iter().map(|s| s.collection).collect()
}

pub struct Pipeline {
    files: DumpFiles,
    context: PipelineContext,
}

impl Pipeline {
    pub fn new(files: DumpFiles, config: PipelineConfig) -> Self {
        Self {
            files,
            context: PipelineContext {
                config,
                index: GeoIndex::new(),
            },
        }
    }

    /// Runs every stage in order, stopping at the first failure.
    ///
    /// Batches already handed to the sink by a failing stage are not rolled back.
    pub fn run(mut self, sink: &mut dyn DocumentSink) -> Result<RunReport, PipelineError> {
        let mut report = STAGES.iter().try_fold(RunReport::default(), |mut report, stage| {
            let stats = self.run_stage(stage, sink)?;
            report.stages.push(stats);
            Ok::<_, PipelineError>(report)
        })?;
        report.index = self.context.index.stats();

        info!(
            documents = report.documents(),
            unresolved = report.unresolved(),
            duration_secs = report.duration().as_secs_f64(),
            "Pipeline complete"
        );
        Ok(report)
    }

    fn run_stage(
        &mut self,
        stage: &StageDescriptor,
        sink: &mut dyn DocumentSink,
    ) -> Result<StageStats, PipelineError> {
        let start = Instant::now();
        info!(collection = %stage.collection, "Starting stage");

        let progress = make_spinner(stage.collection, self.context.config.show_progress);
        let mut cx = StageContext {
            files: &self.files,
            config: &self.context.config,
            index: &mut self.context.index,
            out: BatchWriter::new(sink, stage.collection, self.context.config.batch_size),
            progress,
        };
        let result = (stage.run)(&mut cx);

        let StageContext { out, progress, .. } = cx;
        let mut stats = close_stage(result, out, &progress)?;
        stats.duration = start.elapsed();

        info!(
            collection = %stats.collection,
            records = stats.records_read,
            documents = stats.documents_emitted,
            skipped = stats.records_skipped,
            batches = stats.batches,
            duration_secs = stats.duration.as_secs_f64(),
            "Stage complete"
        );
        if stats.unresolved.total() > 0 {
            warn!(
                collection = %stats.collection,
                countries = stats.unresolved.countries,
                features = stats.unresolved.features,
                timezones = stats.unresolved.timezones,
                admins = stats.unresolved.admins,
                "Unresolved references emitted as id 0"
            );
        }
        Ok(stats)
    }
}

/// Flushes the stage's tail batch on success; the spinner is cleared either way.
fn close_stage(
    result: Result<(), PipelineError>,
    out: BatchWriter<'_>,
    progress: &ProgressBar,
) -> Result<StageStats, PipelineError> {
    let stats = result.and_then(|()| out.finish());
    progress.finish_and_clear();
    stats
}

fn make_spinner(collection: Collection, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} {pos} records ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(collection.name());
    pb
}

/// Buffers documents and forwards them to the sink in batches of at most `batch_size`.
pub struct BatchWriter<'a> {
    sink: &'a mut dyn DocumentSink,
    batch_size: usize,
    buffer: Vec<Document>,
    stats: StageStats,
}

impl<'a> BatchWriter<'a> {
    pub fn new(sink: &'a mut dyn DocumentSink, collection: Collection, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            batch_size,
            buffer: Vec::with_capacity(batch_size.min(1 << 16)),
            stats: StageStats::new(collection),
        }
    }

    pub fn push(&mut self, doc: Document) -> Result<(), PipelineError> {
        self.buffer.push(doc);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PipelineError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let collection = self.stats.collection;
        let batch = self.stats.batches as usize + 1;
        self.sink
            .insert_batch(collection, &self.buffer)
            .map_err(|source| PipelineError::SinkWrite {
                collection,
                batch,
                source,
            })?;
        debug!(collection = %collection, batch, size = self.buffer.len(), "Batch written");
        self.stats.add_batch(self.buffer.len());
        self.buffer.clear();
        Ok(())
    }

    /// Flushes the tail batch and closes the collection on the sink.
    pub fn finish(mut self) -> Result<StageStats, PipelineError> {
        self.flush()?;
        let collection = self.stats.collection;
        self.sink
            .finish_collection(collection)
            .map_err(|source| PipelineError::SinkWrite {
                collection,
                batch: self.stats.batches as usize,
                source,
            })?;
        Ok(self.stats)
    }

    pub fn stats_mut(&mut self) -> &mut StageStats {
        &mut self.stats
    }
}

struct StageContext<'a> {
    files: &'a DumpFiles,
    config: &'a PipelineConfig,
    index: &'a mut GeoIndex,
    out: BatchWriter<'a>,
    progress: ProgressBar,
}

/// Streams `path` through the decoder and `parse`, in file order.
/// Returns the number of records visited.
fn read_records<R>(
    path: &Path,
    collection: Collection,
    skip_header: bool,
    parse: fn(&[String]) -> Result<R, MissingFields>,
    progress: &ProgressBar,
    mut on_record: impl FnMut(R) -> Result<(), PipelineError>,
) -> Result<u64, PipelineError> {
    let io_err = |source| PipelineError::Io {
        collection,
        path: path.to_path_buf(),
        source,
    };

    debug!(path = ?path, "Reading dump");
    let reader = DumpReader::open(path, skip_header).map_err(io_err)?;
    let mut count = 0u64;
    for decoded in reader {
        let decoded = decoded.map_err(io_err)?;
        let rec = parse(&decoded.fields).map_err(|e| PipelineError::MalformedRecord {
            collection,
            path: path.to_path_buf(),
            line: decoded.line,
            expected: e.expected,
            found: e.found,
        })?;
        on_record(rec)?;
        count += 1;
        if count % PROGRESS_INTERVAL == 0 {
            progress.set_position(count);
        }
    }
    Ok(count)
}

fn load_timezones(cx: &mut StageContext<'_>) -> Result<(), PipelineError> {
    let path = cx.files.path(&cx.files.timezones);
    let mut id = 0u32;
    let read = read_records(&path, Collection::Timezones, true, TimezoneRec::from_fields, &cx.progress, |rec| {
        id += 1;
        cx.index.register_timezone(&rec.name, id);
        cx.out.push(document::timezone_doc(id, rec).into())
    })?;
    cx.out.stats_mut().add_read(read);
    Ok(())
}

fn load_features(cx: &mut StageContext<'_>) -> Result<(), PipelineError> {
    let path = cx.files.path(&cx.files.features);
    let mut id = 0u32;
    let read = read_records(&path, Collection::Features, false, FeatureRec::from_fields, &cx.progress, |rec| {
        id += 1;
        cx.index.register_feature(&rec.code, id);
        cx.out.push(document::feature_doc(id, rec).into())
    })?;
    cx.out.stats_mut().add_read(read);
    Ok(())
}

fn load_countries(cx: &mut StageContext<'_>) -> Result<(), PipelineError> {
    let path = cx.files.path(&cx.files.countries);
    let mut docs: Vec<CountryDoc> = Vec::new();
    let read = read_records(&path, Collection::Countries, false, CountryRec::from_fields, &cx.progress, |rec| {
        let id = docs.len() as u32 + 1;
        cx.index.register_country(&rec.iso2, id);
        docs.push(document::country_doc(id, rec));
        Ok(())
    })?;
    cx.out.stats_mut().add_read(read);

    // Neighbours can point forward in the file, so resolve only once all are registered.
    for mut doc in docs {
        doc.resolve_neighbors(cx.index, &mut cx.out.stats_mut().unresolved);
        cx.out.push(doc.into())?;
    }
    Ok(())
}

fn load_admins(cx: &mut StageContext<'_>) -> Result<(), PipelineError> {
    let files = cx.files;
    for file_name in [&files.admin1, &files.admin2] {
        let path = files.path(file_name);
        let read = read_records(&path, Collection::Admins, false, AdminRec::from_fields, &cx.progress, |rec: AdminRec| {
            if rec.split_code().is_none() {
                cx.out.stats_mut().inc_skipped();
                return Ok(());
            }
            cx.index.register_admin(&rec.code, rec.id);
            let doc = document::admin_doc(rec, cx.index, &mut cx.out.stats_mut().unresolved);
            match doc {
                Some(doc) => cx.out.push(doc.into()),
                None => Ok(()),
            }
        })?;
        cx.out.stats_mut().add_read(read);
    }
    Ok(())
}

fn load_postals(cx: &mut StageContext<'_>) -> Result<(), PipelineError> {
    let path = cx.files.path(&cx.files.postal);
    let threshold = cx.config.title_threshold;
    let mut id = 0u64;
    let read = read_records(&path, Collection::Postals, false, PostalRec::from_fields, &cx.progress, |rec| {
        id += 1;
        let doc = document::postal_doc(id, rec, cx.index, threshold, &mut cx.out.stats_mut().unresolved);
        cx.out.push(doc.into())
    })?;
    cx.out.stats_mut().add_read(read);
    Ok(())
}

fn load_places(cx: &mut StageContext<'_>) -> Result<(), PipelineError> {
    let path = cx.files.path(&cx.files.places);
    let read = read_records(&path, Collection::Places, false, PlaceRec::from_fields, &cx.progress, |rec| {
        let doc = document::place_doc(rec, cx.index, &mut cx.out.stats_mut().unresolved);
        match doc {
            Some(doc) => cx.out.push(doc.into()),
            None => {
                cx.out.stats_mut().inc_skipped();
                Ok(())
            }
        }
    })?;
    cx.out.stats_mut().add_read(read);
    Ok(())
}
