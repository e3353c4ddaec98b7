use crate::index::IndexStats;
use crate::models::Collection;
use std::time::Duration;

/// References that resolved to id 0 during a stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnresolvedCounts {
    pub countries: u64,
    pub features: u64,
    pub timezones: u64,
    pub admins: u64,
}

impl UnresolvedCounts {
    pub fn total(&self) -> u64 {
        self.countries + self.features + self.timezones + self.admins
    }
}

/// Counters for one pipeline stage
#[derive(Debug, Clone)]
pub struct StageStats {
    pub collection: Collection,
    pub records_read: u64,
    pub documents_emitted: u64,
    /// Records that produced no document (country placeholders, nameless places)
    pub records_skipped: u64,
    pub batches: u64,
    pub unresolved: UnresolvedCounts,
    pub duration: Duration,
}

impl StageStats {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            records_read: 0,
            documents_emitted: 0,
            records_skipped: 0,
            batches: 0,
            unresolved: UnresolvedCounts::default(),
            duration: Duration::ZERO,
        }
    }

    pub fn add_read(&mut self, count: u64) {
        self.records_read += count;
    }

    pub fn inc_skipped(&mut self) {
        self.records_skipped += 1;
    }

    pub fn add_batch(&mut self, size: usize) {
        self.batches += 1;
        self.documents_emitted += size as u64;
    }
}

/// Stats of a whole run, in stage order
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub stages: Vec<StageStats>,
    /// Lookup table sizes at the end of the run
    pub index: IndexStats,
}

impl RunReport {
    pub fn stage(&self, collection: Collection) -> Option<&StageStats> {
        self.stages.iter().find(|s| s.collection == collection)
    }

    pub fn documents(&self) -> u64 {
        self.stages.iter().map(|s| s.documents_emitted).sum()
    }

    pub fn unresolved(&self) -> u64 {
        self.stages.iter().map(|s| s.unresolved.total()).sum()
    }

    pub fn duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }
}
