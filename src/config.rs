/// Documents per `insert_batch` call
pub const DEFAULT_BATCH_SIZE: usize = 125_000;

/// All-uppercase postal names longer than this many characters are title-cased (0 disables)
pub const DEFAULT_TITLE_THRESHOLD: usize = 1;

/// Progress update interval (tick every N records)
pub const PROGRESS_INTERVAL: u64 = 10_000;

/// Base URL the dump files are fetched from
pub const DEFAULT_BASE_URL: &str = "http://download.geonames.org/export/";

/// Default Neo4j Bolt URI
pub const DEFAULT_BOLT_URI: &str = "bolt://localhost:7687";

/// Connection attempts before giving up on Neo4j
pub const IMPORT_MAX_RETRIES: u32 = 10;

/// Delay between Neo4j connection attempts
pub const IMPORT_RETRY_DELAY_SECS: u64 = 3;

/// One downloadable dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpSource {
    /// Local file name inside the download directory
    pub file: &'static str,
    /// Path relative to the base URL
    pub url: &'static str,
    /// Archive entry holding the data, for zipped dumps
    pub entry: Option<&'static str>,
}

const fn plain(file: &'static str, url: &'static str) -> DumpSource {
    DumpSource { file, url, entry: None }
}

const fn zipped(file: &'static str, url: &'static str, entry: &'static str) -> DumpSource {
    DumpSource {
        file,
        url,
        entry: Some(entry),
    }
}

/// Both `allCountries.zip` archives name their entry `allCountries.txt`.
pub const DUMP_SOURCES: &[DumpSource] = &[
    plain("admin1CodesASCII.txt", "dump/admin1CodesASCII.txt"),
    plain("admin2Codes.txt", "dump/admin2Codes.txt"),
    zipped("allCountries.txt", "dump/allCountries.zip", "allCountries.txt"),
    plain("countryInfo.txt", "dump/countryInfo.txt"),
    plain("featureCodes_en.txt", "dump/featureCodes_en.txt"),
    zipped("hierarchy.txt", "dump/hierarchy.zip", "hierarchy.txt"),
    plain("iso-languagecodes.txt", "dump/iso-languagecodes.txt"),
    plain("timeZones.txt", "dump/timeZones.txt"),
    zipped("zip_allCountries.txt", "zip/allCountries.zip", "allCountries.txt"),
];

/// Knobs consumed by the resolution pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub title_threshold: usize,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            title_threshold: DEFAULT_TITLE_THRESHOLD,
            show_progress: false,
        }
    }
}
