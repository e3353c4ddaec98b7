//! Geodump: GeoNames dump resolution and bulk load pipeline
//!
//! This crate turns the tab-delimited GeoNames reference dumps into
//! cross-referenced, denormalized documents ready for bulk loading:
//!
//! 1. **Fetch** (optional) -- Download every dump in parallel and unpack the zipped ones
//! 2. **Lookup stages** -- Timezones, feature codes, countries and admin divisions are
//!    parsed in that order; each key receives a compact surrogate id
//! 3. **Terminal stages** -- Postal codes and places resolve their country, feature,
//!    timezone and admin references against the lookups built so far
//! 4. **Load** -- Documents are handed to a sink in fixed-size batches (JSON lines
//!    files for `mongoimport`, or Neo4j over Bolt)
//!
//! # Invariants
//!
//! - Stage order is fixed: a reference can only resolve against a stage that already ran
//! - Surrogate ids are 1-based and follow file order; 0 always means "unresolved"
//! - Unresolved references are not errors; they are emitted as 0 and counted
//! - Admin resolution tries `country.admin1.admin2` before `country.admin1`, never the reverse
//! - A malformed row or a rejected batch aborts the whole run
//!
//! # Key Modules
//!
//! - [`parser`] -- Line decoder and streaming dump reader
//! - [`models`] -- Typed records and their field parsers
//! - [`names`] -- Title-casing and name reconciliation
//! - [`index`] -- Code-to-surrogate-id lookup tables
//! - [`document`] -- Sink-bound documents and reference resolution
//! - [`pipeline`] -- Stage orchestration and batching
//! - [`sink`] -- Sink contract, JSON lines and in-memory sinks
//! - [`import`] -- Neo4j sink
//! - [`fetch`] -- Parallel dump download
//! - [`stats`] -- Per-stage counters
//! - [`config`] -- Defaults and pipeline configuration
//!
//! # Example Usage
//!
//! ```bash
//! # Download the dumps
//! geodump fetch -o dumps/
//!
//! # Resolve and write JSON lines, one file per collection
//! geodump load -i dumps/ -o out/
//!
//! # Resolve and load straight into Neo4j
//! geodump load -i dumps/ --neo4j --clean
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod import;
pub mod index;
pub mod models;
pub mod names;
pub mod parser;
pub mod pipeline;
pub mod sink;
pub mod stats;

pub use error::PipelineError;
pub use pipeline::{DumpFiles, Pipeline};
