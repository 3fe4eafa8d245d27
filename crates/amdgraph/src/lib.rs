//! AMD dependency graph builder
//!
//! This crate indexes the named AMD modules of a source tree and plans
//! script bundles from them:
//! - Module registry with alias resolution (`define("id", [deps], ...)`)
//! - Transitive dependency closures and dependency-ordered file lists
//! - Per-entry bundles plus a shared bundle for widely used files
//! - Parse snapshots persisted between runs (.cache.json)
//! - Build configuration (amdgraph.toml)
//! - Build runs that validate configuration before scanning

pub mod config;
pub mod define;
pub mod emit;
pub mod logging;
pub mod pipeline;
pub mod planner;
pub mod registry;
pub mod resolver;
pub mod scan;
pub mod snapshot;

pub use config::{BuildConfig, ConfigError};
pub use define::DefineParser;
pub use emit::{write_bundles, CommandCompressor, CompressError, Compressor, EmitError, EmitReport};
pub use pipeline::{BuildRun, EntryRequest, RunError};
pub use planner::{
    extract_shared_bundle, score_files, BundleMap, BundlePlanner, EntryFileMap, EntrySelector,
    PlanError, PlanOutcome, Planner, PlannerOptions,
};
pub use registry::{
    AliasTable, FileEntry, Module, ModuleRecord, ModuleRecords, ModuleRegistry, ReservedNames,
    ResolveError, Resolver,
};
pub use resolver::{ClosureComputer, Context, DependencyResolver};
pub use scan::{content_hash, ModuleParser, ParseError, ScanError, ScanReport, Scanner};
pub use snapshot::{ParseSnapshot, SnapshotError, SNAPSHOT_VERSION};
