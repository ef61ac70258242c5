//! CompoundSim Runner — scenarios, recomputation sessions, export.
//!
//! This crate builds on `compoundsim-core` to provide:
//! - TOML scenario files resolved into validated parameters
//! - A session that memoizes snapshots by parameter fingerprint and discards
//!   computations superseded by newer parameters
//! - JSON, CSV and Markdown artifact export

pub mod cache;
pub mod config;
pub mod export;
pub mod session;

pub use cache::SnapshotCache;
pub use config::{AccountConfig, ConfigError, GrowthConfig, ScenarioConfig};
pub use export::{
    format_metric, generate_report, import_snapshot_json, load_artifacts, projection_csv,
    representative_curves_csv, runs_csv, snapshot_json, write_artifacts,
};
pub use session::{Session, SessionError, Snapshot, Ticket, SCHEMA_VERSION};
