//! Paper Diff library
//!
//! Version diffing for notes: a background diff worker, an LRU result cache and
//! reconstruction of change sequences into unified lines and side-by-side rows.

pub mod cache;
pub mod config;
pub mod constant;
pub mod content;
pub mod diff;
pub mod lru;
pub mod orchestrator;
pub mod worker;

pub use cache::{CacheStats, DiffCache, cache_key};
pub use config::{Config, DegradedPolicy, Settings};
pub use content::{ContentError, ContentProvider, MemoryContentProvider};
pub use diff::{
    Change, DiffLineData, DiffLineType, DiffMode, ReconstructionMemo, SideBySideRowData,
    process_line_changes, process_side_by_side_changes,
};
pub use orchestrator::{DiffError, DiffOrchestrator};
pub use worker::{DiffWorkerManager, WorkerError, WorkerState};
