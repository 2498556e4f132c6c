//! Diff computation and line reconstruction.
//!
//! `compute` produces raw change sequences; `lines` and `side_by_side` shape them
//! into unified lines and paired rows for rendering. Everything here is pure and
//! synchronous.

pub mod compute;
pub mod lines;
pub mod memo;
pub mod side_by_side;
pub mod stats;
pub mod types;

pub use compute::{compute_changes, decode_changes, encode_changes};
pub use lines::{
    LineError, process_line_changes, process_line_changes_with_context, split_parts_to_lines,
};
pub use memo::{ReconstructionMemo, fingerprint};
pub use side_by_side::process_side_by_side_changes;
pub use stats::{DiffStats, calculate_stats, has_meaningful_changes};
pub use types::{
    Change, ChangeSide, DiffLineData, DiffLineSegment, DiffLineType, DiffMode, SegmentType,
    SideBySideRowData, UnknownDiffMode,
};
