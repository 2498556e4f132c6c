/// Application name and metadata constants
pub const APP_NAME: &str = "Paper Diff";

/// Diff cache and worker defaults
pub const DEFAULT_CACHE_CAPACITY: usize = 50;
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 3;
pub const DEFAULT_ERROR_RESET_TIME_MS: u64 = 60_000;
pub const DEFAULT_WORKER_QUEUE_CAPACITY: usize = 16;

/// Lines of unchanged context kept on each side of a collapsed hunk
pub const CONTEXT_SIZE: usize = 3;

/// Reconstruction memo size (per layout)
pub const MEMO_CAPACITY: usize = 32;
