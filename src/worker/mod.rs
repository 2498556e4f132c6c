//! Background worker lifecycle.
//!
//! A worker is one owned thread fed through a bounded channel. `WorkerManager`
//! handles spawn, validation and teardown for any `WorkerTask`; `DiffWorkerManager`
//! specializes it for diff computation.

pub mod diff_worker;
pub mod health;
pub mod manager;

pub use diff_worker::{
    DiffEngine, DiffProxy, DiffRequest, DiffResponse, DiffWorkerManager, diff_engine_loader,
};
pub use health::{HealthMonitor, WorkerHealthStats};
pub use manager::{PendingCall, TaskLoader, WorkerManager, WorkerProxy, WorkerState, WorkerTask};

use thiserror::Error;

/// Typed worker failures; `code()` gives the stable identifier callers match on
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Worker payload is unavailable: {0}")]
    CodeMissing(String),

    #[error("Worker initialization failed: {0}")]
    InitFailed(String),

    #[error("Worker is not ready: {0}")]
    ProxyMissing(String),

    #[error("Worker self-test returned malformed data: {0}")]
    TestFailed(String),

    #[error("Worker validation failed: {0}")]
    ValidationFailed(String),

    #[error("Worker call failed: {0}")]
    CallFailed(String),

    #[error("Worker failed to compute diff: {0}")]
    ComputeFailed(String),

    #[error("Worker is degraded after {0} consecutive errors")]
    Degraded(u32),
}

impl WorkerError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkerError::CodeMissing(_) => "WORKER_CODE_MISSING",
            WorkerError::InitFailed(_) => "WORKER_INIT_FAILED",
            WorkerError::ProxyMissing(_) => "WORKER_PROXY_MISSING",
            WorkerError::TestFailed(_) => "WORKER_TEST_FAILED",
            WorkerError::ValidationFailed(_) => "VALIDATION_FAILED",
            WorkerError::CallFailed(_) => "WORKER_CALL_FAILED",
            WorkerError::ComputeFailed(_) => "WORKER_COMPUTE_FAILED",
            WorkerError::Degraded(_) => "WORKER_DEGRADED",
        }
    }

    /// A missing payload will not appear by retrying
    pub fn is_retryable(&self) -> bool {
        !matches!(self, WorkerError::CodeMissing(_))
    }
}
