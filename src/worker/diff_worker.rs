use super::WorkerError;
use super::health::WorkerHealthStats;
use super::manager::{TaskLoader, WorkerManager, WorkerProxy, WorkerState, WorkerTask};
use crate::config::Settings;
use crate::diff::{Change, DiffMode, compute_changes, decode_changes, encode_changes};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fixed inputs for the startup self-test
const SELF_TEST_OLD: &str = "hello\nworld\n";
const SELF_TEST_NEW: &str = "hello\nthere\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRequest {
    pub mode: DiffMode,
    pub content1: String,
    pub content2: String,
}

/// UTF-8 JSON encoded `Vec<Change>`, or the payload's own failure message
pub type DiffResponse = Result<Vec<u8>, String>;

/// The default diff payload, backed by `similar`
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

impl WorkerTask for DiffEngine {
    type Request = DiffRequest;
    type Response = DiffResponse;
    const NAME: &'static str = "diff";

    fn handle(&mut self, request: DiffRequest) -> DiffResponse {
        let changes = compute_changes(request.mode, &request.content1, &request.content2);
        encode_changes(&changes).map_err(|e| e.to_string())
    }
}

pub fn diff_engine_loader() -> TaskLoader<DiffEngine> {
    Arc::new(|| Some(DiffEngine))
}

/// Worker manager specialized for diffs: adds the self-test and the typed
/// `compute_diff` surface
pub struct DiffWorkerManager<T = DiffEngine>
where
    T: WorkerTask<Request = DiffRequest, Response = DiffResponse>,
{
    inner: WorkerManager<T>,
}

impl DiffWorkerManager<DiffEngine> {
    pub fn new(settings: &Settings) -> Self {
        Self::with_loader(diff_engine_loader(), settings)
    }
}

impl<T> DiffWorkerManager<T>
where
    T: WorkerTask<Request = DiffRequest, Response = DiffResponse>,
{
    pub fn with_loader(loader: TaskLoader<T>, settings: &Settings) -> Self {
        Self {
            inner: WorkerManager::new(loader, settings),
        }
    }

    /// Start the worker and require the self-test to pass
    pub fn initialize(&mut self) -> Result<(), WorkerError> {
        self.inner.initialize_with(self_test)
    }

    /// Re-run the self-test against the running worker
    pub fn validate_worker(&self) -> Result<(), WorkerError> {
        let proxy = self.inner.ensure_worker()?;
        self_test(&proxy)
    }

    pub fn ensure_worker(&self) -> Result<DiffProxy<T>, WorkerError> {
        Ok(DiffProxy {
            inner: self.inner.ensure_worker()?,
        })
    }

    pub fn compute_diff(
        &self,
        mode: DiffMode,
        content1: &str,
        content2: &str,
    ) -> Result<Vec<u8>, WorkerError> {
        self.ensure_worker()?.compute_diff(mode, content1, content2)
    }

    pub fn state(&self) -> WorkerState {
        self.inner.state()
    }

    pub fn health_stats(&self) -> WorkerHealthStats {
        self.inner.health_stats()
    }

    pub fn terminate(&mut self) {
        self.inner.terminate();
    }
}

/// Typed handle for diff calls; cheap to clone and usable without the manager lock
pub struct DiffProxy<T>
where
    T: WorkerTask<Request = DiffRequest, Response = DiffResponse>,
{
    inner: WorkerProxy<T>,
}

impl<T> Clone for DiffProxy<T>
where
    T: WorkerTask<Request = DiffRequest, Response = DiffResponse>,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for DiffProxy<T>
where
    T: WorkerTask<Request = DiffRequest, Response = DiffResponse>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DiffProxy").field(&self.inner).finish()
    }
}

impl<T> DiffProxy<T>
where
    T: WorkerTask<Request = DiffRequest, Response = DiffResponse>,
{
    /// Count a reply the caller could not use against the worker's health
    pub fn record_error(&self) {
        self.inner.record_error();
    }

    /// Diff two strings on the worker thread, returning the encoded change list
    pub fn compute_diff(
        &self,
        mode: DiffMode,
        content1: &str,
        content2: &str,
    ) -> Result<Vec<u8>, WorkerError> {
        let request = DiffRequest {
            mode,
            content1: content1.to_string(),
            content2: content2.to_string(),
        };

        match self.inner.call(request)? {
            Ok(bytes) => {
                debug!("Diff worker returned {} bytes ({})", bytes.len(), mode);
                Ok(bytes)
            }
            Err(message) => {
                warn!("Diff worker failed: {}", message);
                self.inner.record_error();
                Err(WorkerError::ComputeFailed(message))
            }
        }
    }
}

/// Diff two known-different strings and check the reply decodes to a non-empty
/// change list. Typed errors from the call pass through untouched.
fn self_test<T>(proxy: &WorkerProxy<T>) -> Result<(), WorkerError>
where
    T: WorkerTask<Request = DiffRequest, Response = DiffResponse>,
{
    let response = proxy.call(DiffRequest {
        mode: DiffMode::Lines,
        content1: SELF_TEST_OLD.to_string(),
        content2: SELF_TEST_NEW.to_string(),
    })?;

    let bytes = response.map_err(WorkerError::ValidationFailed)?;
    let changes: Vec<Change> =
        decode_changes(&bytes).map_err(|e| WorkerError::TestFailed(e.to_string()))?;

    if changes.is_empty() {
        return Err(WorkerError::TestFailed(
            "self-test produced no changes".to_string(),
        ));
    }
    Ok(())
}
