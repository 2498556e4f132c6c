//! Public entry point: cache first, then the background diff worker.

use crate::cache::{CacheStats, DiffCache, cache_key, note_prefix};
use crate::config::{DegradedPolicy, Settings};
use crate::content::{ContentError, ContentProvider};
use crate::diff::{Change, DiffMode, decode_changes};
use crate::worker::{
    DiffEngine, DiffProxy, DiffRequest, DiffResponse, DiffWorkerManager, TaskLoader,
    WorkerError, WorkerHealthStats, WorkerState, WorkerTask, diff_engine_loader,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum DiffError {
    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("Failed to decode worker output: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Content(#[from] ContentError),
}

impl DiffError {
    pub fn code(&self) -> &'static str {
        match self {
            DiffError::Worker(e) => e.code(),
            DiffError::Decode(_) => "DIFF_DECODE_FAILED",
            DiffError::Content(_) => "CONTENT_UNAVAILABLE",
        }
    }
}

/// Coordinates the diff cache and the diff worker.
///
/// Safe to share between threads. Neither lock is held while a diff is being
/// computed, so concurrent misses on one key may both compute; the last store wins.
pub struct DiffOrchestrator<T = DiffEngine>
where
    T: WorkerTask<Request = DiffRequest, Response = DiffResponse>,
{
    cache: Mutex<DiffCache>,
    manager: Mutex<DiffWorkerManager<T>>,
    loader: TaskLoader<T>,
    settings: Settings,
}

impl DiffOrchestrator<DiffEngine> {
    pub fn new(settings: &Settings) -> Self {
        Self::with_loader(diff_engine_loader(), settings)
    }
}

impl<T> DiffOrchestrator<T>
where
    T: WorkerTask<Request = DiffRequest, Response = DiffResponse>,
{
    pub fn with_loader(loader: TaskLoader<T>, settings: &Settings) -> Self {
        Self {
            cache: Mutex::new(DiffCache::new(settings.cache_capacity)),
            manager: Mutex::new(DiffWorkerManager::with_loader(
                Arc::clone(&loader),
                settings,
            )),
            loader,
            settings: settings.clone(),
        }
    }

    /// Diff two versions of a note, serving repeated requests from the cache
    pub fn generate_diff(
        &self,
        note_id: &str,
        version_a: &str,
        version_b: &str,
        content_a: &str,
        content_b: &str,
        mode: DiffMode,
    ) -> Result<Arc<Vec<Change>>, DiffError> {
        let key = cache_key(note_id, version_a, version_b, mode);
        if let Some(changes) = self.cached(&key) {
            return Ok(changes);
        }
        self.compute_and_store(key, mode, content_a, content_b)
    }

    /// Recompute regardless of the cache and overwrite this mode's entry
    pub fn compute_diff_only(
        &self,
        mode: DiffMode,
        note_id: &str,
        version_a: &str,
        version_b: &str,
        content_a: &str,
        content_b: &str,
    ) -> Result<Arc<Vec<Change>>, DiffError> {
        let key = cache_key(note_id, version_a, version_b, mode);
        self.compute_and_store(key, mode, content_a, content_b)
    }

    /// Like `generate_diff`, but only loads version text when the cache misses
    pub fn generate_diff_for_versions(
        &self,
        provider: &dyn ContentProvider,
        note_id: &str,
        version_a: &str,
        version_b: &str,
        mode: DiffMode,
    ) -> Result<Arc<Vec<Change>>, DiffError> {
        let key = cache_key(note_id, version_a, version_b, mode);
        if let Some(changes) = self.cached(&key) {
            return Ok(changes);
        }

        let content_a = provider.load(note_id, version_a)?;
        let content_b = provider.load(note_id, version_b)?;
        self.compute_and_store(key, mode, &content_a, &content_b)
    }

    /// Drop every cached diff belonging to `note_id`
    pub fn invalidate_note(&self, note_id: &str) -> usize {
        let removed = self.lock_cache().invalidate_prefix(&note_prefix(note_id));
        debug!("Invalidated {} cached diffs for note {}", removed, note_id);
        removed
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.lock_manager().state()
    }

    pub fn health_stats(&self) -> WorkerHealthStats {
        self.lock_manager().health_stats()
    }

    /// Terminate the worker. Later diff requests fail; cached results stay readable.
    pub fn shutdown(&self) {
        self.lock_manager().terminate();
    }

    fn cached(&self, key: &str) -> Option<Arc<Vec<Change>>> {
        let hit = self.lock_cache().get(key);
        match hit {
            Some(changes) => {
                debug!("Diff cache hit: {}", key);
                Some(changes)
            }
            None => {
                debug!("Diff cache miss: {}", key);
                None
            }
        }
    }

    fn compute_and_store(
        &self,
        key: String,
        mode: DiffMode,
        content_a: &str,
        content_b: &str,
    ) -> Result<Arc<Vec<Change>>, DiffError> {
        let proxy = self.acquire_proxy()?;
        let bytes = proxy.compute_diff(mode, content_a, content_b)?;
        let changes = match decode_changes(&bytes) {
            Ok(changes) => Arc::new(changes),
            Err(e) => {
                warn!("Diff worker returned undecodable output: {}", e);
                proxy.record_error();
                return Err(e.into());
            }
        };

        self.lock_cache().set(key, Arc::clone(&changes));
        Ok(changes)
    }

    /// Initialize the worker on first use and apply the degraded policy. The
    /// manager lock is released before the caller talks to the worker, and before
    /// a recycled worker is joined.
    fn acquire_proxy(&self) -> Result<DiffProxy<T>, DiffError> {
        let mut manager = self.lock_manager();

        if manager.state() == WorkerState::Uninitialized {
            manager.initialize()?;
        }

        if manager.state() == WorkerState::Degraded {
            let errors = manager.health_stats().consecutive_errors;
            match self.settings.degraded_policy {
                DegradedPolicy::KeepUsing => {
                    debug!("Using degraded diff worker ({} consecutive errors)", errors);
                }
                DegradedPolicy::FailFast => {
                    warn!("Refusing to use degraded diff worker");
                    return Err(WorkerError::Degraded(errors).into());
                }
                DegradedPolicy::Recycle => {
                    info!("Recycling degraded diff worker");
                    let fresh =
                        DiffWorkerManager::with_loader(Arc::clone(&self.loader), &self.settings);
                    let mut retired = std::mem::replace(&mut *manager, fresh);
                    let proxy = manager.initialize().and_then(|()| manager.ensure_worker());
                    drop(manager);

                    // waits for requests already queued on the old worker
                    retired.terminate();
                    return Ok(proxy?);
                }
            }
        }

        Ok(manager.ensure_worker()?)
    }

    fn lock_cache(&self) -> MutexGuard<'_, DiffCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_manager(&self) -> MutexGuard<'_, DiffWorkerManager<T>> {
        self.manager.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
