use super::WorkerError;
use super::health::{HealthMonitor, WorkerHealthStats};
use crate::config::Settings;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Work executed on the background thread
pub trait WorkerTask: Send + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    /// Used for the thread name and in logs
    const NAME: &'static str;

    fn handle(&mut self, request: Self::Request) -> Self::Response;
}

/// Produces the worker payload; `None` means the payload is not available
pub type TaskLoader<T> = Arc<dyn Fn() -> Option<T> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Uninitialized,
    Initializing,
    Ready,
    Degraded,
    Terminated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Uninitialized => "uninitialized",
            WorkerState::Initializing => "initializing",
            WorkerState::Ready => "ready",
            WorkerState::Degraded => "degraded",
            WorkerState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Messages sent to the worker thread
enum WorkerMessage<Req, Resp> {
    Run { request: Req, reply: Sender<Resp> },
    Stop,
}

type Channel<T> = SyncSender<WorkerMessage<<T as WorkerTask>::Request, <T as WorkerTask>::Response>>;

/// Owns one background thread and the channel endpoints feeding it
pub struct WorkerManager<T: WorkerTask> {
    loader: TaskLoader<T>,
    queue_capacity: usize,
    max_consecutive_errors: u32,
    error_reset_time: Duration,
    state: WorkerState,
    runtime: Option<WorkerRuntime<T>>,
    health: Arc<Mutex<HealthMonitor>>,
}

struct WorkerRuntime<T: WorkerTask> {
    sender: Channel<T>,
    revoked: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<T: WorkerTask> WorkerManager<T> {
    pub fn new(loader: TaskLoader<T>, settings: &Settings) -> Self {
        Self {
            loader,
            queue_capacity: settings.worker_queue_capacity.max(1),
            max_consecutive_errors: settings.max_consecutive_errors,
            error_reset_time: settings.error_reset_time(),
            state: WorkerState::Uninitialized,
            runtime: None,
            health: Arc::new(Mutex::new(HealthMonitor::new(
                settings.max_consecutive_errors,
                settings.error_reset_time(),
            ))),
        }
    }

    /// Current lifecycle state; a ready worker whose health monitor reports
    /// unhealthy shows up as `Degraded`
    pub fn state(&self) -> WorkerState {
        match self.state {
            WorkerState::Ready if !lock_health(&self.health).is_healthy() => WorkerState::Degraded,
            state => state,
        }
    }

    pub fn initialize(&mut self) -> Result<(), WorkerError> {
        self.initialize_with(|_| Ok(()))
    }

    /// Spawn the worker and run `validate` against it before marking it ready.
    ///
    /// Any failure tears the partial worker down and leaves the manager
    /// uninitialized so a later call can retry.
    pub fn initialize_with<F>(&mut self, validate: F) -> Result<(), WorkerError>
    where
        F: FnOnce(&WorkerProxy<T>) -> Result<(), WorkerError>,
    {
        match self.state {
            WorkerState::Initializing | WorkerState::Ready | WorkerState::Degraded => return Ok(()),
            WorkerState::Terminated => {
                return Err(WorkerError::InitFailed(format!(
                    "{} worker has been terminated",
                    T::NAME
                )));
            }
            WorkerState::Uninitialized => {}
        }

        self.state = WorkerState::Initializing;
        info!("Initializing {} worker", T::NAME);

        let runtime = match self.spawn_runtime() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to start {} worker: {}", T::NAME, e);
                self.state = WorkerState::Uninitialized;
                return Err(e);
            }
        };

        self.health = Arc::new(Mutex::new(HealthMonitor::new(
            self.max_consecutive_errors,
            self.error_reset_time,
        )));
        let proxy = runtime.proxy(&self.health);
        self.runtime = Some(runtime);

        if let Err(e) = validate(&proxy) {
            error!("{} worker failed validation: {}", T::NAME, e);
            if let Some(mut runtime) = self.runtime.take() {
                runtime.stop(true);
            }
            self.state = WorkerState::Uninitialized;
            return Err(e);
        }

        self.state = WorkerState::Ready;
        info!("{} worker ready", T::NAME);
        Ok(())
    }

    /// Handle for calling the worker, available only once it is ready
    pub fn ensure_worker(&self) -> Result<WorkerProxy<T>, WorkerError> {
        match (&self.runtime, self.state) {
            (Some(runtime), WorkerState::Ready) => Ok(runtime.proxy(&self.health)),
            _ => Err(WorkerError::ProxyMissing(format!(
                "{} worker is {}",
                T::NAME,
                self.state()
            ))),
        }
    }

    /// Stop the worker for good. Outstanding proxies are revoked.
    pub fn terminate(&mut self) {
        if self.state == WorkerState::Terminated {
            return;
        }
        if let Some(mut runtime) = self.runtime.take() {
            runtime.stop(true);
        }
        self.state = WorkerState::Terminated;
        info!("{} worker terminated", T::NAME);
    }

    pub fn health_stats(&self) -> WorkerHealthStats {
        lock_health(&self.health).stats()
    }

    fn spawn_runtime(&self) -> Result<WorkerRuntime<T>, WorkerError> {
        let task = (self.loader)().ok_or_else(|| {
            WorkerError::CodeMissing(format!("no {} worker payload available", T::NAME))
        })?;

        let (sender, receiver) = mpsc::sync_channel(self.queue_capacity);
        let handle = thread::Builder::new()
            .name(format!("{}-worker", T::NAME))
            .spawn(move || run_worker_loop(task, receiver))
            .map_err(|e| WorkerError::InitFailed(format!("failed to spawn thread: {}", e)))?;

        Ok(WorkerRuntime {
            sender,
            revoked: Arc::new(AtomicBool::new(false)),
            handle: Some(handle),
        })
    }
}

impl<T: WorkerTask> Drop for WorkerManager<T> {
    fn drop(&mut self) {
        // Don't join here; a long computation would block the dropping thread
        if let Some(mut runtime) = self.runtime.take() {
            runtime.stop(false);
        }
    }
}

impl<T: WorkerTask> WorkerRuntime<T> {
    fn proxy(&self, health: &Arc<Mutex<HealthMonitor>>) -> WorkerProxy<T> {
        WorkerProxy {
            sender: self.sender.clone(),
            revoked: Arc::clone(&self.revoked),
            health: Arc::clone(health),
        }
    }

    fn stop(&mut self, join: bool) {
        self.revoked.store(true, Ordering::Release);
        if join {
            let _ = self.sender.send(WorkerMessage::Stop);
            if let Some(handle) = self.handle.take()
                && handle.join().is_err()
            {
                warn!("{} worker thread panicked", T::NAME);
            }
        } else {
            let _ = self.sender.try_send(WorkerMessage::Stop);
        }
    }
}

/// The main loop running on the worker thread
fn run_worker_loop<T: WorkerTask>(
    mut task: T,
    receiver: Receiver<WorkerMessage<T::Request, T::Response>>,
) {
    while let Ok(message) = receiver.recv() {
        match message {
            WorkerMessage::Run { request, reply } => {
                let response = task.handle(request);
                // The caller may have dropped its pending call
                let _ = reply.send(response);
            }
            WorkerMessage::Stop => break,
        }
    }
    debug!("{} worker loop exited", T::NAME);
}

/// Typed call surface to a running worker
pub struct WorkerProxy<T: WorkerTask> {
    sender: Channel<T>,
    revoked: Arc<AtomicBool>,
    health: Arc<Mutex<HealthMonitor>>,
}

impl<T: WorkerTask> Clone for WorkerProxy<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            revoked: Arc::clone(&self.revoked),
            health: Arc::clone(&self.health),
        }
    }
}

impl<T: WorkerTask> fmt::Debug for WorkerProxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerProxy")
            .field("worker", &T::NAME)
            .field("revoked", &self.revoked.load(Ordering::Acquire))
            .finish()
    }
}

impl<T: WorkerTask> WorkerProxy<T> {
    /// Queue a request without waiting for the reply. Blocks only while the
    /// request queue is full.
    pub fn submit(&self, request: T::Request) -> Result<PendingCall<T::Response>, WorkerError> {
        if self.revoked.load(Ordering::Acquire) {
            return Err(WorkerError::ProxyMissing(format!(
                "{} worker handle was revoked",
                T::NAME
            )));
        }

        let (reply, receiver) = mpsc::channel();
        if self.sender.send(WorkerMessage::Run { request, reply }).is_err() {
            self.record_error();
            return Err(WorkerError::CallFailed(format!(
                "{} worker channel is closed",
                T::NAME
            )));
        }

        Ok(PendingCall {
            name: T::NAME,
            receiver,
            started: Instant::now(),
            health: Arc::clone(&self.health),
            finished: false,
        })
    }

    pub fn call(&self, request: T::Request) -> Result<T::Response, WorkerError> {
        self.submit(request)?.wait()
    }

    /// Count a payload-level failure against the worker's health
    pub fn record_error(&self) {
        record_error(&self.health, T::NAME);
    }

    pub fn health_stats(&self) -> WorkerHealthStats {
        lock_health(&self.health).stats()
    }
}

/// A submitted request whose reply has not been collected yet.
///
/// Dropping it discards the result; the worker still finishes the computation.
pub struct PendingCall<R> {
    name: &'static str,
    receiver: Receiver<R>,
    started: Instant,
    health: Arc<Mutex<HealthMonitor>>,
    finished: bool,
}

impl<R> PendingCall<R> {
    /// Block until the worker replies
    pub fn wait(mut self) -> Result<R, WorkerError> {
        match self.receiver.recv() {
            Ok(response) => Ok(self.succeed(response)),
            Err(_) => Err(self.fail()),
        }
    }

    /// Poll for the reply. Yields `Some` exactly once.
    pub fn try_take(&mut self) -> Option<Result<R, WorkerError>> {
        if self.finished {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(response) => Some(Ok(self.succeed(response))),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.fail())),
        }
    }

    fn succeed(&mut self, response: R) -> R {
        self.finished = true;
        lock_health(&self.health).record_operation(self.started.elapsed());
        response
    }

    fn fail(&mut self) -> WorkerError {
        self.finished = true;
        record_error(&self.health, self.name);
        WorkerError::CallFailed(format!("{} worker dropped the request", self.name))
    }
}

fn lock_health(health: &Mutex<HealthMonitor>) -> MutexGuard<'_, HealthMonitor> {
    health.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record_error(health: &Mutex<HealthMonitor>, name: &str) {
    let mut monitor = lock_health(health);
    let was_healthy = monitor.is_healthy();
    monitor.record_error();
    if was_healthy && !monitor.is_healthy() {
        warn!(
            "{} worker degraded after {} consecutive errors",
            name,
            monitor.consecutive_errors()
        );
    }
}
