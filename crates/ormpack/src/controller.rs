//! Single-flight scheduling of packing jobs on a background thread.
//!
//! The interactive thread calls `start` and then polls `is_running` and
//! `progress` without ever blocking on the worker. Progress and state live in
//! atomics; the terminal result travels through a bounded channel and is
//! published before the state flips back to idle, so a poller that observes
//! `Idle` can always collect the outcome with `take_result`.
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::job::{PackedOutputs, PackingError, PackingJob, PackingRequest};
use crate::preview::PreviewStore;

pub type JobOutcome = Result<PackedOutputs, PackingError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobState {
    Idle = 0,
    Running = 1,
}

impl JobState {
    fn from_raw(raw: u8) -> Self {
        if raw == JobState::Running as u8 {
            JobState::Running
        } else {
            JobState::Idle
        }
    }
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("a packing job is already running")]
    AlreadyRunning,

    #[error("failed to spawn packing worker: {0}")]
    Spawn(#[source] std::io::Error),
}

struct Shared {
    state: AtomicU8,
    progress: AtomicU32,
    cancel: Arc<AtomicBool>,
}

impl Shared {
    fn publish(&self, value: f32) {
        self.progress.store(value.to_bits(), Ordering::SeqCst);
    }
}

pub struct JobController {
    shared: Arc<Shared>,
    preview: Option<Arc<PreviewStore>>,
    results_tx: Sender<JobOutcome>,
    results_rx: Receiver<JobOutcome>,
    worker: Option<JoinHandle<()>>,
}

impl JobController {
    pub fn new() -> Self {
        let (results_tx, results_rx) = bounded(1);
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(JobState::Idle as u8),
                progress: AtomicU32::new(0.0f32.to_bits()),
                cancel: Arc::new(AtomicBool::new(false)),
            }),
            preview: None,
            results_tx,
            results_rx,
            worker: None,
        }
    }

    /// Jobs started by this controller refresh the ORM slot of `store`.
    pub fn with_preview(mut self, store: Arc<PreviewStore>) -> Self {
        self.preview = Some(store);
        self
    }

    /// Spawns a job for `request`. Rejected, never queued, while another job
    /// is in flight; the running job is left untouched.
    pub fn start(&mut self, request: PackingRequest) -> Result<(), StartError> {
        if self
            .shared
            .state
            .compare_exchange(
                JobState::Idle as u8,
                JobState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            warn!("packing job rejected; another job is still running");
            return Err(StartError::AlreadyRunning);
        }

        self.reap_worker();
        // An outcome nobody collected belongs to the previous job.
        if let Ok(stale) = self.results_rx.try_recv() {
            debug!(ok = stale.is_ok(), "discarding uncollected job outcome");
        }
        self.shared.publish(0.0);
        self.shared.cancel.store(false, Ordering::SeqCst);

        let mut job = PackingJob::new(request).with_cancel_flag(self.shared.cancel.clone());
        if let Some(store) = &self.preview {
            job = job.with_preview(store.clone());
        }
        let shared = self.shared.clone();
        let results_tx = self.results_tx.clone();

        let spawned = thread::Builder::new()
            .name("ormpack-job".into())
            .spawn(move || run_worker(job, shared, results_tx));
        match spawned {
            Ok(handle) => {
                info!("packing job started");
                self.worker = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared
                    .state
                    .store(JobState::Idle as u8, Ordering::SeqCst);
                Err(StartError::Spawn(err))
            }
        }
    }

    pub fn state(&self) -> JobState {
        JobState::from_raw(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == JobState::Running
    }

    /// Latest fraction reported by the current (or last) job. Best effort:
    /// the worker may already be further along.
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.shared.progress.load(Ordering::SeqCst))
    }

    /// Terminal outcome of the last job, delivered at most once.
    pub fn take_result(&self) -> Option<JobOutcome> {
        self.results_rx.try_recv().ok()
    }

    /// Asks the running job to stop at its next step boundary.
    pub fn cancel(&self) {
        if self.is_running() {
            info!("cancellation requested for running packing job");
            self.shared.cancel.store(true, Ordering::SeqCst);
        }
    }

    /// Blocks until the current worker exits and returns its outcome if it
    /// has not been collected yet.
    pub fn wait(&mut self) -> Option<JobOutcome> {
        self.reap_worker();
        self.take_result()
    }

    /// Cancels any running job and joins the worker.
    pub fn shutdown(mut self) -> Option<JobOutcome> {
        self.cancel();
        self.wait()
    }

    fn reap_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("packing worker thread panicked outside the job");
            }
        }
    }
}

impl Default for JobController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel();
            self.reap_worker();
        }
    }
}

fn run_worker(job: PackingJob, shared: Arc<Shared>, results_tx: Sender<JobOutcome>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        job.run(|fraction| shared.publish(fraction))
    }))
    .unwrap_or_else(|_| Err(PackingError::WorkerPanicked));

    match &outcome {
        Ok(outputs) => debug!(outputs = outputs.written.len(), "packing worker finished"),
        Err(error) => warn!(%error, "packing job failed"),
    }

    shared.publish(1.0);
    if results_tx.send(outcome).is_err() {
        debug!("job outcome dropped; controller is gone");
    }
    shared
        .state
        .store(JobState::Idle as u8, Ordering::SeqCst);
}
