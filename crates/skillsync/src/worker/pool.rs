//! Bounded enrichment worker pool.
//!
//! Requests go through a bounded queue to a fixed set of threads. At most
//! one run per employee is queued or in flight at any time: a duplicate
//! request for a queued employee is coalesced into the queued one, and a
//! request arriving while that employee is being processed schedules exactly
//! one follow-up run on the same worker. Different employees run in
//! parallel.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};
use tokio::sync::broadcast;

use crate::broadcast::{EnrichmentBroadcaster, EnrichmentEvent, EnrichmentPhase};
use crate::error::WorkerError;
use crate::pipeline::{EnrichmentOutcome, PipelineError};
use crate::worker::job::{EnrichmentJob, EnrichmentRequest};

/// Whatever executes one enrichment run.
pub trait EnrichmentRunner: Send + Sync {
    fn run(&self, request: &EnrichmentRequest) -> Result<EnrichmentOutcome, PipelineError>;
}

/// How a submission was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// A new job was queued.
    Queued { job_id: String },
    /// A job for this employee was already waiting; nothing new was queued.
    Coalesced { job_id: String },
    /// The employee is being processed; one more run follows the current one.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Processing { employee_id: i64, job_id: String },
}

enum Slot {
    Queued { job_id: String },
    Running { job_id: String, rerun: bool },
}

struct Shared {
    slots: Mutex<HashMap<i64, Slot>>,
    states: Mutex<Vec<WorkerState>>,
    broadcaster: EnrichmentBroadcaster,
}

impl Shared {
    fn slots(&self) -> MutexGuard<'_, HashMap<i64, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, worker_id: usize, state: WorkerState) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = states.get_mut(worker_id) {
            *slot = state;
        }
    }
}

pub struct EnrichmentPool {
    job_sender: Sender<EnrichmentJob>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    shared: Arc<Shared>,
    capacity: usize,
}

impl EnrichmentPool {
    pub fn new(
        runner: Arc<dyn EnrichmentRunner>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Result<Self, WorkerError> {
        Self::with_broadcaster(
            runner,
            worker_count,
            queue_capacity,
            EnrichmentBroadcaster::default(),
        )
    }

    pub fn with_broadcaster(
        runner: Arc<dyn EnrichmentRunner>,
        worker_count: usize,
        queue_capacity: usize,
        broadcaster: EnrichmentBroadcaster,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 || queue_capacity == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker count and queue capacity must be at least 1".to_string(),
            ));
        }

        let (job_sender, job_receiver) = bounded::<EnrichmentJob>(queue_capacity);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(Shared {
            slots: Mutex::new(HashMap::new()),
            states: Mutex::new(vec![WorkerState::Idle; worker_count]),
            broadcaster,
        });

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_shared = Arc::clone(&shared);
            let worker_runner = Arc::clone(&runner);

            let handle = thread::Builder::new()
                .name(format!("enrich-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, job_rx, shutdown_flag, worker_shared, worker_runner)
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;
            workers.push(handle);
        }

        info!(
            "Started {} enrichment workers (queue capacity {})",
            worker_count, queue_capacity
        );

        Ok(Self {
            job_sender,
            workers,
            shutdown,
            shared,
            capacity: queue_capacity,
        })
    }

    /// Hands a request to the pool without blocking.
    ///
    /// Fails with `QueueFull` when the in-flight limit is reached; the
    /// caller decides whether to retry later.
    pub fn submit(&self, request: EnrichmentRequest) -> Result<Submission, WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ShutDown);
        }

        let mut slots = self.shared.slots();
        match slots.get_mut(&request.employee_id) {
            Some(Slot::Queued { job_id }) => {
                debug!("Coalesced enrichment request for {}", request.business_id);
                return Ok(Submission::Coalesced {
                    job_id: job_id.clone(),
                });
            }
            Some(Slot::Running { rerun, .. }) => {
                debug!("Deferred enrichment request for {}", request.business_id);
                *rerun = true;
                return Ok(Submission::Deferred);
            }
            None => {}
        }

        let job = EnrichmentJob::new(request);
        let job_id = job.id.clone();
        let employee_id = job.request.employee_id;
        let request = job.request.clone();

        match self.job_sender.try_send(job) {
            Ok(()) => {
                slots.insert(
                    employee_id,
                    Slot::Queued {
                        job_id: job_id.clone(),
                    },
                );
                self.shared.broadcaster.track(&job_id, &request);
                Ok(Submission::Queued { job_id })
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Enrichment queue full, rejecting request for {}",
                    request.business_id
                );
                Err(WorkerError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Disconnected(_)) => Err(WorkerError::ChannelClosed),
        }
    }

    /// Drops a queued, not yet started run for `employee_id` (including a
    /// pending follow-up run). Returns false if there was nothing to cancel;
    /// a run already in progress finishes normally.
    pub fn cancel(&self, employee_id: i64) -> bool {
        let mut slots = self.shared.slots();
        match slots.get_mut(&employee_id) {
            Some(Slot::Queued { .. }) => {
                if let Some(Slot::Queued { job_id }) = slots.remove(&employee_id) {
                    info!("Cancelled queued enrichment job {}", job_id);
                }
                true
            }
            Some(Slot::Running { rerun, .. }) if *rerun => {
                *rerun = false;
                true
            }
            _ => false,
        }
    }

    /// Number of employees with a queued or running job.
    pub fn in_flight(&self) -> usize {
        self.shared.slots().len()
    }

    pub fn states(&self) -> Vec<WorkerState> {
        self.shared
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EnrichmentEvent> {
        self.shared.broadcaster.subscribe()
    }

    /// Stops workers after their current job; queued jobs are abandoned.
    pub fn shutdown(&self) {
        info!("Shutting down enrichment pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Closes the queue and joins the workers. Without a prior
    /// [`shutdown`](Self::shutdown), queued jobs are drained first.
    pub fn wait(self) {
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Enrichment worker {} panicked: {:?}", i, e);
            } else {
                debug!("Enrichment worker {} finished", i);
            }
        }

        info!("All enrichment workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<EnrichmentJob>,
    shutdown: Arc<AtomicBool>,
    shared: Arc<Shared>,
    runner: Arc<dyn EnrichmentRunner>,
) {
    debug!("Enrichment worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Enrichment worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => process_job(worker_id, job, &shared, runner.as_ref()),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Enrichment worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Enrichment worker {} stopped", worker_id);
}

fn process_job(worker_id: usize, job: EnrichmentJob, shared: &Shared, runner: &dyn EnrichmentRunner) {
    let employee_id = job.request.employee_id;

    {
        let mut slots = shared.slots();
        match slots.get(&employee_id) {
            Some(Slot::Queued { job_id }) if *job_id == job.id => {
                slots.insert(
                    employee_id,
                    Slot::Running {
                        job_id: job.id.clone(),
                        rerun: false,
                    },
                );
            }
            _ => {
                debug!("Skipping cancelled enrichment job {}", job.id);
                shared.broadcaster.send(EnrichmentEvent::new(
                    &job.id,
                    &job.request,
                    EnrichmentPhase::Cancelled,
                    "Enrichment cancelled before it started",
                ));
                return;
            }
        }
    }

    shared.set_state(
        worker_id,
        WorkerState::Processing {
            employee_id,
            job_id: job.id.clone(),
        },
    );

    loop {
        run_once(&job, shared, runner);

        let mut slots = shared.slots();
        match slots.get_mut(&employee_id) {
            Some(Slot::Running { rerun, .. }) if *rerun => {
                *rerun = false;
                debug!("Re-running enrichment for {}", job.request.business_id);
            }
            _ => {
                slots.remove(&employee_id);
                break;
            }
        }
    }

    shared.set_state(worker_id, WorkerState::Idle);
}

/// One guarded run. Errors and panics are logged and reported, never
/// propagated.
fn run_once(job: &EnrichmentJob, shared: &Shared, runner: &dyn EnrichmentRunner) {
    let send = |phase, message: &str| {
        shared
            .broadcaster
            .send(EnrichmentEvent::new(&job.id, &job.request, phase, message));
    };
    send(EnrichmentPhase::Started, "Enrichment started");

    match panic::catch_unwind(AssertUnwindSafe(|| runner.run(&job.request))) {
        Ok(Ok(outcome)) => {
            info!("Enrichment for {}: {}", job.request.business_id, outcome);
            send(EnrichmentPhase::Completed, &outcome.to_string());
        }
        Ok(Err(e)) => {
            error!("Enrichment for {} failed: {}", job.request.business_id, e);
            shared
                .broadcaster
                .send(EnrichmentEvent::failed(&job.id, &job.request, &e.to_string()));
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(
                "Enrichment for {} panicked: {}",
                job.request.business_id, message
            );
            shared.broadcaster.send(EnrichmentEvent::failed(
                &job.id,
                &job.request,
                &format!("panicked: {}", message),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    /// Blocks every run until the test releases it.
    struct GatedRunner {
        gate: crossbeam_channel::Receiver<()>,
        runs: AtomicUsize,
    }

    impl EnrichmentRunner for GatedRunner {
        fn run(&self, request: &EnrichmentRequest) -> Result<EnrichmentOutcome, PipelineError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if request.employee_id == 99 {
                panic!("boom");
            }
            let _ = self.gate.recv();
            Ok(EnrichmentOutcome::Unchanged)
        }
    }

    fn gated() -> (Arc<GatedRunner>, crossbeam_channel::Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Arc::new(GatedRunner {
                gate: rx,
                runs: AtomicUsize::new(0),
            }),
            tx,
        )
    }

    fn request(id: i64) -> EnrichmentRequest {
        EnrichmentRequest::new(id, format!("BIZ2025-{:04}", id))
    }

    fn wait_for(
        rx: &mut broadcast::Receiver<EnrichmentEvent>,
        employee_id: i64,
        phase: EnrichmentPhase,
    ) -> EnrichmentEvent {
        loop {
            let event = rx.blocking_recv().unwrap();
            if event.employee_id == employee_id && event.phase == phase {
                return event;
            }
        }
    }

    #[test]
    fn test_rejects_zero_workers() {
        let (runner, _gate) = gated();
        assert!(matches!(
            EnrichmentPool::new(runner, 0, 4),
            Err(WorkerError::SpawnFailed(_))
        ));
    }

    #[test]
    fn test_coalesces_and_defers_per_employee() {
        let (runner, gate) = gated();
        let pool = EnrichmentPool::new(runner.clone(), 1, 8).unwrap();
        let mut rx = pool.subscribe();

        assert!(matches!(pool.submit(request(1)).unwrap(), Submission::Queued { .. }));
        wait_for(&mut rx, 1, EnrichmentPhase::Started);

        assert_eq!(pool.submit(request(1)).unwrap(), Submission::Deferred);
        assert_eq!(pool.submit(request(1)).unwrap(), Submission::Deferred);

        let queued = pool.submit(request(2)).unwrap();
        let Submission::Queued { job_id } = queued else {
            panic!("expected a queued job, got {:?}", queued);
        };
        assert_eq!(
            pool.submit(request(2)).unwrap(),
            Submission::Coalesced { job_id }
        );
        assert_eq!(pool.in_flight(), 2);

        for _ in 0..3 {
            gate.send(()).unwrap();
        }
        wait_for(&mut rx, 1, EnrichmentPhase::Completed);
        wait_for(&mut rx, 1, EnrichmentPhase::Completed);
        wait_for(&mut rx, 2, EnrichmentPhase::Completed);

        pool.wait();
        assert_eq!(runner.runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cancel_drops_only_queued_jobs() {
        let (runner, gate) = gated();
        let pool = EnrichmentPool::new(runner.clone(), 1, 8).unwrap();
        let mut rx = pool.subscribe();

        pool.submit(request(1)).unwrap();
        wait_for(&mut rx, 1, EnrichmentPhase::Started);
        pool.submit(request(2)).unwrap();

        assert!(pool.cancel(2));
        assert!(!pool.cancel(1), "a running job is not cancellable");
        assert!(!pool.cancel(3));

        gate.send(()).unwrap();
        wait_for(&mut rx, 2, EnrichmentPhase::Cancelled);
        pool.wait();

        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queue_full_is_reported() {
        let (runner, gate) = gated();
        let pool = EnrichmentPool::new(runner, 1, 1).unwrap();
        let mut rx = pool.subscribe();

        pool.submit(request(1)).unwrap();
        wait_for(&mut rx, 1, EnrichmentPhase::Started);
        pool.submit(request(2)).unwrap();

        assert!(matches!(
            pool.submit(request(3)),
            Err(WorkerError::QueueFull { capacity: 1 })
        ));

        gate.send(()).unwrap();
        gate.send(()).unwrap();
        pool.wait();
    }

    #[test]
    fn test_worker_survives_panic_and_returns_to_idle() {
        let (runner, gate) = gated();
        let pool = EnrichmentPool::new(runner, 1, 4).unwrap();
        let mut rx = pool.subscribe();

        pool.submit(request(99)).unwrap();
        let failed = wait_for(&mut rx, 99, EnrichmentPhase::Failed);
        assert!(failed.error.unwrap().contains("boom"));

        gate.send(()).unwrap();
        pool.submit(request(5)).unwrap();
        wait_for(&mut rx, 5, EnrichmentPhase::Completed);

        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.states().iter().any(|s| *s != WorkerState::Idle) {
            assert!(Instant::now() < deadline, "worker never returned to idle");
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(pool.in_flight(), 0);
        pool.wait();
    }

    #[test]
    fn test_submit_after_shutdown() {
        let (runner, _gate) = gated();
        let pool = EnrichmentPool::new(runner, 1, 4).unwrap();
        pool.shutdown();
        assert!(pool.is_shutdown());
        assert!(matches!(pool.submit(request(1)), Err(WorkerError::ShutDown)));
        pool.wait();
    }
}
