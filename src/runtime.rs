//! Single-writer event runtime.
//!
//! Pollers do not call the controller directly: they submit [`LiveEvent`]s to
//! a bounded queue drained by one worker thread, which applies them in
//! submission order. A full queue is reported to the submitter instead of
//! blocking it.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{info, warn};

use crate::controller::LiveController;
use crate::error::{ExecutionError, LiveError, LiveResult};
use crate::reconcile::{PassReport, PollResult};

const QUEUE_PATH: &str = "live_events";

/// Input events for the live list.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// A poller reporting one service's current streams and channels.
    UpdateLiveList(PollResult),
    /// Ask for a debounced save without reconciling.
    SaveStreamList,
}

/// What the worker did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// The poll was applied.
    Reconciled(PassReport),
    /// A debounced save was scheduled.
    SaveRequested,
}

enum Job {
    Apply {
        event: LiveEvent,
        reply: Option<Sender<LiveResult<EventOutcome>>>,
    },

    #[cfg(test)]
    Stall {
        duration: Duration,
        started: Sender<()>,
    },
}

fn apply(controller: &LiveController, event: LiveEvent) -> LiveResult<EventOutcome> {
    match event {
        LiveEvent::UpdateLiveList(poll) => controller.update(poll).map(EventOutcome::Reconciled),
        LiveEvent::SaveStreamList => {
            controller.request_save();
            Ok(EventOutcome::SaveRequested)
        }
    }
}

fn run(controller: &LiveController, rx: &Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        match job {
            Job::Apply { event, reply } => {
                let result = apply(controller, event);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(err) = result {
                            warn!(error = %err, "live event rejected");
                        }
                    }
                }
            }

            #[cfg(test)]
            Job::Stall { duration, started } => {
                let _ = started.send(());
                thread::sleep(duration);
            }
        }
    }
}

/// Handle returned by [`LiveRuntime::submit`].
#[derive(Debug)]
pub struct EventHandle {
    rx: Receiver<LiveResult<EventOutcome>>,
}

impl EventHandle {
    /// Waits for the event to be applied.
    pub fn join(self) -> LiveResult<EventOutcome> {
        self.rx.recv().map_err(|_| disconnected())?
    }

    /// Waits for the event to be applied, up to `timeout`.
    pub fn join_timeout(self, timeout: Duration) -> LiveResult<EventOutcome> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => LiveError::Execution(ExecutionError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            }),
            RecvTimeoutError::Disconnected => disconnected(),
        })?
    }
}

/// Owns the event queue and its worker thread.
pub struct LiveRuntime {
    controller: Arc<LiveController>,
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    queue_capacity: usize,
}

impl LiveRuntime {
    /// Starts the worker with the controller's configured queue capacity.
    ///
    /// # Errors
    /// Returns `ExecutionError::Spawn` if the thread cannot be created.
    pub fn start(controller: Arc<LiveController>) -> LiveResult<Self> {
        let queue_capacity = controller.config().queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let worker_controller = Arc::clone(&controller);
        let worker = thread::Builder::new()
            .name("livewatch-runtime".to_string())
            .spawn(move || run(&worker_controller, &rx))
            .map_err(|e| ExecutionError::Spawn {
                name: "livewatch-runtime".to_string(),
                message: e.to_string(),
            })?;
        info!(queue_capacity, "live runtime started");

        Ok(Self {
            controller,
            tx: Some(tx),
            worker: Some(worker),
            queue_capacity,
        })
    }

    /// Controller the worker applies events to.
    #[must_use]
    pub fn controller(&self) -> &Arc<LiveController> {
        &self.controller
    }

    /// Queues an event without waiting for it. Failures while applying it
    /// are logged.
    pub fn try_submit(&self, event: LiveEvent) -> LiveResult<()> {
        self.enqueue(Job::Apply { event, reply: None })
    }

    /// Queues an event and returns a handle for its outcome.
    pub fn submit(&self, event: LiveEvent) -> LiveResult<EventHandle> {
        let (reply, rx) = bounded(1);
        self.enqueue(Job::Apply {
            event,
            reply: Some(reply),
        })?;
        Ok(EventHandle { rx })
    }

    /// Applies a poll result and waits for the pass report.
    pub fn update(&self, poll: PollResult) -> LiveResult<PassReport> {
        match self.submit(LiveEvent::UpdateLiveList(poll))?.join()? {
            EventOutcome::Reconciled(report) => Ok(report),
            EventOutcome::SaveRequested => Err(LiveError::internal("update answered with a save outcome")),
        }
    }

    /// Drains queued events, stops the worker and flushes the list.
    pub fn shutdown(mut self) -> LiveResult<()> {
        self.stop();
        self.controller.flush()
    }

    fn enqueue(&self, job: Job) -> LiveResult<()> {
        let tx = self.tx.as_ref().ok_or_else(disconnected)?;
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LiveError::Execution(ExecutionError::QueueFull {
                path: QUEUE_PATH.to_string(),
                capacity: self.queue_capacity,
            })),
            Err(TrySendError::Disconnected(_)) => Err(disconnected()),
        }
    }

    fn stop(&mut self) {
        // Closing the channel lets the worker drain what is queued, then exit.
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            info!("live runtime stopped");
        }
    }

    #[cfg(test)]
    fn stall(&self, duration: Duration) -> LiveResult<Receiver<()>> {
        let (started, rx) = bounded(1);
        self.enqueue(Job::Stall { duration, started })?;
        Ok(rx)
    }
}

impl Drop for LiveRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for LiveRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveRuntime")
            .field("queue_capacity", &self.queue_capacity)
            .field("running", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

fn disconnected() -> LiveError {
    LiveError::Execution(ExecutionError::Disconnected {
        path: QUEUE_PATH.to_string(),
    })
}
