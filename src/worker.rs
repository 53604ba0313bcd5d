//! Dedicated pitch-shift worker thread.
//!
//! The pipeline is CPU bound and holds an engine session for the length of a
//! request, so it runs on its own thread. Callers submit a [`PitchRequest`]
//! and get back a [`PendingShift`] carrying the request id and a private reply
//! channel. Progress and lifecycle notifications travel on a separate status
//! channel without ids.
//!
//! Only one request is in flight at a time. A second submission while one is
//! pending is rejected with [`Error::WorkerBusy`]; there is no cancellation.

use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use transposer_core::{
    AudioBuffer, EngineFactory, PipelineConfig, PitchRequest, ShiftPipeline, ShiftProgress,
};

/// How often [`PendingShift::wait_with_status`] wakes to forward status.
const STATUS_POLL: Duration = Duration::from_millis(20);

/// Status channel capacity. Notifications beyond this are dropped.
const STATUS_CAPACITY: usize = 64;

/// Correlates a reply with the request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unsolicited notifications from the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Thread started, pipeline not yet built.
    Loading,
    /// Ready to accept requests.
    Ready,
    Progress(ShiftProgress),
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Loading => write!(f, "Loading engine in worker..."),
            WorkerStatus::Ready => write!(f, "Worker ready"),
            WorkerStatus::Progress(progress) => write!(f, "{}", progress),
        }
    }
}

/// Reply to a single shift request, tagged with its id.
#[derive(Debug)]
pub struct ShiftReply {
    pub id: RequestId,
    pub result: transposer_core::Result<AudioBuffer>,
}

enum WorkerCommand {
    Shift {
        id: RequestId,
        request: PitchRequest,
        reply_tx: Sender<ShiftReply>,
    },
    Shutdown,
}

/// Handle to the pitch-shift worker thread.
pub struct ShiftWorker {
    cmd_tx: Sender<WorkerCommand>,
    status_rx: Receiver<WorkerStatus>,
    busy: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    next_id: AtomicU64,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl ShiftWorker {
    /// Start the worker thread.
    ///
    /// The factory moves to the worker thread; every request gets a fresh
    /// engine session from it.
    pub fn spawn<F>(factory: F, config: &PipelineConfig) -> Result<Self>
    where
        F: EngineFactory + 'static,
    {
        config.validate()?;

        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<WorkerCommand>(4);
        let (status_tx, status_rx) = crossbeam_channel::bounded::<WorkerStatus>(STATUS_CAPACITY);
        let busy = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let busy_clone = busy.clone();
        let running_clone = running.clone();
        let progress_interval = config.progress_interval;

        let thread = std::thread::Builder::new()
            .name("transposer-worker".into())
            .spawn(move || {
                let _ = status_tx.try_send(WorkerStatus::Loading);
                let pipeline = ShiftPipeline::new(factory, progress_interval);
                worker_loop(&pipeline, &cmd_rx, &status_tx, &busy_clone);
                running_clone.store(false, Ordering::Release);
                busy_clone.store(false, Ordering::Release);
            })
            .map_err(|e| Error::WorkerSpawn(e.to_string()))?;

        Ok(Self {
            cmd_tx,
            status_rx,
            busy,
            running,
            next_id: AtomicU64::new(1),
            thread: Some(thread),
        })
    }

    /// Hand a request to the worker.
    ///
    /// The buffer moves into the worker; the returned handle receives the
    /// shifted result.
    pub fn submit(&self, request: PitchRequest) -> Result<PendingShift> {
        if !self.is_running() {
            return Err(Error::WorkerSend);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::WorkerBusy);
        }

        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        if self
            .cmd_tx
            .send(WorkerCommand::Shift {
                id,
                request,
                reply_tx,
            })
            .is_err()
        {
            self.busy.store(false, Ordering::Release);
            return Err(Error::WorkerSend);
        }

        tracing::debug!(%id, "Shift request submitted");
        Ok(PendingShift { id, reply_rx })
    }

    /// Whether a request is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Next pending status notification, if any.
    pub fn try_status(&self) -> Option<WorkerStatus> {
        self.status_rx.try_recv().ok()
    }

    /// The status channel, for callers that want to block or select on it.
    pub fn status(&self) -> &Receiver<WorkerStatus> {
        &self.status_rx
    }

    /// Stop the worker thread and wait for it to finish.
    ///
    /// A request already running completes first.
    pub fn shutdown(&mut self) {
        let _ = self.cmd_tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ShiftWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<F: EngineFactory>(
    pipeline: &ShiftPipeline<F>,
    cmd_rx: &Receiver<WorkerCommand>,
    status_tx: &Sender<WorkerStatus>,
    busy: &AtomicBool,
) {
    tracing::info!("Pitch-shift worker started");
    let _ = status_tx.try_send(WorkerStatus::Ready);

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            WorkerCommand::Shift {
                id,
                request,
                reply_tx,
            } => {
                let run = panic::catch_unwind(AssertUnwindSafe(|| {
                    pipeline.run(request, |progress| {
                        // Best-effort: a slow reader loses progress, never blocks the shift.
                        let _ = status_tx.try_send(WorkerStatus::Progress(progress));
                    })
                }));
                // A panicking engine fails its request; the worker stays up.
                let result = run.unwrap_or_else(|payload| {
                    let reason = panic_message(payload.as_ref());
                    tracing::error!(%id, "Pitch shift panicked: {}", reason);
                    Err(transposer_core::Error::Engine(format!(
                        "pitch shift panicked: {}",
                        reason
                    )))
                });
                if let Err(e) = &result {
                    tracing::warn!(%id, "Shift request failed: {}", e);
                }

                busy.store(false, Ordering::Release);
                if reply_tx.send(ShiftReply { id, result }).is_err() {
                    tracing::debug!(%id, "Shift reply dropped, caller went away");
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }

    tracing::info!("Pitch-shift worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

/// A submitted request awaiting its reply.
pub struct PendingShift {
    id: RequestId,
    reply_rx: Receiver<ShiftReply>,
}

impl PendingShift {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Block until the worker replies.
    pub fn wait(self) -> Result<AudioBuffer> {
        let reply = self.reply_rx.recv().map_err(|_| Error::WorkerRecv)?;
        self.accept(reply)
    }

    /// Block until the worker replies, forwarding status notifications to
    /// `on_status` as they arrive.
    pub fn wait_with_status(
        self,
        status: &Receiver<WorkerStatus>,
        mut on_status: impl FnMut(WorkerStatus),
    ) -> Result<AudioBuffer> {
        loop {
            status.try_iter().for_each(&mut on_status);
            match self.reply_rx.recv_timeout(STATUS_POLL) {
                Ok(reply) => {
                    status.try_iter().for_each(&mut on_status);
                    return self.accept(reply);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(Error::WorkerRecv),
            }
        }
    }

    /// Non-blocking check. `None` while the shift is still running.
    pub fn try_result(&self) -> Option<Result<AudioBuffer>> {
        match self.reply_rx.try_recv() {
            Ok(reply) => Some(self.accept(reply)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::WorkerRecv)),
        }
    }

    fn accept(&self, reply: ShiftReply) -> Result<AudioBuffer> {
        if reply.id != self.id {
            return Err(Error::ReplyMismatch {
                expected: self.id,
                got: reply.id,
            });
        }
        Ok(reply.result?)
    }
}
