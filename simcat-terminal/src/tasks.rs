//! Per-slot task framework
//!
//! Each card slot runs two actors connected by a bounded channel:
//! - **Decoder Task**: receives every transport event in arrival order,
//!   decodes envelopes, resolves icons and forwards the result
//! - **Dispatcher Task**: owns the [`Session`](crate::session::Session) and
//!   processes decoded commands, application responses and lifecycle
//!   signals one at a time
//!
//! [`TaskManager`] records where each actor is in its life:
//! `Created` until spawned, `Running` while it drains its queue,
//! `Stopping` once the registry waits on it, then `Stopped` or `Failed`.

use std::fmt;
use std::time::Instant;

use simcat_proto::{CatResponseMessage, CommandParams, RejectedCommand};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::session::SessionSnapshot;

/// How long the registry waits for one task to exit, in milliseconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Item carried by a slot queue.
#[derive(Debug)]
pub enum TaskMessage<T> {
    Message(T),
    /// Stop after everything queued ahead of this marker
    Shutdown,
}

/// Where a slot task is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Created,
    Running,
    Stopping,
    Stopped,
    /// Panicked or missed the shutdown deadline
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Created => "Created",
            TaskState::Running => "Running",
            TaskState::Stopping => "Stopping",
            TaskState::Stopped => "Stopped",
            TaskState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// The two actors of a slot, in shutdown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    Decoder,
    Dispatcher,
}

impl TaskId {
    pub const ALL: [TaskId; 2] = [TaskId::Decoder, TaskId::Dispatcher];

    fn index(self) -> usize {
        match self {
            TaskId::Decoder => 0,
            TaskId::Dispatcher => 1,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Decoder => f.write_str("Decoder"),
            TaskId::Dispatcher => f.write_str("Dispatcher"),
        }
    }
}

/// An actor driven by its own slot queue.
#[async_trait::async_trait]
pub trait Task: Send + 'static {
    type Message: Send;

    /// Drains `rx` until a [`TaskMessage::Shutdown`] arrives or every
    /// sender is gone.
    async fn run(&mut self, rx: mpsc::Receiver<TaskMessage<Self::Message>>);
}

/// Transport events, in the order the modem reported them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderMessage {
    /// Proactive command envelope (hex)
    Envelope(String),
    /// Event notification carrying a command the modem already handled (hex)
    EventNotify(String),
    /// The card ended the proactive session
    SessionEnd,
    /// The modem reports call set up for an earlier event notification
    CallSetupEvent,
    /// Card inserted or removed
    CardState { present: bool },
}

/// How a command reached the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    /// Proactive command; the card waits for a Terminal Response
    Proactive,
    /// Event notification; the modem has already answered the card
    EventNotify,
}

impl fmt::Display for CommandOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOrigin::Proactive => f.write_str("proactive"),
            CommandOrigin::EventNotify => f.write_str("event-notify"),
        }
    }
}

/// Dispatcher input. Decoded traffic comes from the decoder, the rest
/// straight from a [`SlotHandle`](crate::registry::SlotHandle).
#[derive(Debug)]
pub enum DispatcherMessage {
    Command {
        /// Icons already resolved
        params: CommandParams,
        origin: CommandOrigin,
    },
    Rejected {
        rejected: RejectedCommand,
        origin: CommandOrigin,
    },
    Response(CatResponseMessage),
    SessionEnd,
    CallSetupEvent,
    CardState { present: bool },
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Sending side of a slot queue.
#[derive(Debug)]
pub struct TaskHandle<T> {
    tx: mpsc::Sender<TaskMessage<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> TaskHandle<T> {
    pub fn new(tx: mpsc::Sender<TaskMessage<T>>) -> Self {
        Self { tx }
    }

    /// Queues `msg`, waiting while the queue is full.
    pub async fn send(&self, msg: T) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Message(msg)).await
    }

    /// Queues the stop marker behind anything already queued.
    pub async fn shutdown(&self) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Errors raised by slot queues and task supervision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Slot {slot} {task} task is not running")]
    ChannelClosed { slot: usize, task: TaskId },

    #[error("Slot {slot} {task} task failed: {message}")]
    Failed {
        slot: usize,
        task: TaskId,
        message: String,
    },

    #[error("No such slot: {0}")]
    NoSuchSlot(usize),
}

#[derive(Debug, Default)]
struct TaskRecord {
    state: TaskState,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    error: Option<String>,
    join: Option<JoinHandle<()>>,
}

/// Spawns and supervises the two tasks of one card slot.
#[derive(Debug)]
pub struct TaskManager {
    slot: usize,
    records: [TaskRecord; 2],
}

impl TaskManager {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            records: Default::default(),
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Spawns `task` on the current runtime, feeding it from `rx`.
    pub fn spawn<T: Task>(
        &mut self,
        task_id: TaskId,
        mut task: T,
        rx: mpsc::Receiver<TaskMessage<T::Message>>,
    ) {
        let join = tokio::spawn(async move { task.run(rx).await });
        let record = &mut self.records[task_id.index()];
        record.join = Some(join);
        record.state = TaskState::Running;
        record.started_at = Some(Instant::now());
    }

    pub fn state(&self, task_id: TaskId) -> TaskState {
        self.records[task_id.index()].state
    }

    /// Failure reason of a task that ended in [`TaskState::Failed`].
    pub fn failure(&self, task_id: TaskId) -> Option<&str> {
        self.records[task_id.index()].error.as_deref()
    }

    /// Time between spawn and exit, once the task has exited.
    pub fn run_time(&self, task_id: TaskId) -> Option<Duration> {
        let record = &self.records[task_id.index()];
        Some(record.stopped_at?.duration_since(record.started_at?))
    }

    /// Waits up to `timeout` for a task that has been sent its stop marker.
    /// A task that was never spawned, or was already joined, is a no-op.
    pub async fn join(&mut self, task_id: TaskId, timeout: Duration) -> Result<(), TaskError> {
        let record = &mut self.records[task_id.index()];
        let Some(join) = record.join.take() else {
            return Ok(());
        };
        record.state = TaskState::Stopping;

        let outcome = match tokio::time::timeout(timeout, join).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) if e.is_panic() => Some("task panicked"),
            Ok(Err(_)) => Some("task cancelled"),
            Err(_) => Some("shutdown deadline passed"),
        };

        record.stopped_at = Some(Instant::now());
        match outcome {
            None => {
                record.state = TaskState::Stopped;
                Ok(())
            }
            Some(reason) => {
                record.state = TaskState::Failed;
                record.error = Some(reason.to_string());
                Err(TaskError::Failed {
                    slot: self.slot,
                    task: task_id,
                    message: reason.to_string(),
                })
            }
        }
    }

    /// State of every task, decoder first.
    pub fn status_summary(&self) -> Vec<(TaskId, TaskState)> {
        TaskId::ALL.iter().map(|id| (*id, self.state(*id))).collect()
    }
}
