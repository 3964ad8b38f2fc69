//! Session registry
//!
//! A [`SessionRegistry`] owns the tasks of every card slot served by the
//! process. Slots are independent: each has its own decoder, dispatcher,
//! session and collaborators. Callers reach a slot through its
//! [`SlotHandle`].

use simcat_common::CatConfig;
use simcat_proto::{CatResponseMessage, CommandParamsFactory, FactoryOptions};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::app::{validate_cat_config, ConfigValidationError};
use crate::collab::CollaboratorFactory;
use crate::decoder::{CommandDecoder, DecoderTask};
use crate::dispatcher::DispatcherTask;
use crate::session::SessionSnapshot;
use crate::tasks::{
    DecoderMessage, DispatcherMessage, TaskError, TaskHandle, TaskId, TaskManager, TaskState,
    DEFAULT_SHUTDOWN_TIMEOUT_MS,
};

/// Errors raised by the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The configuration was rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigValidationError),

    /// A slot task could not be reached or stopped
    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Entry point into one card slot.
///
/// Transport events go through the decode stage so that their order is
/// kept; application responses go straight to the dispatcher.
#[derive(Debug, Clone)]
pub struct SlotHandle {
    slot: usize,
    decoder: TaskHandle<DecoderMessage>,
    dispatcher: TaskHandle<DispatcherMessage>,
}

impl SlotHandle {
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Submits a proactive command envelope (hex).
    pub async fn submit_envelope(&self, hex: impl Into<String>) -> Result<(), TaskError> {
        self.to_decoder(DecoderMessage::Envelope(hex.into())).await
    }

    /// Submits a command the modem reported through an event notification (hex).
    pub async fn submit_event_notify(&self, hex: impl Into<String>) -> Result<(), TaskError> {
        self.to_decoder(DecoderMessage::EventNotify(hex.into())).await
    }

    pub async fn submit_session_end(&self) -> Result<(), TaskError> {
        self.to_decoder(DecoderMessage::SessionEnd).await
    }

    pub async fn submit_call_setup_event(&self) -> Result<(), TaskError> {
        self.to_decoder(DecoderMessage::CallSetupEvent).await
    }

    pub async fn submit_card_state(&self, present: bool) -> Result<(), TaskError> {
        self.to_decoder(DecoderMessage::CardState { present }).await
    }

    /// Submits the application's decision for a command.
    pub async fn submit_response(&self, resp: CatResponseMessage) -> Result<(), TaskError> {
        self.to_dispatcher(DispatcherMessage::Response(resp)).await
    }

    /// Returns the session state once every message queued for the
    /// dispatcher before this call has been handled.
    pub async fn session_snapshot(&self) -> Result<SessionSnapshot, TaskError> {
        let (tx, rx) = oneshot::channel();
        self.to_dispatcher(DispatcherMessage::Snapshot(tx)).await?;
        rx.await.map_err(|_| self.closed(TaskId::Dispatcher))
    }

    async fn to_decoder(&self, msg: DecoderMessage) -> Result<(), TaskError> {
        self.decoder
            .send(msg)
            .await
            .map_err(|_| self.closed(TaskId::Decoder))
    }

    async fn to_dispatcher(&self, msg: DispatcherMessage) -> Result<(), TaskError> {
        self.dispatcher
            .send(msg)
            .await
            .map_err(|_| self.closed(TaskId::Dispatcher))
    }

    fn closed(&self, task: TaskId) -> TaskError {
        TaskError::ChannelClosed {
            slot: self.slot,
            task,
        }
    }
}

struct Slot {
    handle: SlotHandle,
    manager: TaskManager,
}

/// Owner of every slot's tasks.
pub struct SessionRegistry {
    config: CatConfig,
    slots: Vec<Slot>,
    shutdown_timeout: Duration,
}

impl SessionRegistry {
    /// Validates `config` and starts the tasks of `config.slot_count` slots.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: CatConfig,
        collaborators: impl CollaboratorFactory,
    ) -> Result<Self, RegistryError> {
        validate_cat_config(&config)?;

        let factory = CommandParamsFactory::new(FactoryOptions {
            no_alpha_user_confirmation: config.no_alpha_user_confirmation,
            default_alpha_text: config.default_alpha_text.clone(),
        });

        let mut slots = Vec::with_capacity(config.slot_count);
        for slot in 0..config.slot_count {
            let collab = collaborators.collaborators(slot);
            let mut manager = TaskManager::new(slot);

            let (dispatcher_tx, dispatcher_rx) = mpsc::channel(config.channel_capacity);
            let (decoder_tx, decoder_rx) = mpsc::channel(config.channel_capacity);
            let dispatcher = TaskHandle::new(dispatcher_tx);
            let decoder = TaskHandle::new(decoder_tx);

            let dispatcher_task = DispatcherTask::new(
                slot,
                config.clone(),
                collab.transport.clone(),
                collab.application.clone(),
            );
            let decoder_task = DecoderTask::new(
                slot,
                CommandDecoder::new(factory.clone(), collab.icon_loader.clone()),
                dispatcher.clone(),
            );

            manager.spawn(TaskId::Dispatcher, dispatcher_task, dispatcher_rx);
            manager.spawn(TaskId::Decoder, decoder_task, decoder_rx);
            debug!(slot, "Slot tasks started");

            slots.push(Slot {
                handle: SlotHandle {
                    slot,
                    decoder,
                    dispatcher,
                },
                manager,
            });
        }

        info!(
            slots = config.slot_count,
            policy = %config.unsupported_command_policy,
            "Session registry started"
        );

        Ok(Self {
            config,
            slots,
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
        })
    }

    /// Sets how long `shutdown` waits for each task.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn config(&self) -> &CatConfig {
        &self.config
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns the handle of `slot`.
    pub fn slot(&self, slot: usize) -> Result<SlotHandle, TaskError> {
        self.slots
            .get(slot)
            .map(|s| s.handle.clone())
            .ok_or(TaskError::NoSuchSlot(slot))
    }

    /// Returns the handles of all slots.
    pub fn handles(&self) -> Vec<SlotHandle> {
        self.slots.iter().map(|s| s.handle.clone()).collect()
    }

    /// Task states of `slot`, decoder first.
    pub fn status(&self, slot: usize) -> Option<Vec<(TaskId, TaskState)>> {
        self.slots.get(slot).map(|s| s.manager.status_summary())
    }

    /// Stops every slot.
    ///
    /// The decoder of a slot is stopped first so that everything it already
    /// accepted reaches the dispatcher before the dispatcher stops. Every
    /// slot is attempted; the first failure is returned.
    pub async fn shutdown(mut self) -> Result<(), RegistryError> {
        info!("Shutting down session registry");
        let timeout = self.shutdown_timeout;
        let mut first_error = None;

        for slot in &mut self.slots {
            for task_id in TaskId::ALL {
                let signalled = match task_id {
                    TaskId::Decoder => slot.handle.decoder.shutdown().await.is_ok(),
                    TaskId::Dispatcher => slot.handle.dispatcher.shutdown().await.is_ok(),
                };
                if !signalled {
                    debug!(slot = slot.handle.slot, task = %task_id, "Task already stopped");
                }

                if let Err(e) = slot.manager.join(task_id, timeout).await {
                    warn!(error = %e, "Task did not stop cleanly");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => {
                info!("Session registry stopped");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("slot_count", &self.slots.len())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}
