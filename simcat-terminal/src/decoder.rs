//! Decode stage task
//!
//! Receives transport events in arrival order. Envelopes and event
//! notifications are decoded into [`CommandParams`], their icons are
//! resolved through the slot's [`IconLoader`], and the result is forwarded
//! to the dispatcher. Lifecycle signals are forwarded unchanged so that they
//! keep their position relative to the commands around them.

use std::sync::Arc;

use simcat_common::{log_cat_message, Direction};
use simcat_proto::{CommandParams, CommandParamsFactory, DecodeError, RejectedCommand};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::collab::IconLoader;
use crate::tasks::{
    CommandOrigin, DecoderMessage, DispatcherMessage, Task, TaskHandle, TaskMessage,
};

/// Turns hex envelopes into command parameters with icons loaded.
pub struct CommandDecoder {
    factory: CommandParamsFactory,
    icon_loader: Arc<dyn IconLoader>,
}

impl CommandDecoder {
    pub fn new(factory: CommandParamsFactory, icon_loader: Arc<dyn IconLoader>) -> Self {
        Self {
            factory,
            icon_loader,
        }
    }

    /// Decodes `hex_envelope` and loads every icon it references.
    pub async fn decode(&self, hex_envelope: &str) -> Result<CommandParams, RejectedCommand> {
        let raw = hex::decode(hex_envelope.trim()).map_err(|e| {
            RejectedCommand::new(None, DecodeError::InvalidHex(e.to_string()))
        })?;
        log_cat_message(Direction::Rx, "Proactive Command", &raw);

        let mut params = self.factory.decode(&raw)?;
        self.load_icons(&mut params).await;
        Ok(params)
    }

    /// Fills in icon images. A failed record sets the icon-load-failed flag
    /// and the remaining records are still attempted.
    pub async fn load_icons(&self, params: &mut CommandParams) {
        let mut failed = false;
        for icon in params.icons_mut() {
            match self.icon_loader.load_icon(icon.record_number).await {
                Ok(image) => icon.image = Some(image),
                Err(e) => {
                    debug!(record = icon.record_number, error = %e, "Icon not loaded");
                    failed = true;
                }
            }
        }
        if failed {
            params.load_icon_failed = true;
        }
    }
}

/// Decode stage of one card slot.
pub struct DecoderTask {
    slot: usize,
    decoder: CommandDecoder,
    dispatcher: TaskHandle<DispatcherMessage>,
}

impl DecoderTask {
    pub fn new(
        slot: usize,
        decoder: CommandDecoder,
        dispatcher: TaskHandle<DispatcherMessage>,
    ) -> Self {
        Self {
            slot,
            decoder,
            dispatcher,
        }
    }

    async fn handle_message(&mut self, msg: DecoderMessage) {
        let forwarded = match msg {
            DecoderMessage::Envelope(hex) => self.decode(&hex, CommandOrigin::Proactive).await,
            DecoderMessage::EventNotify(hex) => {
                self.decode(&hex, CommandOrigin::EventNotify).await
            }
            DecoderMessage::SessionEnd => DispatcherMessage::SessionEnd,
            DecoderMessage::CallSetupEvent => DispatcherMessage::CallSetupEvent,
            DecoderMessage::CardState { present } => DispatcherMessage::CardState { present },
        };

        if self.dispatcher.send(forwarded).await.is_err() {
            warn!(slot = self.slot, "Dispatcher task gone, dropping message");
        }
    }

    async fn decode(&self, hex: &str, origin: CommandOrigin) -> DispatcherMessage {
        match self.decoder.decode(hex).await {
            Ok(params) => DispatcherMessage::Command { params, origin },
            Err(rejected) => {
                debug!(slot = self.slot, %origin, error = %rejected, "Decode failed");
                DispatcherMessage::Rejected { rejected, origin }
            }
        }
    }
}

#[async_trait::async_trait]
impl Task for DecoderTask {
    type Message = DecoderMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!(slot = self.slot, "Decoder task started");
        while let Some(msg) = rx.recv().await {
            match msg {
                TaskMessage::Message(msg) => self.handle_message(msg).await,
                TaskMessage::Shutdown => {
                    info!(slot = self.slot, "Decoder task received shutdown signal");
                    break;
                }
            }
        }
        info!(slot = self.slot, "Decoder task stopped");
    }
}
