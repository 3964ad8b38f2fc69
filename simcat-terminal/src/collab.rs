//! External collaborators of a card slot
//!
//! The engine never talks to the modem, the card file system or the user
//! directly. Each slot is given three collaborators:
//! - [`CatTransport`]: writes Terminal Responses and Envelopes to the modem
//! - [`CatApplication`]: presents commands to the user and reports decisions
//! - [`IconLoader`]: reads icon records from EF(IMG)

use std::sync::Arc;

use async_trait::async_trait;
use simcat_proto::CatCmdMessage;
use thiserror::Error;

/// Error returned by an [`IconLoader`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IconLoadError {
    /// The record does not exist on the card
    #[error("Icon record {0} not found")]
    NotFound(u8),
    /// The card could not be read
    #[error("Icon record {record} unreadable: {reason}")]
    Unreadable {
        /// Record number in EF(IMG)
        record: u8,
        /// Failure description
        reason: String,
    },
}

/// Modem side of the slot.
#[async_trait]
pub trait CatTransport: Send + Sync {
    /// Writes a Terminal Response (hex).
    async fn send_terminal_response(&self, hex: String);

    /// Writes an Envelope command (hex).
    async fn send_envelope(&self, hex: String);

    /// Accepts or rejects a call set up or channel opening the modem is
    /// holding for the user.
    async fn request_call_setup_ack(&self, accept: bool);
}

/// Host application of the slot.
#[async_trait]
pub trait CatApplication: Send + Sync {
    /// A command to present. Commands that expect a decision are answered
    /// with [`SlotHandle::submit_response`](crate::registry::SlotHandle::submit_response).
    async fn notify_command(&self, cmd: CatCmdMessage);

    /// The card ended the proactive session.
    async fn notify_session_end(&self);

    /// Card inserted or removed.
    async fn notify_card_presence(&self, present: bool);

    /// A card is present and ready for menu selections.
    async fn notify_session_ready(&self);
}

/// Reader of EF(IMG) records.
#[async_trait]
pub trait IconLoader: Send + Sync {
    /// Loads the raw image record `record`.
    async fn load_icon(&self, record: u8) -> Result<Vec<u8>, IconLoadError>;
}

/// Icon loader for terminals without icon support: every load fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIconLoader;

#[async_trait]
impl IconLoader for NoIconLoader {
    async fn load_icon(&self, record: u8) -> Result<Vec<u8>, IconLoadError> {
        Err(IconLoadError::NotFound(record))
    }
}

/// The collaborators serving one slot.
#[derive(Clone)]
pub struct SlotCollaborators {
    pub transport: Arc<dyn CatTransport>,
    pub application: Arc<dyn CatApplication>,
    pub icon_loader: Arc<dyn IconLoader>,
}

impl SlotCollaborators {
    pub fn new(
        transport: Arc<dyn CatTransport>,
        application: Arc<dyn CatApplication>,
        icon_loader: Arc<dyn IconLoader>,
    ) -> Self {
        Self {
            transport,
            application,
            icon_loader,
        }
    }
}

impl std::fmt::Debug for SlotCollaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotCollaborators").finish_non_exhaustive()
    }
}

/// Builds the collaborators for each slot of a registry.
pub trait CollaboratorFactory {
    fn collaborators(&self, slot: usize) -> SlotCollaborators;
}

impl<F> CollaboratorFactory for F
where
    F: Fn(usize) -> SlotCollaborators,
{
    fn collaborators(&self, slot: usize) -> SlotCollaborators {
        self(slot)
    }
}
