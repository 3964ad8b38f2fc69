//! Mock collaborators for integration testing
//!
//! [`MockCat`] stands in for the modem transport, the host application and
//! the icon reader of one card slot. Every outbound call is recorded as a
//! [`MockCatEvent`] that the test reads back in order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use simcat_common::CatConfig;
use simcat_proto::{CatCmdMessage, CommandDetails};
use simcat_terminal::{
    CatApplication, CatTransport, IconLoadError, IconLoader, RegistryError, SessionRegistry,
    SlotCollaborators, SlotHandle,
};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use crate::test_utils::DEFAULT_TEST_TIMEOUT;

/// Mock collaborator errors
#[derive(Debug, Error)]
pub enum MockCatError {
    #[error("No event within {0:?}")]
    Timeout(Duration),
    #[error("Event channel closed")]
    Closed,
    #[error("Unexpected event: {0:?}")]
    Unexpected(MockCatEvent),
}

/// Events recorded by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCatEvent {
    /// Terminal Response written to the modem (lowercase hex)
    TerminalResponse(String),
    /// Envelope written to the modem (lowercase hex)
    Envelope(String),
    /// Call set up or channel opening accepted/rejected
    CallSetupAck(bool),
    /// Command presented to the application
    Command(CommandDetails),
    /// Proactive session ended
    SessionEnd,
    /// Card inserted or removed
    CardPresence(bool),
    /// Card ready for menu selections
    SessionReady,
}

/// Recording transport, application and icon loader for one slot.
pub struct MockCat {
    slot: usize,
    icon_records: HashSet<u8>,
    events_tx: mpsc::UnboundedSender<MockCatEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<MockCatEvent>>,
    commands: Mutex<Vec<CatCmdMessage>>,
}

impl MockCat {
    /// Creates a mock whose icon loader has no records.
    pub fn new(slot: usize) -> Self {
        Self::with_icon_records(slot, [])
    }

    /// Creates a mock whose icon loader serves the given records.
    pub fn with_icon_records(slot: usize, records: impl IntoIterator<Item = u8>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            slot,
            icon_records: records.into_iter().collect(),
            events_tx,
            events_rx: Mutex::new(events_rx),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Collaborators that all point at this mock.
    pub fn collaborators(self: &Arc<Self>) -> SlotCollaborators {
        SlotCollaborators::new(self.clone(), self.clone(), self.clone())
    }

    fn record(&self, event: MockCatEvent) {
        // Receiver lives as long as the mock
        let _ = self.events_tx.send(event);
    }

    /// Waits for the next recorded event.
    pub async fn next_event(&self) -> Result<MockCatEvent, MockCatError> {
        self.next_event_within(DEFAULT_TEST_TIMEOUT).await
    }

    pub async fn next_event_within(&self, wait: Duration) -> Result<MockCatEvent, MockCatError> {
        let mut rx = self.events_rx.lock().await;
        match timeout(wait, rx.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(MockCatError::Closed),
            Err(_) => Err(MockCatError::Timeout(wait)),
        }
    }

    /// Asserts that nothing is recorded within `wait`.
    pub async fn expect_no_event(&self, wait: Duration) -> Result<(), MockCatError> {
        match self.next_event_within(wait).await {
            Ok(event) => Err(MockCatError::Unexpected(event)),
            Err(MockCatError::Timeout(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Waits for the next Terminal Response, failing on any other event.
    pub async fn next_terminal_response(&self) -> Result<String, MockCatError> {
        match self.next_event().await? {
            MockCatEvent::TerminalResponse(hex) => Ok(hex),
            other => Err(MockCatError::Unexpected(other)),
        }
    }

    /// Waits for the next presented command, failing on any other event.
    pub async fn next_command(&self) -> Result<CommandDetails, MockCatError> {
        match self.next_event().await? {
            MockCatEvent::Command(details) => Ok(details),
            other => Err(MockCatError::Unexpected(other)),
        }
    }

    /// The most recently presented command.
    pub async fn last_command(&self) -> Option<CatCmdMessage> {
        self.commands.lock().await.last().cloned()
    }
}

#[async_trait]
impl CatTransport for MockCat {
    async fn send_terminal_response(&self, hex: String) {
        self.record(MockCatEvent::TerminalResponse(hex));
    }

    async fn send_envelope(&self, hex: String) {
        self.record(MockCatEvent::Envelope(hex));
    }

    async fn request_call_setup_ack(&self, accept: bool) {
        self.record(MockCatEvent::CallSetupAck(accept));
    }
}

#[async_trait]
impl CatApplication for MockCat {
    async fn notify_command(&self, cmd: CatCmdMessage) {
        let details = *cmd.details();
        self.commands.lock().await.push(cmd);
        self.record(MockCatEvent::Command(details));
    }

    async fn notify_session_end(&self) {
        self.record(MockCatEvent::SessionEnd);
    }

    async fn notify_card_presence(&self, present: bool) {
        self.record(MockCatEvent::CardPresence(present));
    }

    async fn notify_session_ready(&self) {
        self.record(MockCatEvent::SessionReady);
    }
}

#[async_trait]
impl IconLoader for MockCat {
    async fn load_icon(&self, record: u8) -> Result<Vec<u8>, IconLoadError> {
        if self.icon_records.contains(&record) {
            // 1x1 basic image, one black pixel
            Ok(vec![0x01, 0x01, 0x80])
        } else {
            Err(IconLoadError::NotFound(record))
        }
    }
}

/// One slot of a running registry together with its mock.
#[derive(Clone)]
pub struct TestSlot {
    pub handle: SlotHandle,
    pub cat: Arc<MockCat>,
}

/// A registry whose every slot is backed by a [`MockCat`].
pub struct TestHarness {
    pub registry: SessionRegistry,
    cats: Vec<Arc<MockCat>>,
}

impl TestHarness {
    /// Starts a registry for `config`, one mock per slot.
    pub fn start(config: CatConfig) -> Result<Self, RegistryError> {
        Self::start_with_icons(config, [])
    }

    /// Starts a registry whose mocks serve the given icon records.
    pub fn start_with_icons(
        config: CatConfig,
        records: impl IntoIterator<Item = u8>,
    ) -> Result<Self, RegistryError> {
        let records: Vec<u8> = records.into_iter().collect();
        let cats: Vec<Arc<MockCat>> = (0..config.slot_count)
            .map(|slot| Arc::new(MockCat::with_icon_records(slot, records.iter().copied())))
            .collect();

        let factory_cats = cats.clone();
        let registry =
            SessionRegistry::new(config, move |slot: usize| factory_cats[slot].collaborators())?;

        Ok(Self { registry, cats })
    }

    /// Handle and mock of `slot`.
    pub fn slot(&self, slot: usize) -> Result<TestSlot, RegistryError> {
        Ok(TestSlot {
            handle: self.registry.slot(slot)?,
            cat: self.cats[slot].clone(),
        })
    }

    /// Stops every slot.
    pub async fn shutdown(self) -> Result<(), RegistryError> {
        self.registry.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_recorded_in_order() {
        let cat = MockCat::new(0);
        cat.send_terminal_response("8103".to_string()).await;
        cat.request_call_setup_ack(true).await;
        cat.notify_session_end().await;

        assert_eq!(
            cat.next_event().await.unwrap(),
            MockCatEvent::TerminalResponse("8103".to_string())
        );
        assert_eq!(cat.next_event().await.unwrap(), MockCatEvent::CallSetupAck(true));
        assert_eq!(cat.next_event().await.unwrap(), MockCatEvent::SessionEnd);
        assert!(cat.expect_no_event(Duration::from_millis(20)).await.is_ok());
    }

    #[tokio::test]
    async fn test_icon_records() {
        let cat = MockCat::with_icon_records(0, [1, 2]);
        assert!(cat.load_icon(1).await.is_ok());
        assert_eq!(cat.load_icon(3).await, Err(IconLoadError::NotFound(3)));
    }

    #[tokio::test]
    async fn test_harness_slots() {
        let config = CatConfig {
            slot_count: 2,
            ..Default::default()
        };
        let harness = TestHarness::start(config).unwrap();
        assert_eq!(harness.slot(1).unwrap().cat.slot(), 1);
        assert!(harness.slot(2).is_err());
        harness.shutdown().await.unwrap();
    }
}
