//! Card presence signals, ordering of transport events and independence of
//! slots served by one registry.

use std::time::Duration;

use integration_tests::test_fixtures::{display_text, set_up_menu, TerminalResponse};
use integration_tests::{
    init_test_logging, wait_for_condition, MockCatEvent, TestHarness, TestResult,
    DEFAULT_POLL_INTERVAL, DEFAULT_TEST_TIMEOUT,
};
use simcat_common::CatConfig;
use simcat_proto::{CatResponseMessage, CommandType, ResultCode};
use simcat_terminal::{TaskError, TaskId, TaskState};

const QUIET: Duration = Duration::from_millis(100);

#[tokio::test]
async fn test_card_insertion_and_removal() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_card_state(true).await?;
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::CardPresence(true));
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::SessionReady);

    // Repeated presence is not a new session
    slot.handle.submit_card_state(true).await?;
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::CardPresence(true));
    slot.cat.expect_no_event(QUIET).await?;

    slot.handle.submit_envelope(set_up_menu(1).hex()).await?;
    slot.cat.next_terminal_response().await?;
    slot.cat.next_command().await?;
    slot.handle.submit_envelope(display_text(2, "Hi").hex()).await?;
    slot.cat.next_command().await?;

    slot.handle.submit_card_state(false).await?;
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::CardPresence(false));
    let snapshot = slot.handle.session_snapshot().await?;
    assert_eq!(snapshot.menu, None);
    assert_eq!(snapshot.current, None);
    assert_eq!(snapshot.card_present, Some(false));

    slot.handle.submit_card_state(true).await?;
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::CardPresence(true));
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::SessionReady);

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_transport_events_keep_order() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(set_up_menu(1).hex()).await?;
    slot.handle.submit_session_end().await?;
    slot.handle.submit_call_setup_event().await?;
    slot.handle.submit_card_state(true).await?;

    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(1, CommandType::SetUpMenu, 0x00, 0x00).hex()
    );
    let menu = slot.cat.next_command().await?;
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::SessionEnd);
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::CardPresence(true));
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::SessionReady);
    assert_eq!(slot.handle.session_snapshot().await?.current, Some(menu));

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_slots_are_independent() -> TestResult {
    init_test_logging();
    let config = CatConfig {
        slot_count: 2,
        ..Default::default()
    };
    let harness = TestHarness::start(config)?;
    let first = harness.slot(0)?;
    let second = harness.slot(1)?;

    first.handle.submit_envelope(display_text(1, "One").hex()).await?;
    second.handle.submit_envelope(set_up_menu(1).hex()).await?;

    let shown = first.cat.next_command().await?;
    assert!(shown.is(CommandType::DisplayText));
    assert_eq!(
        second.cat.next_terminal_response().await?,
        TerminalResponse::new(1, CommandType::SetUpMenu, 0x00, 0x00).hex()
    );
    second.cat.next_command().await?;

    // A response routed to the wrong slot finds nothing to answer
    second
        .handle
        .submit_response(CatResponseMessage::new(shown, ResultCode::Ok))
        .await?;
    second.cat.expect_no_event(QUIET).await?;
    first.cat.expect_no_event(QUIET).await?;

    first
        .handle
        .submit_response(CatResponseMessage::new(shown, ResultCode::Ok))
        .await?;
    assert_eq!(
        first.cat.next_terminal_response().await?,
        TerminalResponse::new(1, CommandType::DisplayText, 0x80, 0x00).hex()
    );

    assert!(first.handle.session_snapshot().await?.menu.is_none());
    assert!(second.handle.session_snapshot().await?.menu.is_some());

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_slot_tasks_running_then_stopped() -> TestResult {
    init_test_logging();
    let config = CatConfig {
        slot_count: 3,
        ..Default::default()
    };
    let harness = TestHarness::start(config)?;
    assert_eq!(harness.registry.slot_count(), 3);

    let registry = &harness.registry;
    wait_for_condition(
        move || async move {
            (0..3).all(|slot| {
                registry.status(slot).is_some_and(|tasks| {
                    tasks.iter().all(|(_, state)| *state == TaskState::Running)
                })
            })
        },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await?;

    let status = harness.registry.status(0).unwrap_or_default();
    let ids: Vec<TaskId> = status.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![TaskId::Decoder, TaskId::Dispatcher]);

    let handle = harness.slot(2)?.handle;
    harness.shutdown().await?;

    assert!(matches!(
        handle.submit_envelope(display_text(1, "late").hex()).await,
        Err(TaskError::ChannelClosed { slot: 2, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_invalid_slot_count_rejected() {
    init_test_logging();
    let config = CatConfig {
        slot_count: 0,
        ..Default::default()
    };
    assert!(TestHarness::start(config).is_err());
}
