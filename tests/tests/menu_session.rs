//! Main menu scenarios: installation, removal, re-arming at session end and
//! menu selection.

use std::time::Duration;

use integration_tests::test_fixtures::{
    menu_selection_hex, remove_menu, set_up_menu, TerminalResponse,
};
use integration_tests::{init_test_logging, MockCatEvent, TestHarness, TestResult};
use simcat_common::CatConfig;
use simcat_proto::{CatResponseMessage, CommandType, ResultCode};
use simcat_terminal::SessionState;

const QUIET: Duration = Duration::from_millis(100);

#[tokio::test]
async fn test_menu_installed_and_acknowledged() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(set_up_menu(1).hex()).await?;

    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(1, CommandType::SetUpMenu, 0x00, 0x00).hex()
    );
    let details = slot.cat.next_command().await?;
    assert!(details.is(CommandType::SetUpMenu));

    let menu = slot.cat.last_command().await.and_then(|cmd| cmd.menu().cloned());
    let titles: Vec<String> = menu
        .map(|menu| menu.items.into_iter().flatten().map(|item| item.text).collect())
        .unwrap_or_default();
    assert_eq!(titles, vec!["News".to_string(), "Games".to_string()]);

    let snapshot = slot.handle.session_snapshot().await?;
    assert_eq!(snapshot.menu, Some(details));
    assert_eq!(snapshot.state, SessionState::Idle);

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_session_end_rearms_menu_selection() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(set_up_menu(1).hex()).await?;
    slot.cat.next_terminal_response().await?;
    let menu = slot.cat.next_command().await?;

    slot.handle.submit_session_end().await?;
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::SessionEnd);
    assert_eq!(slot.handle.session_snapshot().await?.current, Some(menu));

    slot.handle
        .submit_response(CatResponseMessage::new(menu, ResultCode::Ok).with_menu_selection(2))
        .await?;
    assert_eq!(
        slot.cat.next_event().await?,
        MockCatEvent::Envelope(menu_selection_hex(2, false))
    );

    // Selection with help requested
    slot.handle
        .submit_response(
            CatResponseMessage::new(menu, ResultCode::HelpInfoRequired).with_menu_selection(1),
        )
        .await?;
    assert_eq!(
        slot.cat.next_event().await?,
        MockCatEvent::Envelope(menu_selection_hex(1, true))
    );

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_menu_removal() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(set_up_menu(1).hex()).await?;
    slot.cat.next_terminal_response().await?;
    slot.cat.next_command().await?;

    slot.handle.submit_envelope(remove_menu(2).hex()).await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(2, CommandType::SetUpMenu, 0x00, 0x00).hex()
    );
    slot.cat.next_command().await?;
    assert_eq!(slot.handle.session_snapshot().await?.menu, None);

    // Nothing to re-arm
    slot.handle.submit_session_end().await?;
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::SessionEnd);
    assert_eq!(slot.handle.session_snapshot().await?.current, None);
    slot.cat.expect_no_event(QUIET).await?;

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_menu_icon_result() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start_with_icons(CatConfig::default(), [7])?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(set_up_menu(1).icon(7).hex()).await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(1, CommandType::SetUpMenu, 0x00, 0x00).hex()
    );
    slot.cat.next_command().await?;

    slot.handle.submit_envelope(set_up_menu(2).icon(8).hex()).await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(2, CommandType::SetUpMenu, 0x00, 0x04).hex()
    );
    slot.cat.next_command().await?;
    assert!(slot
        .cat
        .last_command()
        .await
        .is_some_and(|cmd| cmd.load_icon_failed()));

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_menu_response_without_selection_ignored() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(set_up_menu(1).hex()).await?;
    slot.cat.next_terminal_response().await?;
    let menu = slot.cat.next_command().await?;

    slot.handle
        .submit_response(CatResponseMessage::new(menu, ResultCode::Ok))
        .await?;
    slot.cat.expect_no_event(QUIET).await?;

    harness.shutdown().await?;
    Ok(())
}
