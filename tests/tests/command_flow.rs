//! Command routing and response correlation through a running slot.

use std::time::Duration;

use integration_tests::test_fixtures::{
    display_text, get_inkey_yes_no, get_input, more_time, open_channel, set_up_call,
    set_up_event_list, EnvelopeBuilder, TerminalResponse,
};
use integration_tests::{init_test_logging, MockCatEvent, TestHarness, TestResult};
use simcat_common::{CatConfig, UnsupportedCommandPolicy};
use simcat_proto::{CatResponseMessage, CommandType, ComprehensionTag, ResultCode};
use simcat_terminal::SessionState;

const QUIET: Duration = Duration::from_millis(100);

#[tokio::test]
async fn test_display_text_busy_screen() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(display_text(1, "Hello").hex()).await?;
    let details = slot.cat.next_command().await?;
    assert_eq!(
        slot.handle.session_snapshot().await?.state,
        SessionState::AwaitingResponse
    );

    slot.handle
        .submit_response(CatResponseMessage::new(
            details,
            ResultCode::TerminalCrntlyUnableToProcess,
        ))
        .await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(1, CommandType::DisplayText, 0x80, 0x20)
            .additional_info(0x01)
            .hex()
    );
    assert_eq!(slot.handle.session_snapshot().await?.current, None);

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_stale_response_dropped() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(display_text(1, "One").hex()).await?;
    let first = slot.cat.next_command().await?;
    slot.handle.submit_envelope(display_text(2, "Two").hex()).await?;
    let second = slot.cat.next_command().await?;

    slot.handle
        .submit_response(CatResponseMessage::new(first, ResultCode::Ok))
        .await?;
    slot.cat.expect_no_event(QUIET).await?;

    slot.handle
        .submit_response(CatResponseMessage::new(second, ResultCode::Ok))
        .await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(2, CommandType::DisplayText, 0x80, 0x00).hex()
    );

    // Answered once only
    slot.handle
        .submit_response(CatResponseMessage::new(second, ResultCode::Ok))
        .await?;
    slot.cat.expect_no_event(QUIET).await?;

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_get_inkey_yes_no() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle
        .submit_envelope(get_inkey_yes_no(5, "Continue?").hex())
        .await?;
    let details = slot.cat.next_command().await?;

    slot.handle
        .submit_response(CatResponseMessage::new(details, ResultCode::Ok).with_yes_no(true))
        .await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(5, CommandType::GetInkey, 0x04, 0x00)
            .data(&[0x8D, 0x02, 0x04, 0x01])
            .hex()
    );

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_get_input_help_request() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle
        .submit_envelope(get_input(6, "PIN?", 4, 8).hex())
        .await?;
    let details = slot.cat.next_command().await?;
    let input = slot.cat.last_command().await.and_then(|cmd| cmd.input().cloned());
    assert_eq!(input.map(|input| (input.min_len, input.max_len)), Some((4, 8)));

    slot.handle
        .submit_response(CatResponseMessage::new(details, ResultCode::HelpInfoRequired))
        .await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(6, CommandType::GetInput, 0x01, 0x13).hex()
    );

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_set_up_call_rejected_by_user() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(set_up_call(7).hex()).await?;
    let details = slot.cat.next_command().await?;

    slot.handle
        .submit_response(CatResponseMessage::new(details, ResultCode::UserNotAccept))
        .await?;
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::CallSetupAck(false));
    slot.cat.expect_no_event(QUIET).await?;
    assert_eq!(slot.handle.session_snapshot().await?.current, None);

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_set_up_call_session_terminated() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(set_up_call(9).hex()).await?;
    let details = slot.cat.next_command().await?;

    slot.handle
        .submit_response(
            CatResponseMessage::new(details, ResultCode::UiccSessionTermByUser)
                .with_confirmation(true),
        )
        .await?;
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::CallSetupAck(false));
    slot.cat.expect_no_event(QUIET).await?;
    assert_eq!(slot.handle.session_snapshot().await?.current, None);

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_set_up_call_confirmed() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(set_up_call(8).hex()).await?;
    let details = slot.cat.next_command().await?;

    slot.handle
        .submit_response(CatResponseMessage::new(details, ResultCode::Ok).with_confirmation(true))
        .await?;
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::CallSetupAck(true));

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_length_mismatch_rejected() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle
        .submit_envelope(display_text(3, "x").corrupt_length(-1).hex())
        .await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(3, CommandType::DisplayText, 0x80, 0x32).hex()
    );
    slot.cat.expect_no_event(QUIET).await?;

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_hex_dropped() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope("d0zz").await?;
    slot.cat.expect_no_event(QUIET).await?;

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_event_list_support() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle
        .submit_envelope(set_up_event_list(4, &[0x05, 0x07]).hex())
        .await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(4, CommandType::SetUpEventList, 0x00, 0x00).hex()
    );

    slot.handle
        .submit_envelope(set_up_event_list(5, &[0x05, 0x03]).hex())
        .await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(5, CommandType::SetUpEventList, 0x00, 0x30).hex()
    );

    // Never presented to the application
    slot.cat.expect_no_event(QUIET).await?;

    let details = simcat_proto::CommandDetails::new(4, CommandType::SetUpEventList, 0x00);
    slot.handle
        .submit_response(CatResponseMessage::new(details, ResultCode::Ok).with_event(0x05, None))
        .await?;
    assert_eq!(
        slot.cat.next_event().await?,
        MockCatEvent::Envelope("d60799010582020281".to_string())
    );

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_provide_language() -> TestResult {
    init_test_logging();
    let config = CatConfig {
        language: "fr".to_string(),
        ..Default::default()
    };
    let harness = TestHarness::start(config)?;
    let slot = harness.slot(0)?;

    slot.handle
        .submit_envelope(EnvelopeBuilder::new(9, CommandType::ProvideLocalInformation, 0x04).hex())
        .await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(9, CommandType::ProvideLocalInformation, 0x04, 0x00)
            .data(&[0xAD, 0x02, b'f', b'r'])
            .hex()
    );
    slot.cat.expect_no_event(QUIET).await?;

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_open_channel_needs_confirmation() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(open_channel(10).hex()).await?;
    let details = slot.cat.next_command().await?;
    let text = slot
        .cat
        .last_command()
        .await
        .and_then(|cmd| cmd.text_message().and_then(|text| text.text.clone()));
    assert_eq!(text.as_deref(), Some(simcat_common::DEFAULT_ALPHA_TEXT));

    slot.handle
        .submit_response(CatResponseMessage::new(details, ResultCode::Ok).with_confirmation(true))
        .await?;
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::CallSetupAck(true));

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_open_channel_without_confirmation() -> TestResult {
    init_test_logging();
    let config = CatConfig {
        no_alpha_user_confirmation: true,
        ..Default::default()
    };
    let harness = TestHarness::start(config)?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(open_channel(11).hex()).await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(11, CommandType::OpenChannel, 0x01, 0x00).hex()
    );
    slot.cat.expect_no_event(QUIET).await?;

    // Empty alpha identifier from an event notification
    slot.handle
        .submit_event_notify(open_channel(12).tlv(ComprehensionTag::AlphaId, &[]).hex())
        .await?;
    assert_eq!(slot.cat.next_event().await?, MockCatEvent::CallSetupAck(true));

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_send_data_acknowledged_after_notification() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle
        .submit_envelope(EnvelopeBuilder::new(13, CommandType::SendData, 0x00).alpha("Sending").hex())
        .await?;
    slot.cat.next_command().await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(13, CommandType::SendData, 0x00, 0x00).hex()
    );

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_unsupported_command_answered() -> TestResult {
    init_test_logging();
    let harness = TestHarness::start(CatConfig::default())?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(more_time(14).hex()).await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(14, CommandType::MoreTime, 0x00, 0x32).hex()
    );

    slot.handle
        .submit_envelope(EnvelopeBuilder::raw_type(15, 0x7E, 0x00).hex())
        .await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::raw_type(15, 0x7E, 0x00, 0x32).hex()
    );

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_unsupported_command_dropped() -> TestResult {
    init_test_logging();
    let config = CatConfig {
        unsupported_command_policy: UnsupportedCommandPolicy::Drop,
        ..Default::default()
    };
    let harness = TestHarness::start(config)?;
    let slot = harness.slot(0)?;

    slot.handle.submit_envelope(more_time(16).hex()).await?;
    slot.cat.expect_no_event(QUIET).await?;

    // Other decode failures are still answered
    slot.handle
        .submit_envelope(display_text(17, "x").corrupt_length(-1).hex())
        .await?;
    assert_eq!(
        slot.cat.next_terminal_response().await?,
        TerminalResponse::new(17, CommandType::DisplayText, 0x80, 0x32).hex()
    );

    harness.shutdown().await?;
    Ok(())
}
