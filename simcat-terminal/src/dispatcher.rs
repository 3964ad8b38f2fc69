//! Session Dispatcher task
//!
//! The dispatcher owns the slot's [`Session`] and serializes everything that
//! touches it: decoded commands, decode failures, application responses and
//! transport lifecycle signals. Each message is handled to completion,
//! including the outbound calls it causes, before the next one is read.
//!
//! # Command routing
//!
//! | Command | Handling |
//! |---------|----------|
//! | SET UP MENU | stored (or removed), acknowledged, shown |
//! | SET UP IDLE MODE TEXT, REFRESH | acknowledged, shown |
//! | SET UP EVENT LIST | acknowledged, never shown |
//! | PROVIDE LOCAL INFORMATION | answered locally |
//! | LANGUAGE NOTIFICATION | acknowledged, shown |
//! | DISPLAY TEXT with immediate response | acknowledged, shown |
//! | everything else | becomes the outstanding command, shown |

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};
use simcat_common::{log_cat_message, CatConfig, Direction, UnsupportedCommandPolicy};
use simcat_proto::enums::{event, local_info};
use simcat_proto::response::{
    encode_event_download, encode_menu_selection, encode_terminal_response,
    ADDITIONAL_INFO_SCREEN_BUSY,
};
use simcat_proto::{
    CatCmdMessage, CatResponseMessage, CommandDetails, CommandKind, CommandParams, CommandType,
    DateTimeTimezone, DeviceIdentity, RejectedCommand, ResponseData, ResultCode,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::collab::{CatApplication, CatTransport};
use crate::session::Session;
use crate::tasks::{CommandOrigin, DispatcherMessage, Task, TaskMessage};

/// Source of the local date and time reported to the card.
pub type Clock = Box<dyn Fn() -> DateTime<FixedOffset> + Send + Sync>;

fn local_clock() -> DateTime<FixedOffset> {
    let now = Local::now();
    now.with_timezone(now.offset())
}

/// Session Dispatcher for one card slot.
pub struct DispatcherTask {
    slot: usize,
    config: CatConfig,
    session: Session,
    transport: Arc<dyn CatTransport>,
    application: Arc<dyn CatApplication>,
    clock: Clock,
}

impl DispatcherTask {
    pub fn new(
        slot: usize,
        config: CatConfig,
        transport: Arc<dyn CatTransport>,
        application: Arc<dyn CatApplication>,
    ) -> Self {
        Self {
            slot,
            config,
            session: Session::new(),
            transport,
            application,
            clock: Box::new(local_clock),
        }
    }

    /// Replaces the clock used for DATE, TIME AND TIME ZONE.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn handle_message(&mut self, msg: DispatcherMessage) {
        match msg {
            DispatcherMessage::Command { params, origin } => {
                self.handle_command(params, origin).await
            }
            DispatcherMessage::Rejected { rejected, origin } => {
                self.handle_rejected(rejected, origin).await
            }
            DispatcherMessage::Response(resp) => self.handle_response(resp).await,
            DispatcherMessage::SessionEnd => self.handle_session_end().await,
            DispatcherMessage::CallSetupEvent => {
                debug!(slot = self.slot, "Call set up event, nothing pending");
            }
            DispatcherMessage::CardState { present } => self.handle_card_state(present).await,
            DispatcherMessage::Snapshot(reply) => {
                let _ = reply.send(self.session.snapshot());
            }
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn handle_command(&mut self, params: CommandParams, origin: CommandOrigin) {
        let cmd = CatCmdMessage::new(params);
        let details = *cmd.details();
        info!(slot = self.slot, %origin, "Command {}", details);

        let icon_result = if cmd.load_icon_failed() {
            ResultCode::PrfrmdIconNotDisplayed
        } else {
            ResultCode::Ok
        };

        match &cmd.params().kind {
            CommandKind::SetUpMenu(menu) => {
                if menu.is_removal() {
                    info!(slot = self.slot, "Main menu removed");
                    self.session.clear_menu();
                } else {
                    debug!(slot = self.slot, items = menu.items.len(), "Main menu installed");
                    self.session.set_menu(cmd.clone());
                }
                self.send_terminal_response(&details, icon_result, None, None)
                    .await;
                self.application.notify_command(cmd).await;
            }
            CommandKind::SetUpIdleModeText(_) => {
                self.send_terminal_response(&details, icon_result, None, None)
                    .await;
                self.application.notify_command(cmd).await;
            }
            CommandKind::Refresh { clears_idle_text } => {
                let forward = *clears_idle_text;
                self.send_terminal_response(&details, ResultCode::Ok, None, None)
                    .await;
                if forward {
                    self.application.notify_command(cmd).await;
                }
            }
            CommandKind::SetUpEventList { events } => {
                let result = match events.iter().find(|code| !event::is_supported(**code)) {
                    Some(code) => {
                        warn!(slot = self.slot, event = code, "Unsupported event requested");
                        ResultCode::BeyondTerminalCapability
                    }
                    None => ResultCode::Ok,
                };
                self.send_terminal_response(&details, result, None, None)
                    .await;
            }
            CommandKind::ProvideLocalInformation => {
                self.provide_local_information(&details).await;
            }
            CommandKind::LanguageNotification { language } => {
                debug!(slot = self.slot, language = ?language, "Language notification");
                self.send_terminal_response(&details, ResultCode::Ok, None, None)
                    .await;
                self.application.notify_command(cmd).await;
            }
            CommandKind::BipClient { text, has_alpha_id } => {
                if text.text.is_none() && (*has_alpha_id || self.config.no_alpha_user_confirmation)
                {
                    debug!(slot = self.slot, "BIP command needs no user confirmation");
                    match origin {
                        CommandOrigin::Proactive => {
                            self.send_terminal_response(&details, ResultCode::Ok, None, None)
                                .await;
                        }
                        CommandOrigin::EventNotify if details.is(CommandType::OpenChannel) => {
                            self.transport.request_call_setup_ack(true).await;
                        }
                        CommandOrigin::EventNotify => {}
                    }
                    return;
                }

                let auto_ack = origin == CommandOrigin::Proactive
                    && (details.is(CommandType::CloseChannel)
                        || details.is(CommandType::ReceiveData)
                        || details.is(CommandType::SendData));
                self.session.set_current(cmd.clone());
                self.application.notify_command(cmd).await;
                if auto_ack {
                    self.send_terminal_response(&details, ResultCode::Ok, None, None)
                        .await;
                }
            }
            CommandKind::DisplayText(text) if !text.response_needed => {
                debug!(slot = self.slot, "Immediate response requested");
                self.session.clear_current();
                self.send_terminal_response(&details, icon_result, None, None)
                    .await;
                self.application.notify_command(cmd).await;
            }
            CommandKind::DisplayText(_)
            | CommandKind::GetInput(_)
            | CommandKind::SelectItem(_)
            | CommandKind::LaunchBrowser(_)
            | CommandKind::PlayTone { .. }
            | CommandKind::SetUpCall(_)
            | CommandKind::Send(_)
            | CommandKind::GetChannelStatus => {
                self.session.set_current(cmd.clone());
                self.application.notify_command(cmd).await;
            }
        }
    }

    async fn provide_local_information(&mut self, details: &CommandDetails) {
        let payload = match details.command_qualifier {
            local_info::DATE_TIME_TIMEZONE => {
                let now = (self.clock)();
                let local_offset = now.offset().local_minus_utc() / 60;
                let offset = self.config.utc_offset_minutes(local_offset);
                ResponseData::DateTimeTimezone(DateTimeTimezone::from_datetime(&now, offset))
            }
            local_info::LANGUAGE => ResponseData::Language(Some(self.config.language.clone())),
            qualifier => {
                warn!(slot = self.slot, qualifier, "Local information not available");
                self.send_terminal_response(
                    details,
                    ResultCode::BeyondTerminalCapability,
                    None,
                    None,
                )
                .await;
                return;
            }
        };
        self.send_terminal_response(details, ResultCode::Ok, None, Some(&payload))
            .await;
    }

    async fn handle_rejected(&mut self, rejected: RejectedCommand, origin: CommandOrigin) {
        if origin == CommandOrigin::EventNotify {
            debug!(slot = self.slot, error = %rejected, "Dropping undecodable event notification");
            return;
        }
        if rejected.is_unsupported_command()
            && self.config.unsupported_command_policy == UnsupportedCommandPolicy::Drop
        {
            warn!(slot = self.slot, error = %rejected, "Dropping unsupported command");
            return;
        }
        let Some(details) = rejected.details else {
            warn!(slot = self.slot, error = %rejected, "Rejected command has no details, dropping");
            return;
        };

        let result = rejected.result_code();
        warn!(slot = self.slot, error = %rejected, ?result, "Rejecting {}", details);
        self.send_terminal_response(&details, result, None, None)
            .await;
    }

    // ========================================================================
    // Responses
    // ========================================================================

    async fn handle_response(&mut self, resp: CatResponseMessage) {
        let Some(resp_type) = resp.cmd_det.command_type() else {
            warn!(slot = self.slot, "Response for unknown command type 0x{:02X}", resp.cmd_det.type_of_command);
            return;
        };

        let result = resp.result_code;
        let help = result == ResultCode::HelpInfoRequired;
        let accepted = result.is_success() || help;

        // Menu and event list replies travel without consuming the outstanding command
        let detached = matches!(resp_type, CommandType::SetUpEventList | CommandType::SetUpMenu);
        if !detached && !self.session.matches_current(&resp.cmd_det) {
            debug!(slot = self.slot, "Dropping stale response for {}", resp.cmd_det);
            return;
        }
        debug!(slot = self.slot, ?result, "Response for {}", resp.cmd_det);

        match resp_type {
            CommandType::SetUpMenu => match resp.menu_selection {
                Some(item_id) if accepted => self.send_menu_selection(item_id, help).await,
                Some(_) => debug!(slot = self.slot, ?result, "Menu left without a selection"),
                None => warn!(slot = self.slot, "Menu response without a selection"),
            },
            CommandType::SetUpEventList => match resp.event_value {
                Some(code) if accepted => {
                    self.send_event_download(code, resp.event_payload.as_deref())
                        .await
                }
                Some(code) => debug!(slot = self.slot, event = code, ?result, "Event not reported"),
                None => warn!(slot = self.slot, "Event list response without an event"),
            },
            CommandType::SetUpCall | CommandType::OpenChannel => {
                let accept = accepted && resp.confirm.unwrap_or(false);
                info!(slot = self.slot, accept, ?result, "Call set up confirmation");
                self.transport.request_call_setup_ack(accept).await;
                self.session.clear_current();
            }
            CommandType::DisplayText
            | CommandType::GetInkey
            | CommandType::GetInput
            | CommandType::SelectItem
            | CommandType::LaunchBrowser
            | CommandType::PlayTone
            | CommandType::SendDtmf
            | CommandType::SendSms
            | CommandType::SendSs
            | CommandType::SendUssd
            | CommandType::CloseChannel
            | CommandType::ReceiveData
            | CommandType::SendData
            | CommandType::GetChannelStatus => {
                let (additional_info, payload) = self.response_contents(resp_type, &resp);
                self.send_terminal_response(&resp.cmd_det, result, additional_info, payload.as_ref())
                    .await;
                self.session.clear_current();
            }
            CommandType::Refresh
            | CommandType::MoreTime
            | CommandType::PollInterval
            | CommandType::PollingOff
            | CommandType::SetUpIdleModeText
            | CommandType::ProvideLocalInformation
            | CommandType::LanguageNotification => {
                warn!(slot = self.slot, "No response expected for {}", resp.cmd_det);
            }
        }
    }

    /// Additional information byte and response data for a Terminal Response
    /// answering the outstanding command.
    fn response_contents(
        &self,
        resp_type: CommandType,
        resp: &CatResponseMessage,
    ) -> (Option<u8>, Option<ResponseData>) {
        let result = resp.result_code;
        let input = self.session.current().and_then(|cmd| cmd.input());

        match result {
            ResultCode::HelpInfoRequired => {
                let payload = match (resp_type, input) {
                    (CommandType::GetInkey | CommandType::GetInput, Some(input)) if input.yes_no => {
                        Some(ResponseData::YesNo(resp.yes_no.unwrap_or(false)))
                    }
                    (CommandType::SelectItem, _) => resp
                        .menu_selection
                        .map(|item_id| ResponseData::SelectItem { item_id }),
                    _ => None,
                };
                (None, payload)
            }
            r if r.is_success() => {
                let payload = match (resp_type, input) {
                    (CommandType::GetInkey | CommandType::GetInput, Some(input)) => {
                        Some(if input.yes_no {
                            ResponseData::YesNo(resp.yes_no.unwrap_or(false))
                        } else {
                            ResponseData::Input {
                                text: resp.user_input.clone().unwrap_or_default(),
                                ucs2: input.ucs2,
                                packed: input.packed,
                            }
                        })
                    }
                    (CommandType::SelectItem, _) => resp
                        .menu_selection
                        .map(|item_id| ResponseData::SelectItem { item_id }),
                    _ => None,
                };
                (None, payload)
            }
            ResultCode::NoResponseFromUser => {
                let payload = match resp_type {
                    CommandType::GetInkey | CommandType::GetInput => input
                        .and_then(|input| input.duration)
                        .map(ResponseData::Duration),
                    _ => None,
                };
                (resp.additional_info, payload)
            }
            ResultCode::TerminalCrntlyUnableToProcess if resp_type == CommandType::DisplayText => {
                (Some(ADDITIONAL_INFO_SCREEN_BUSY), None)
            }
            ResultCode::LaunchBrowserError => (Some(resp.additional_info.unwrap_or(0x00)), None),
            _ => (resp.additional_info, None),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    async fn handle_session_end(&mut self) {
        self.session.end_session();
        info!(slot = self.slot, state = %self.session.state(), "Proactive session ended");
        self.application.notify_session_end().await;
    }

    async fn handle_card_state(&mut self, present: bool) {
        let previous = self.session.set_card_present(present);
        info!(slot = self.slot, present, "Card state changed");
        self.application.notify_card_presence(present).await;
        if present && previous != Some(true) {
            self.application.notify_session_ready().await;
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    async fn send_terminal_response(
        &self,
        details: &CommandDetails,
        result: ResultCode,
        additional_info: Option<u8>,
        payload: Option<&ResponseData>,
    ) {
        let encoded = match encode_terminal_response(details, result, additional_info, payload) {
            Ok(bytes) => bytes,
            Err(e) if payload.is_some() => {
                warn!(slot = self.slot, error = %e, "Response data not encodable, sending result only");
                match encode_terminal_response(details, result, additional_info, None) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        error!(slot = self.slot, error = %e, "Failed to encode Terminal Response");
                        return;
                    }
                }
            }
            Err(e) => {
                error!(slot = self.slot, error = %e, "Failed to encode Terminal Response");
                return;
            }
        };

        debug!(slot = self.slot, ?result, "Terminal Response for {}", details);
        log_cat_message(Direction::Tx, "Terminal Response", &encoded);
        self.transport
            .send_terminal_response(hex::encode(encoded))
            .await;
    }

    async fn send_menu_selection(&self, item_id: u8, help: bool) {
        match encode_menu_selection(item_id, help) {
            Ok(encoded) => {
                debug!(slot = self.slot, item_id, help, "Menu selection");
                log_cat_message(Direction::Tx, "Menu Selection", &encoded);
                self.transport.send_envelope(hex::encode(encoded)).await;
            }
            Err(e) => error!(slot = self.slot, error = %e, "Failed to encode menu selection"),
        }
    }

    async fn send_event_download(&self, code: u8, extra: Option<&[u8]>) {
        let source = if code == event::IDLE_SCREEN_AVAILABLE {
            DeviceIdentity::Display
        } else {
            DeviceIdentity::Terminal
        };
        match encode_event_download(code, source, DeviceIdentity::Uicc, extra) {
            Ok(encoded) => {
                debug!(slot = self.slot, event = code, "Event download");
                log_cat_message(Direction::Tx, "Event Download", &encoded);
                self.transport.send_envelope(hex::encode(encoded)).await;
            }
            Err(e) => error!(slot = self.slot, error = %e, "Failed to encode event download"),
        }
    }
}

#[async_trait::async_trait]
impl Task for DispatcherTask {
    type Message = DispatcherMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!(slot = self.slot, "Dispatcher task started");
        while let Some(msg) = rx.recv().await {
            match msg {
                TaskMessage::Message(msg) => self.handle_message(msg).await,
                TaskMessage::Shutdown => {
                    info!(slot = self.slot, "Dispatcher task received shutdown signal");
                    break;
                }
            }
        }
        trace!(slot = self.slot, state = %self.session.state(), "Dispatcher final state");
        info!(slot = self.slot, "Dispatcher task stopped");
    }
}
