//! Application-facing command view and response decision

use std::sync::Arc;

use crate::enums::{CommandType, ResultCode};
use crate::params::{
    BrowserSettings, CallSettings, CommandDetails, CommandKind, CommandParams, Input, Menu,
    TextMessage, ToneSettings,
};

/// Read-only view of a decoded command, as handed to the application.
///
/// Cloning is cheap; every clone shares the same parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatCmdMessage {
    params: Arc<CommandParams>,
}

impl CatCmdMessage {
    pub fn new(params: CommandParams) -> Self {
        Self {
            params: Arc::new(params),
        }
    }

    pub fn details(&self) -> &CommandDetails {
        &self.params.details
    }

    pub fn command_type(&self) -> Option<CommandType> {
        self.params.command_type()
    }

    pub fn load_icon_failed(&self) -> bool {
        self.params.load_icon_failed
    }

    pub fn params(&self) -> &CommandParams {
        &self.params
    }

    /// Text of DISPLAY TEXT, idle mode text, PLAY TONE, SEND *, and BIP commands.
    pub fn text_message(&self) -> Option<&TextMessage> {
        match &self.params.kind {
            CommandKind::DisplayText(text)
            | CommandKind::SetUpIdleModeText(text)
            | CommandKind::Send(text)
            | CommandKind::PlayTone { text, .. }
            | CommandKind::BipClient { text, .. } => Some(text),
            CommandKind::LaunchBrowser(browser) => Some(&browser.confirm),
            _ => None,
        }
    }

    /// Menu of SELECT ITEM and SET UP MENU.
    pub fn menu(&self) -> Option<&Menu> {
        match &self.params.kind {
            CommandKind::SelectItem(menu) | CommandKind::SetUpMenu(menu) => Some(menu),
            _ => None,
        }
    }

    /// Input constraints of GET INKEY and GET INPUT.
    pub fn input(&self) -> Option<&Input> {
        match &self.params.kind {
            CommandKind::GetInput(input) => Some(input),
            _ => None,
        }
    }

    pub fn browser_settings(&self) -> Option<&BrowserSettings> {
        match &self.params.kind {
            CommandKind::LaunchBrowser(browser) => Some(browser),
            _ => None,
        }
    }

    pub fn tone_settings(&self) -> Option<&ToneSettings> {
        match &self.params.kind {
            CommandKind::PlayTone { settings, .. } => Some(settings),
            _ => None,
        }
    }

    pub fn call_settings(&self) -> Option<&CallSettings> {
        match &self.params.kind {
            CommandKind::SetUpCall(call) => Some(call),
            _ => None,
        }
    }

    /// Events requested by SET UP EVENT LIST.
    pub fn event_list(&self) -> Option<&[u8]> {
        match &self.params.kind {
            CommandKind::SetUpEventList { events } => Some(events),
            _ => None,
        }
    }

    /// Language of LANGUAGE NOTIFICATION.
    pub fn language(&self) -> Option<&str> {
        match &self.params.kind {
            CommandKind::LanguageNotification { language } => language.as_deref(),
            _ => None,
        }
    }

    /// Whether a BIP command carried an ALPHA IDENTIFIER object.
    pub fn has_alpha_id(&self) -> bool {
        matches!(
            self.params.kind,
            CommandKind::BipClient {
                has_alpha_id: true,
                ..
            }
        )
    }
}

/// The application's decision for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatResponseMessage {
    /// Details of the command being answered
    pub cmd_det: CommandDetails,
    pub result_code: ResultCode,
    pub additional_info: Option<u8>,
    /// Selected item identifier
    pub menu_selection: Option<u8>,
    /// Text entered by the user
    pub user_input: Option<String>,
    /// Answer to a yes/no GET INKEY
    pub yes_no: Option<bool>,
    /// Confirmation of SET UP CALL / OPEN CHANNEL
    pub confirm: Option<bool>,
    /// Event to download, for SET UP EVENT LIST
    pub event_value: Option<u8>,
    /// Extra event download payload
    pub event_payload: Option<Vec<u8>>,
}

impl CatResponseMessage {
    pub fn new(cmd_det: CommandDetails, result_code: ResultCode) -> Self {
        Self {
            cmd_det,
            result_code,
            additional_info: None,
            menu_selection: None,
            user_input: None,
            yes_no: None,
            confirm: None,
            event_value: None,
            event_payload: None,
        }
    }

    /// Answers `cmd` with `result_code`.
    pub fn for_command(cmd: &CatCmdMessage, result_code: ResultCode) -> Self {
        Self::new(*cmd.details(), result_code)
    }

    pub fn with_additional_info(mut self, info: u8) -> Self {
        self.additional_info = Some(info);
        self
    }

    pub fn with_menu_selection(mut self, item_id: u8) -> Self {
        self.menu_selection = Some(item_id);
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.user_input = Some(input.into());
        self
    }

    pub fn with_yes_no(mut self, yes: bool) -> Self {
        self.yes_no = Some(yes);
        self
    }

    pub fn with_confirmation(mut self, accept: bool) -> Self {
        self.confirm = Some(accept);
        self
    }

    pub fn with_event(mut self, event: u8, payload: Option<Vec<u8>>) -> Self {
        self.event_value = Some(event);
        self.event_payload = payload;
        self
    }
}
