//! Proactive command model
//!
//! A decoded proactive command is a [`CommandParams`]: the COMMAND DETAILS
//! header, the icon-load-failed flag shared by every command, and a
//! [`CommandKind`] holding the type-specific payload.

use std::fmt;

use crate::enums::{CommandType, LaunchBrowserMode, PresentationType, TimeUnit, Tone};

/// COMMAND DETAILS (ETSI TS 102 223 Section 8.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandDetails {
    /// Command number assigned by the card
    pub command_number: u8,
    /// Raw type of command; see [`CommandDetails::command_type`]
    pub type_of_command: u8,
    /// Command qualifier
    pub command_qualifier: u8,
    /// CR bit of the COMMAND DETAILS tag
    pub comp_required: bool,
}

impl CommandDetails {
    /// Creates command details for a known command type with the CR bit set.
    pub fn new(command_number: u8, command_type: CommandType, command_qualifier: u8) -> Self {
        Self {
            command_number,
            type_of_command: command_type.into(),
            command_qualifier,
            comp_required: true,
        }
    }

    /// The type of command, if this terminal knows it.
    pub fn command_type(&self) -> Option<CommandType> {
        CommandType::try_from(self.type_of_command).ok()
    }

    /// Returns true if the details carry `command_type`.
    pub fn is(&self, command_type: CommandType) -> bool {
        self.type_of_command == u8::from(command_type)
    }
}

impl fmt::Display for CommandDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command_type() {
            Some(t) => write!(f, "{} #{}", t, self.command_number)?,
            None => write!(f, "type 0x{:02X} #{}", self.type_of_command, self.command_number)?,
        }
        write!(f, " (qualifier 0x{:02X})", self.command_qualifier)
    }
}

/// DURATION (ETSI TS 102 223 Section 8.8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub unit: TimeUnit,
    /// Number of units, 1..=255
    pub interval: u8,
}

impl Duration {
    pub fn new(unit: TimeUnit, interval: u8) -> Self {
        Self { unit, interval }
    }

    /// Converts to a wall-clock duration.
    pub fn as_std(&self) -> std::time::Duration {
        let interval = self.interval as u64;
        match self.unit {
            TimeUnit::Minute => std::time::Duration::from_secs(interval * 60),
            TimeUnit::Second => std::time::Duration::from_secs(interval),
            TimeUnit::TenthSecond => std::time::Duration::from_millis(interval * 100),
        }
    }
}

/// An icon reference, filled with image data by the decode stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconRef {
    /// Record number in EF(IMG)
    pub record_number: u8,
    /// The icon replaces the accompanying text
    pub self_explanatory: bool,
    /// Raw image record, once loaded
    pub image: Option<Vec<u8>>,
}

impl IconRef {
    pub fn new(record_number: u8, self_explanatory: bool) -> Self {
        Self {
            record_number,
            self_explanatory,
            image: None,
        }
    }
}

/// Text shown to the user, with its presentation attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextMessage {
    pub text: Option<String>,
    pub icon: Option<IconRef>,
    /// DISPLAY TEXT qualifier bit 0
    pub is_high_priority: bool,
    /// False when IMMEDIATE RESPONSE was present
    pub response_needed: bool,
    /// DISPLAY TEXT qualifier bit 7: wait for the user to clear the message
    pub user_clear: bool,
    pub duration: Option<Duration>,
}

impl TextMessage {
    /// Plain text with no presentation attributes.
    pub fn with_text(text: Option<String>) -> Self {
        Self {
            text,
            response_needed: true,
            ..Default::default()
        }
    }

    /// True if the icon stands in for the text.
    pub fn icon_self_explanatory(&self) -> bool {
        self.icon.as_ref().is_some_and(|icon| icon.self_explanatory)
    }
}

/// GET INKEY / GET INPUT parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Input {
    /// Prompt
    pub text: Option<String>,
    pub default_text: Option<String>,
    pub icon: Option<IconRef>,
    pub min_len: u8,
    pub max_len: u8,
    pub ucs2: bool,
    pub packed: bool,
    pub digit_only: bool,
    pub echo: bool,
    pub yes_no: bool,
    pub help_available: bool,
    /// Variable timeout for GET INKEY
    pub duration: Option<Duration>,
}

/// A SELECT ITEM / SET UP MENU entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: u8,
    pub text: String,
    pub icon: Option<IconRef>,
}

/// SELECT ITEM / SET UP MENU parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Menu {
    pub title: Option<String>,
    pub title_icon: Option<IconRef>,
    /// Items in card order; `None` is an ITEM object with zero length
    pub items: Vec<Option<Item>>,
    /// Identifier of the default item
    pub default_item: Option<u8>,
    pub presentation: PresentationType,
    pub soft_key_preferred: bool,
    pub help_available: bool,
}

impl Menu {
    /// A SET UP MENU carrying a single empty item removes the menu.
    pub fn is_removal(&self) -> bool {
        matches!(self.items.as_slice(), [None])
    }

    /// Iterates over the non-empty items.
    pub fn entries(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().flatten()
    }

    /// Finds an item by identifier.
    pub fn item(&self, id: u8) -> Option<&Item> {
        self.entries().find(|item| item.id == id)
    }
}

/// LAUNCH BROWSER parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BrowserSettings {
    pub url: Option<String>,
    pub mode: LaunchBrowserMode,
    /// User confirmation text
    pub confirm: TextMessage,
}

/// PLAY TONE parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToneSettings {
    pub tone: Option<Tone>,
    pub duration: Option<Duration>,
    pub vibrate: bool,
}

/// SET UP CALL parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallSettings {
    /// User confirmation phase
    pub confirm: TextMessage,
    /// Call set up phase
    pub call: TextMessage,
}

/// Type-specific payload of a proactive command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    DisplayText(TextMessage),
    SetUpIdleModeText(TextMessage),
    /// REFRESH, handled as a possible removal of the idle mode text
    Refresh {
        clears_idle_text: bool,
    },
    /// GET INKEY and GET INPUT
    GetInput(Input),
    SelectItem(Menu),
    SetUpMenu(Menu),
    LaunchBrowser(BrowserSettings),
    PlayTone {
        text: TextMessage,
        settings: ToneSettings,
    },
    SetUpCall(CallSettings),
    /// SEND DTMF / SHORT MESSAGE / SS / USSD: informational text only
    Send(TextMessage),
    SetUpEventList {
        events: Vec<u8>,
    },
    ProvideLocalInformation,
    LanguageNotification {
        language: Option<String>,
    },
    /// OPEN CHANNEL, CLOSE CHANNEL, RECEIVE DATA, SEND DATA
    BipClient {
        text: TextMessage,
        has_alpha_id: bool,
    },
    GetChannelStatus,
}

/// A decoded proactive command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParams {
    pub details: CommandDetails,
    /// Set by the decode stage when at least one icon could not be loaded
    pub load_icon_failed: bool,
    pub kind: CommandKind,
}

impl CommandParams {
    pub fn new(details: CommandDetails, kind: CommandKind) -> Self {
        Self {
            details,
            load_icon_failed: false,
            kind,
        }
    }

    /// The command type. Every buildable command has a known type.
    pub fn command_type(&self) -> Option<CommandType> {
        self.details.command_type()
    }

    /// Every icon reference carried by the command, title icons first.
    pub fn icons_mut(&mut self) -> Vec<&mut IconRef> {
        fn push<'a>(icons: &mut Vec<&'a mut IconRef>, icon: &'a mut Option<IconRef>) {
            if let Some(icon) = icon.as_mut() {
                icons.push(icon);
            }
        }

        let mut icons = Vec::new();
        match &mut self.kind {
            CommandKind::DisplayText(text)
            | CommandKind::SetUpIdleModeText(text)
            | CommandKind::Send(text)
            | CommandKind::PlayTone { text, .. }
            | CommandKind::BipClient { text, .. } => push(&mut icons, &mut text.icon),
            CommandKind::GetInput(input) => push(&mut icons, &mut input.icon),
            CommandKind::SelectItem(menu) | CommandKind::SetUpMenu(menu) => {
                push(&mut icons, &mut menu.title_icon);
                for item in menu.items.iter_mut().flatten() {
                    push(&mut icons, &mut item.icon);
                }
            }
            CommandKind::LaunchBrowser(browser) => push(&mut icons, &mut browser.confirm.icon),
            CommandKind::SetUpCall(call) => {
                push(&mut icons, &mut call.confirm.icon);
                push(&mut icons, &mut call.call.icon);
            }
            CommandKind::Refresh { .. }
            | CommandKind::SetUpEventList { .. }
            | CommandKind::ProvideLocalInformation
            | CommandKind::LanguageNotification { .. }
            | CommandKind::GetChannelStatus => {}
        }
        icons
    }
}
