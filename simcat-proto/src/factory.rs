//! Command factory
//!
//! Turns a proactive command envelope into [`CommandParams`]. Each command
//! type has its own builder that picks the data objects it needs by tag and
//! ignores the rest.

use thiserror::Error;
use tracing::{debug, trace};

use crate::codec::{decode_envelope, ComprehensionTlv, TlvError};
use crate::enums::{
    local_info, refresh, CommandType, ComprehensionTag, LaunchBrowserMode, PresentationType,
    ResultCode,
};
use crate::params::{
    BrowserSettings, CallSettings, CommandDetails, CommandKind, CommandParams, Duration, IconRef,
    Input, Menu, TextMessage, ToneSettings,
};
use crate::values::{self, ParamsError, ParamsResult};

/// Text used for an absent alpha identifier when the user must confirm.
pub const DEFAULT_ALPHA_TEXT: &str = "Default Message";

/// GET INPUT maximum length in UCS-2 characters
pub const MAX_UCS2_INPUT_LEN: u8 = 118;

/// GET INPUT maximum length in GSM characters
pub const MAX_GSM_INPUT_LEN: u8 = 239;

/// Absent-alpha-identifier policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryOptions {
    /// Treat an absent alpha identifier as "no confirmation needed"
    pub no_alpha_user_confirmation: bool,
    /// Text substituted for an absent alpha identifier otherwise
    pub default_alpha_text: String,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            no_alpha_user_confirmation: false,
            default_alpha_text: DEFAULT_ALPHA_TEXT.to_string(),
        }
    }
}

/// Why a proactive command could not be built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input was not valid hexadecimal
    #[error("Invalid hex input: {0}")]
    InvalidHex(String),

    /// BER/COMPREHENSION-TLV structure error
    #[error(transparent)]
    Tlv(#[from] TlvError),

    /// No usable COMMAND DETAILS object
    #[error("Command details missing")]
    MissingCommandDetails,

    /// Declared BER length disagrees with the enclosed objects
    #[error("BER length does not match the enclosed objects")]
    LengthMismatch,

    /// Type-specific parameters were invalid
    #[error(transparent)]
    Params(#[from] ParamsError),
}

impl DecodeError {
    /// Result code reported to the card for this failure.
    pub fn result_code(&self) -> ResultCode {
        match self {
            DecodeError::Tlv(e) => e.result_code(),
            DecodeError::Params(e) => e.result_code(),
            DecodeError::MissingCommandDetails => ResultCode::RequiredValuesMissing,
            DecodeError::InvalidHex(_) | DecodeError::LengthMismatch => {
                ResultCode::CmdDataNotUnderstood
            }
        }
    }
}

/// A command that failed to decode, with whatever details could be salvaged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct RejectedCommand {
    /// Salvaged COMMAND DETAILS; without them no reply can be addressed
    pub details: Option<CommandDetails>,
    pub error: DecodeError,
}

impl RejectedCommand {
    pub fn new(details: Option<CommandDetails>, error: impl Into<DecodeError>) -> Self {
        Self {
            details,
            error: error.into(),
        }
    }

    pub fn result_code(&self) -> ResultCode {
        self.error.result_code()
    }

    /// True when the command is well formed but of a type with no handler.
    pub fn is_unsupported_command(&self) -> bool {
        matches!(
            self.error,
            DecodeError::Params(ParamsError::UnsupportedCommand(_))
        )
    }
}

fn find(tlvs: &[ComprehensionTlv], tag: ComprehensionTag) -> Option<&ComprehensionTlv> {
    tlvs.iter().find(|tlv| tlv.is(tag))
}

fn find_all(
    tlvs: &[ComprehensionTlv],
    tag: ComprehensionTag,
) -> impl Iterator<Item = &ComprehensionTlv> {
    tlvs.iter().filter(move |tlv| tlv.is(tag))
}

fn require(tlvs: &[ComprehensionTlv], tag: ComprehensionTag) -> ParamsResult<&ComprehensionTlv> {
    find(tlvs, tag).ok_or(ParamsError::MissingTlv(tag))
}

/// Builds [`CommandParams`] from decoded envelopes.
#[derive(Debug, Clone, Default)]
pub struct CommandParamsFactory {
    options: FactoryOptions,
}

impl CommandParamsFactory {
    pub fn new(options: FactoryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FactoryOptions {
        &self.options
    }

    /// Decodes a raw proactive command envelope.
    ///
    /// COMMAND DETAILS are salvaged before the length check so that an
    /// envelope with an inconsistent BER length can still be answered.
    pub fn decode(&self, raw: &[u8]) -> Result<CommandParams, RejectedCommand> {
        let envelope = decode_envelope(raw).map_err(|e| RejectedCommand::new(None, e))?;

        let details = match envelope.find(ComprehensionTag::CommandDetails) {
            Some(tlv) => {
                values::retrieve_command_details(tlv).map_err(|e| RejectedCommand::new(None, e))?
            }
            None => {
                return Err(RejectedCommand::new(
                    None,
                    DecodeError::MissingCommandDetails,
                ))
            }
        };
        trace!(tag = ?envelope.tag, tlvs = envelope.tlvs.len(), %details, "Envelope decoded");

        if !envelope.length_valid {
            return Err(RejectedCommand::new(
                Some(details),
                DecodeError::LengthMismatch,
            ));
        }

        self.build_command_params(details, &envelope.tlvs)
            .map_err(|e| RejectedCommand::new(Some(details), e))
    }

    /// Builds the parameters for `details` from its data objects.
    pub fn build_command_params(
        &self,
        details: CommandDetails,
        tlvs: &[ComprehensionTlv],
    ) -> ParamsResult<CommandParams> {
        let Some(command_type) = details.command_type() else {
            debug!(type_of_command = details.type_of_command, "Unknown command type");
            return Err(ParamsError::UnsupportedCommand(details.type_of_command));
        };
        let qualifier = details.command_qualifier;

        let kind = match command_type {
            CommandType::DisplayText => self.display_text(qualifier, tlvs)?,
            CommandType::SetUpIdleModeText => self.idle_mode_text(tlvs)?,
            CommandType::Refresh => CommandKind::Refresh {
                clears_idle_text: refresh::clears_idle_text(qualifier),
            },
            CommandType::GetInkey => self.get_inkey(qualifier, tlvs)?,
            CommandType::GetInput => self.get_input(qualifier, tlvs)?,
            CommandType::SelectItem => CommandKind::SelectItem(self.menu(qualifier, tlvs)?),
            CommandType::SetUpMenu => CommandKind::SetUpMenu(self.menu(qualifier, tlvs)?),
            CommandType::LaunchBrowser => self.launch_browser(qualifier, tlvs)?,
            CommandType::PlayTone => self.play_tone(qualifier, tlvs)?,
            CommandType::SetUpCall => self.set_up_call(tlvs)?,
            CommandType::SendDtmf
            | CommandType::SendSms
            | CommandType::SendSs
            | CommandType::SendUssd => CommandKind::Send(self.notify_text(tlvs)?),
            CommandType::SetUpEventList => CommandKind::SetUpEventList {
                events: find(tlvs, ComprehensionTag::EventList)
                    .map(values::retrieve_event_list)
                    .unwrap_or_default(),
            },
            CommandType::ProvideLocalInformation => match qualifier {
                local_info::DATE_TIME_TIMEZONE | local_info::LANGUAGE => {
                    CommandKind::ProvideLocalInformation
                }
                _ => {
                    return Err(ParamsError::UnsupportedQualifier {
                        command: command_type,
                        qualifier,
                    })
                }
            },
            CommandType::LanguageNotification => CommandKind::LanguageNotification {
                language: match find(tlvs, ComprehensionTag::Language) {
                    Some(tlv) => values::retrieve_language(tlv)?,
                    None => None,
                },
            },
            CommandType::OpenChannel
            | CommandType::CloseChannel
            | CommandType::ReceiveData
            | CommandType::SendData => self.bip_client(tlvs)?,
            CommandType::GetChannelStatus => CommandKind::GetChannelStatus,
            CommandType::MoreTime | CommandType::PollInterval | CommandType::PollingOff => {
                debug!(%command_type, "No handler for command type");
                return Err(ParamsError::UnsupportedCommand(details.type_of_command));
            }
        };

        Ok(CommandParams::new(details, kind))
    }

    fn icon(tlvs: &[ComprehensionTlv]) -> ParamsResult<Option<IconRef>> {
        find(tlvs, ComprehensionTag::IconId)
            .map(values::retrieve_icon_id)
            .transpose()
    }

    fn duration(tlvs: &[ComprehensionTlv]) -> ParamsResult<Option<Duration>> {
        find(tlvs, ComprehensionTag::Duration)
            .map(values::retrieve_duration)
            .transpose()
    }

    /// Alpha identifier shown for user confirmation.
    fn confirm_alpha(&self, tlv: Option<&ComprehensionTlv>) -> ParamsResult<Option<String>> {
        values::retrieve_alpha_id(
            tlv,
            self.options.no_alpha_user_confirmation,
            &self.options.default_alpha_text,
        )
    }

    /// Alpha identifier used as plain information, never defaulted.
    fn info_alpha(tlv: Option<&ComprehensionTlv>) -> ParamsResult<Option<String>> {
        match tlv {
            Some(tlv) => values::retrieve_alpha_id(Some(tlv), true, ""),
            None => Ok(None),
        }
    }

    fn display_text(&self, qualifier: u8, tlvs: &[ComprehensionTlv]) -> ParamsResult<CommandKind> {
        let text = values::retrieve_text_string(require(tlvs, ComprehensionTag::TextString)?)?;
        if text.is_none() {
            return Err(ParamsError::Malformed {
                tag: ComprehensionTag::TextString,
                reason: "empty text".to_string(),
            });
        }

        Ok(CommandKind::DisplayText(TextMessage {
            text,
            icon: Self::icon(tlvs)?,
            is_high_priority: qualifier & 0x01 != 0,
            response_needed: find(tlvs, ComprehensionTag::ImmediateResponse).is_none(),
            user_clear: qualifier & 0x80 != 0,
            duration: Self::duration(tlvs)?,
        }))
    }

    fn idle_mode_text(&self, tlvs: &[ComprehensionTlv]) -> ParamsResult<CommandKind> {
        let text = match find(tlvs, ComprehensionTag::TextString) {
            Some(tlv) => values::retrieve_text_string(tlv)?,
            None => None,
        };
        let mut message = TextMessage::with_text(text);
        message.icon = Self::icon(tlvs)?;

        if message.text.is_none() && message.icon.is_some() && !message.icon_self_explanatory() {
            return Err(ParamsError::Malformed {
                tag: ComprehensionTag::IconId,
                reason: "non self-explanatory icon without text".to_string(),
            });
        }
        Ok(CommandKind::SetUpIdleModeText(message))
    }

    fn get_inkey(&self, qualifier: u8, tlvs: &[ComprehensionTlv]) -> ParamsResult<CommandKind> {
        let text = values::retrieve_text_string(require(tlvs, ComprehensionTag::TextString)?)?;

        Ok(CommandKind::GetInput(Input {
            text,
            default_text: None,
            icon: Self::icon(tlvs)?,
            min_len: 1,
            max_len: 1,
            ucs2: qualifier & 0x02 != 0,
            packed: false,
            digit_only: qualifier & 0x01 == 0,
            echo: true,
            yes_no: qualifier & 0x04 != 0,
            help_available: qualifier & 0x80 != 0,
            duration: Self::duration(tlvs)?,
        }))
    }

    fn get_input(&self, qualifier: u8, tlvs: &[ComprehensionTlv]) -> ParamsResult<CommandKind> {
        let text = values::retrieve_text_string(require(tlvs, ComprehensionTag::TextString)?)?;
        let (min_len, max_len) =
            values::retrieve_response_length(require(tlvs, ComprehensionTag::ResponseLength)?)?;
        let default_text = match find(tlvs, ComprehensionTag::DefaultText) {
            Some(tlv) => values::retrieve_text_string(tlv)?,
            None => None,
        };

        let ucs2 = qualifier & 0x02 != 0;
        let limit = if ucs2 {
            MAX_UCS2_INPUT_LEN
        } else {
            MAX_GSM_INPUT_LEN
        };

        Ok(CommandKind::GetInput(Input {
            text,
            default_text,
            icon: Self::icon(tlvs)?,
            min_len,
            max_len: max_len.min(limit),
            ucs2,
            packed: qualifier & 0x08 != 0,
            digit_only: qualifier & 0x01 == 0,
            echo: qualifier & 0x04 == 0,
            yes_no: false,
            help_available: qualifier & 0x80 != 0,
            duration: Self::duration(tlvs)?,
        }))
    }

    fn menu(&self, qualifier: u8, tlvs: &[ComprehensionTlv]) -> ParamsResult<Menu> {
        let mut items = find_all(tlvs, ComprehensionTag::Item)
            .map(values::retrieve_item)
            .collect::<ParamsResult<Vec<_>>>()?;
        if items.is_empty() {
            return Err(ParamsError::MissingTlv(ComprehensionTag::Item));
        }

        if let Some(tlv) = find(tlvs, ComprehensionTag::ItemIconIdList) {
            let icons = values::retrieve_item_icon_list(tlv)?;
            for (item, icon) in items.iter_mut().flatten().zip(icons) {
                item.icon = Some(icon);
            }
        }

        Ok(Menu {
            title: Self::info_alpha(find(tlvs, ComprehensionTag::AlphaId))?,
            title_icon: Self::icon(tlvs)?,
            items,
            default_item: find(tlvs, ComprehensionTag::ItemId)
                .map(values::retrieve_item_id)
                .transpose()?,
            presentation: PresentationType::from_qualifier(qualifier),
            soft_key_preferred: qualifier & 0x04 != 0,
            help_available: qualifier & 0x80 != 0,
        })
    }

    fn launch_browser(&self, qualifier: u8, tlvs: &[ComprehensionTlv]) -> ParamsResult<CommandKind> {
        let mut confirm =
            TextMessage::with_text(self.confirm_alpha(find(tlvs, ComprehensionTag::AlphaId))?);
        confirm.icon = Self::icon(tlvs)?;

        Ok(CommandKind::LaunchBrowser(BrowserSettings {
            url: find(tlvs, ComprehensionTag::Url).and_then(values::retrieve_url),
            mode: LaunchBrowserMode::from_qualifier(qualifier),
            confirm,
        }))
    }

    fn play_tone(&self, qualifier: u8, tlvs: &[ComprehensionTlv]) -> ParamsResult<CommandKind> {
        let duration = Self::duration(tlvs)?;
        let mut text = TextMessage::with_text(Self::info_alpha(find(tlvs, ComprehensionTag::AlphaId))?);
        text.icon = Self::icon(tlvs)?;
        text.duration = duration;

        Ok(CommandKind::PlayTone {
            text,
            settings: ToneSettings {
                tone: find(tlvs, ComprehensionTag::Tone)
                    .map(values::retrieve_tone)
                    .transpose()?,
                duration,
                vibrate: qualifier & 0x01 != 0,
            },
        })
    }

    fn set_up_call(&self, tlvs: &[ComprehensionTlv]) -> ParamsResult<CommandKind> {
        let mut alphas = find_all(tlvs, ComprehensionTag::AlphaId);
        let mut icons = find_all(tlvs, ComprehensionTag::IconId);

        let mut confirm = TextMessage::with_text(self.confirm_alpha(alphas.next())?);
        confirm.icon = icons.next().map(values::retrieve_icon_id).transpose()?;

        let mut call = TextMessage::with_text(Self::info_alpha(alphas.next())?);
        call.icon = icons.next().map(values::retrieve_icon_id).transpose()?;

        Ok(CommandKind::SetUpCall(CallSettings { confirm, call }))
    }

    fn notify_text(&self, tlvs: &[ComprehensionTlv]) -> ParamsResult<TextMessage> {
        let mut text =
            TextMessage::with_text(self.confirm_alpha(find(tlvs, ComprehensionTag::AlphaId))?);
        text.icon = Self::icon(tlvs)?;
        text.response_needed = false;
        Ok(text)
    }

    fn bip_client(&self, tlvs: &[ComprehensionTlv]) -> ParamsResult<CommandKind> {
        let alpha = find(tlvs, ComprehensionTag::AlphaId);
        let mut text = TextMessage::with_text(self.confirm_alpha(alpha)?);
        text.icon = Self::icon(tlvs)?;
        text.response_needed = false;

        Ok(CommandKind::BipClient {
            text,
            has_alpha_id: alpha.is_some(),
        })
    }
}
