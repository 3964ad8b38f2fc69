//! COMPREHENSION-TLV value parsers
//!
//! Each function turns the value of one data object into a model type.
//! Malformed values fail with [`ParamsError::Malformed`], which the
//! dispatcher answers with CMD_DATA_NOT_UNDERSTOOD.

use thiserror::Error;

use crate::codec::ComprehensionTlv;
use crate::enums::{CommandType, ComprehensionTag, ResultCode, TimeUnit, Tone};
use crate::params::{CommandDetails, Duration, IconRef, Item};
use crate::text::{self, TextError};

/// Errors raised while building command parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    /// A mandatory data object is absent
    #[error("Required {0:?} object missing")]
    MissingTlv(ComprehensionTag),

    /// A data object has an unexpected length or value
    #[error("Malformed {tag:?} object: {reason}")]
    Malformed {
        /// Object tag
        tag: ComprehensionTag,
        /// What was wrong
        reason: String,
    },

    /// Text could not be decoded
    #[error("Text decoding failed: {0}")]
    Text(#[from] TextError),

    /// Known command with a qualifier the terminal does not implement
    #[error("Unsupported qualifier 0x{qualifier:02X} for {command}")]
    UnsupportedQualifier {
        /// Command type
        command: CommandType,
        /// Offending qualifier
        qualifier: u8,
    },

    /// Command type with no handler
    #[error("Unsupported command type 0x{0:02X}")]
    UnsupportedCommand(u8),
}

impl ParamsError {
    /// Result code reported to the card for this failure.
    pub fn result_code(&self) -> ResultCode {
        match self {
            ParamsError::MissingTlv(_) => ResultCode::RequiredValuesMissing,
            ParamsError::UnsupportedQualifier { .. } => ResultCode::BeyondTerminalCapability,
            ParamsError::Malformed { .. }
            | ParamsError::Text(_)
            | ParamsError::UnsupportedCommand(_) => ResultCode::CmdDataNotUnderstood,
        }
    }

    fn malformed(tag: ComprehensionTag, reason: impl Into<String>) -> Self {
        ParamsError::Malformed {
            tag,
            reason: reason.into(),
        }
    }
}

/// Result type for parameter parsing
pub type ParamsResult<T> = Result<T, ParamsError>;

fn require_len(tlv: &ComprehensionTlv, tag: ComprehensionTag, min: usize) -> ParamsResult<()> {
    if tlv.length() < min {
        return Err(ParamsError::malformed(
            tag,
            format!("length {} shorter than {}", tlv.length(), min),
        ));
    }
    Ok(())
}

/// COMMAND DETAILS: number, type, qualifier.
pub fn retrieve_command_details(tlv: &ComprehensionTlv) -> ParamsResult<CommandDetails> {
    require_len(tlv, ComprehensionTag::CommandDetails, 3)?;
    Ok(CommandDetails {
        command_number: tlv.value[0],
        type_of_command: tlv.value[1],
        command_qualifier: tlv.value[2],
        comp_required: tlv.comprehension_required,
    })
}

/// DURATION: time unit and interval.
pub fn retrieve_duration(tlv: &ComprehensionTlv) -> ParamsResult<Duration> {
    require_len(tlv, ComprehensionTag::Duration, 2)?;
    let unit = TimeUnit::try_from(tlv.value[0]).map_err(|_| {
        ParamsError::malformed(
            ComprehensionTag::Duration,
            format!("time unit 0x{:02X}", tlv.value[0]),
        )
    })?;
    Ok(Duration::new(unit, tlv.value[1]))
}

/// ITEM: `None` for a zero-length object.
pub fn retrieve_item(tlv: &ComprehensionTlv) -> ParamsResult<Option<Item>> {
    let Some((&id, body)) = tlv.value.split_first() else {
        return Ok(None);
    };
    Ok(Some(Item {
        id,
        text: text::decode_alpha_field(body)?,
        icon: None,
    }))
}

/// ITEM IDENTIFIER.
pub fn retrieve_item_id(tlv: &ComprehensionTlv) -> ParamsResult<u8> {
    require_len(tlv, ComprehensionTag::ItemId, 1)?;
    Ok(tlv.value[0])
}

/// ICON IDENTIFIER: qualifier bit 0 clear means self-explanatory.
pub fn retrieve_icon_id(tlv: &ComprehensionTlv) -> ParamsResult<IconRef> {
    require_len(tlv, ComprehensionTag::IconId, 2)?;
    Ok(IconRef::new(tlv.value[1], tlv.value[0] & 0x01 == 0))
}

/// ITEM ICON IDENTIFIER LIST: one record number per item.
pub fn retrieve_item_icon_list(tlv: &ComprehensionTlv) -> ParamsResult<Vec<IconRef>> {
    require_len(tlv, ComprehensionTag::ItemIconIdList, 1)?;
    let self_explanatory = tlv.value[0] & 0x01 == 0;
    Ok(tlv.value[1..]
        .iter()
        .map(|record| IconRef::new(*record, self_explanatory))
        .collect())
}

/// ALPHA IDENTIFIER.
///
/// A zero-length object yields `None`. An absent object yields `None` when
/// the terminal skips user confirmation, and `default_text` otherwise.
pub fn retrieve_alpha_id(
    tlv: Option<&ComprehensionTlv>,
    no_alpha_user_confirmation: bool,
    default_text: &str,
) -> ParamsResult<Option<String>> {
    match tlv {
        Some(tlv) if tlv.length() == 0 => Ok(None),
        Some(tlv) => Ok(Some(text::decode_alpha_field(&tlv.value)?)),
        None if no_alpha_user_confirmation => Ok(None),
        None => Ok(Some(default_text.to_string())),
    }
}

/// TEXT STRING, decoded by its data coding scheme.
pub fn retrieve_text_string(tlv: &ComprehensionTlv) -> ParamsResult<Option<String>> {
    Ok(text::decode_text_string(&tlv.value)?)
}

/// RESPONSE LENGTH: (minimum, maximum).
pub fn retrieve_response_length(tlv: &ComprehensionTlv) -> ParamsResult<(u8, u8)> {
    require_len(tlv, ComprehensionTag::ResponseLength, 2)?;
    Ok((tlv.value[0], tlv.value[1]))
}

/// EVENT LIST: one event code per octet.
pub fn retrieve_event_list(tlv: &ComprehensionTlv) -> Vec<u8> {
    tlv.value.clone()
}

/// LANGUAGE: two GSM characters (ISO 639 code).
pub fn retrieve_language(tlv: &ComprehensionTlv) -> ParamsResult<Option<String>> {
    if tlv.length() == 0 {
        return Ok(None);
    }
    if tlv.length() != 2 {
        return Err(ParamsError::malformed(
            ComprehensionTag::Language,
            format!("length {} is not 2", tlv.length()),
        ));
    }
    Ok(Some(text::decode_gsm8(&tlv.value)))
}

/// URL: GSM 8-bit text, `None` for the default URL.
pub fn retrieve_url(tlv: &ComprehensionTlv) -> Option<String> {
    if tlv.length() == 0 {
        None
    } else {
        Some(text::decode_gsm8(&tlv.value))
    }
}

/// TONE.
pub fn retrieve_tone(tlv: &ComprehensionTlv) -> ParamsResult<Tone> {
    require_len(tlv, ComprehensionTag::Tone, 1)?;
    Tone::try_from(tlv.value[0]).map_err(|_| {
        ParamsError::malformed(ComprehensionTag::Tone, format!("tone 0x{:02X}", tlv.value[0]))
    })
}
