//! Terminal Response and Envelope encoding
//!
//! A Terminal Response is a bare COMPREHENSION-TLV sequence:
//!
//! ```text
//! COMMAND DETAILS | DEVICE IDENTITIES | RESULT | [command-specific data]
//! ```
//!
//! Envelope commands (MENU SELECTION, EVENT DOWNLOAD) are wrapped in a
//! BER-TLV whose length is measured after the body is written.

use bytes::BufMut;
use chrono::{DateTime, Datelike, TimeZone, Timelike};

use crate::codec::{put_length, TlvBuilder, TlvResult};
use crate::enums::{ber_tag, event, ComprehensionTag, DeviceIdentity, ResultCode};
use crate::params::{CommandDetails, Duration};
use crate::text::{dcs, encode_gsm7_packed, encode_gsm8, encode_ucs2};

/// GET INKEY yes/no answers
const INKEY_YES: u8 = 0x01;
const INKEY_NO: u8 = 0x00;

/// Timezone octet meaning "unknown"
pub const TIMEZONE_UNKNOWN: u8 = 0xFF;

/// DISPLAY TEXT additional information: screen is busy
pub const ADDITIONAL_INFO_SCREEN_BUSY: u8 = 0x01;

/// Command-specific data appended after the RESULT object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseData {
    /// SELECT ITEM: chosen item
    SelectItem { item_id: u8 },
    /// GET INKEY / GET INPUT: user text in the alphabet the command asked for
    Input { text: String, ucs2: bool, packed: bool },
    /// GET INKEY yes/no answer
    YesNo(bool),
    /// GET INKEY variable timeout that expired
    Duration(Duration),
    /// PROVIDE LOCAL INFORMATION (language)
    Language(Option<String>),
    /// PROVIDE LOCAL INFORMATION (date, time and time zone)
    DateTimeTimezone(DateTimeTimezone),
}

impl ResponseData {
    /// Appends the encoded object(s) to `buf`.
    pub fn format<B: BufMut>(&self, buf: &mut B) -> TlvResult<()> {
        match self {
            ResponseData::SelectItem { item_id } => {
                buf.put_u8(ComprehensionTag::ItemId.with_cr());
                buf.put_u8(1);
                buf.put_u8(*item_id);
            }
            ResponseData::Input { text, ucs2, packed } => {
                let (scheme, data) = if *ucs2 {
                    (dcs::UCS2, encode_ucs2(text))
                } else if *packed {
                    (dcs::GSM_7BIT_PACKED, encode_gsm7_packed(text).0)
                } else {
                    (dcs::GSM_8BIT, encode_gsm8(text))
                };
                put_text_string(buf, scheme, &data)?;
            }
            ResponseData::YesNo(yes) => {
                let answer = if *yes { INKEY_YES } else { INKEY_NO };
                put_text_string(buf, dcs::GSM_8BIT, &[answer])?;
            }
            ResponseData::Duration(duration) => {
                buf.put_u8(ComprehensionTag::Duration.into());
                buf.put_u8(2);
                buf.put_u8(duration.unit.into());
                buf.put_u8(duration.interval);
            }
            ResponseData::Language(language) => {
                let data = language.as_deref().map(encode_gsm8).unwrap_or_default();
                buf.put_u8(ComprehensionTag::Language.with_cr());
                put_length(buf, data.len())?;
                buf.put_slice(&data);
            }
            ResponseData::DateTimeTimezone(dttz) => {
                let data = dttz.to_bytes();
                buf.put_u8(ComprehensionTag::DateTimeAndTimezone.with_cr());
                buf.put_u8(data.len() as u8);
                buf.put_slice(&data);
            }
        }
        Ok(())
    }
}

fn put_text_string<B: BufMut>(buf: &mut B, scheme: u8, data: &[u8]) -> TlvResult<()> {
    buf.put_u8(ComprehensionTag::TextString.with_cr());
    put_length(buf, data.len() + 1)?;
    buf.put_u8(scheme);
    buf.put_slice(data);
    Ok(())
}

/// DATE-TIME AND TIME ZONE (ETSI TS 102 223 Section 8.39)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeTimezone {
    /// Year modulo 100
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Offset from UTC in minutes, `None` when unknown
    pub utc_offset_minutes: Option<i32>,
}

impl DateTimeTimezone {
    /// Takes the calendar fields from `datetime`; the timezone is given
    /// separately so that it can be reported as unknown.
    pub fn from_datetime<Tz: TimeZone>(datetime: &DateTime<Tz>, utc_offset_minutes: Option<i32>) -> Self {
        Self {
            year: datetime.year().rem_euclid(100) as u8,
            month: datetime.month() as u8,
            day: datetime.day() as u8,
            hour: datetime.hour() as u8,
            minute: datetime.minute() as u8,
            second: datetime.second() as u8,
            utc_offset_minutes,
        }
    }

    /// Seven semi-octet BCD values, timezone last.
    pub fn to_bytes(&self) -> [u8; 7] {
        [
            swapped_bcd(self.year),
            swapped_bcd(self.month),
            swapped_bcd(self.day),
            swapped_bcd(self.hour),
            swapped_bcd(self.minute),
            swapped_bcd(self.second),
            self.utc_offset_minutes
                .map(timezone_octet)
                .unwrap_or(TIMEZONE_UNKNOWN),
        ]
    }
}

/// Two decimal digits, units digit in the high nibble.
fn swapped_bcd(value: u8) -> u8 {
    if value > 99 {
        return 0;
    }
    (value / 10) | ((value % 10) << 4)
}

/// Quarter hours in swapped BCD; bit 3 carries the sign.
fn timezone_octet(offset_minutes: i32) -> u8 {
    let quarters = (offset_minutes.unsigned_abs() / 15).min(99) as u8;
    let octet = swapped_bcd(quarters);
    if offset_minutes < 0 {
        octet | 0x08
    } else {
        octet
    }
}

/// Encodes a Terminal Response.
///
/// The CR bit of COMMAND DETAILS and RESULT follows the original command;
/// DEVICE IDENTITIES never carries it.
pub fn encode_terminal_response(
    details: &CommandDetails,
    result: ResultCode,
    additional_info: Option<u8>,
    payload: Option<&ResponseData>,
) -> TlvResult<Vec<u8>> {
    let tag = |tag: ComprehensionTag| {
        if details.comp_required {
            tag.with_cr()
        } else {
            u8::from(tag)
        }
    };

    let mut buf = Vec::with_capacity(16);

    buf.put_u8(tag(ComprehensionTag::CommandDetails));
    buf.put_u8(3);
    buf.put_u8(details.command_number);
    buf.put_u8(details.type_of_command);
    buf.put_u8(details.command_qualifier);

    buf.put_u8(ComprehensionTag::DeviceIdentities.into());
    buf.put_u8(2);
    buf.put_u8(DeviceIdentity::Terminal.into());
    buf.put_u8(DeviceIdentity::Uicc.into());

    buf.put_u8(tag(ComprehensionTag::Result));
    match additional_info {
        Some(info) => {
            buf.put_u8(2);
            buf.put_u8(result.into());
            buf.put_u8(info);
        }
        None => {
            buf.put_u8(1);
            buf.put_u8(result.into());
        }
    }

    if let Some(payload) = payload {
        payload.format(&mut buf)?;
    }
    Ok(buf)
}

/// Encodes a MENU SELECTION envelope.
pub fn encode_menu_selection(item_id: u8, help_requested: bool) -> TlvResult<Vec<u8>> {
    let mut builder = TlvBuilder::new(ber_tag::MENU_SELECTION);
    builder.put_tlv(
        ComprehensionTag::DeviceIdentities.with_cr(),
        &[DeviceIdentity::Keypad.into(), DeviceIdentity::Uicc.into()],
    )?;
    builder.put_tlv(ComprehensionTag::ItemId.with_cr(), &[item_id])?;
    if help_requested {
        builder.put_tlv(ComprehensionTag::HelpRequest.into(), &[])?;
    }
    builder.finish()
}

/// Encodes an EVENT DOWNLOAD envelope.
///
/// For LANGUAGE SELECTION the payload is the two-character language and is
/// wrapped in a LANGUAGE object; any other payload is appended as given.
pub fn encode_event_download(
    event_code: u8,
    source: DeviceIdentity,
    destination: DeviceIdentity,
    payload: Option<&[u8]>,
) -> TlvResult<Vec<u8>> {
    let mut builder = TlvBuilder::new(ber_tag::EVENT_DOWNLOAD);
    builder.put_tlv(ComprehensionTag::EventList.with_cr(), &[event_code])?;
    builder.put_tlv(
        ComprehensionTag::DeviceIdentities.with_cr(),
        &[source.into(), destination.into()],
    )?;
    match payload {
        Some(language) if event_code == event::LANGUAGE_SELECTION => {
            builder.put_tlv(ComprehensionTag::Language.with_cr(), language)?;
        }
        Some(extra) => {
            builder.put_raw(extra);
        }
        None => {}
    }
    builder.finish()
}
