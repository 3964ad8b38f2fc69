//! Test fixtures for integration tests
//!
//! Builders for proactive command envelopes as the card would send them,
//! and for the Terminal Responses the engine is expected to write back.

use simcat_proto::codec::TlvBuilder;
use simcat_proto::enums::ber_tag;
use simcat_proto::{CommandType, ComprehensionTag};

/// GSM 8-bit default alphabet data coding scheme
const DCS_GSM_8BIT: u8 = 0x04;

/// Builder for a hex-encoded proactive command envelope.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    number: u8,
    type_of_command: u8,
    qualifier: u8,
    objects: Vec<(u8, Vec<u8>)>,
    length_delta: i8,
}

impl EnvelopeBuilder {
    pub fn new(number: u8, command_type: CommandType, qualifier: u8) -> Self {
        Self::raw_type(number, command_type.into(), qualifier)
    }

    /// Uses a type byte that need not be a known command type.
    pub fn raw_type(number: u8, type_of_command: u8, qualifier: u8) -> Self {
        Self {
            number,
            type_of_command,
            qualifier,
            objects: Vec::new(),
            length_delta: 0,
        }
    }

    /// Appends a data object with the CR bit set.
    pub fn tlv(mut self, tag: ComprehensionTag, value: &[u8]) -> Self {
        self.objects.push((tag.with_cr(), value.to_vec()));
        self
    }

    pub fn alpha(self, text: &str) -> Self {
        self.tlv(ComprehensionTag::AlphaId, text.as_bytes())
    }

    pub fn text(self, text: &str) -> Self {
        let mut value = vec![DCS_GSM_8BIT];
        value.extend_from_slice(text.as_bytes());
        self.tlv(ComprehensionTag::TextString, &value)
    }

    /// ICON IDENTIFIER for `record`, not self-explanatory.
    pub fn icon(self, record: u8) -> Self {
        self.tlv(ComprehensionTag::IconId, &[0x01, record])
    }

    pub fn item(self, id: u8, text: &str) -> Self {
        let mut value = vec![id];
        value.extend_from_slice(text.as_bytes());
        self.tlv(ComprehensionTag::Item, &value)
    }

    /// Zero-length ITEM, which removes the menu.
    pub fn null_item(self) -> Self {
        self.tlv(ComprehensionTag::Item, &[])
    }

    pub fn response_length(self, min: u8, max: u8) -> Self {
        self.tlv(ComprehensionTag::ResponseLength, &[min, max])
    }

    pub fn event_list(self, events: &[u8]) -> Self {
        self.tlv(ComprehensionTag::EventList, events)
    }

    /// Makes the outer BER length disagree with the content.
    pub fn corrupt_length(mut self, delta: i8) -> Self {
        self.length_delta = delta;
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut builder = TlvBuilder::new(ber_tag::PROACTIVE_COMMAND);
        let details = [self.number, self.type_of_command, self.qualifier];
        // Short values only, encoding cannot fail
        let _ = builder.put_tlv(ComprehensionTag::CommandDetails.with_cr(), &details);
        let _ = builder.put_tlv(ComprehensionTag::DeviceIdentities.with_cr(), &[0x81, 0x82]);
        for (tag, value) in &self.objects {
            let _ = builder.put_tlv(*tag, value);
        }
        let mut raw = builder.finish().unwrap_or_default();
        if let Some(length) = raw.get_mut(1) {
            *length = length.wrapping_add_signed(self.length_delta);
        }
        raw
    }

    pub fn hex(&self) -> String {
        hex::encode(self.bytes())
    }
}

/// Expected Terminal Response, built byte by byte.
#[derive(Debug, Clone)]
pub struct TerminalResponse {
    details: [u8; 3],
    result: u8,
    additional_info: Option<u8>,
    data: Vec<u8>,
}

impl TerminalResponse {
    pub fn new(number: u8, command_type: CommandType, qualifier: u8, result: u8) -> Self {
        Self::raw_type(number, command_type.into(), qualifier, result)
    }

    pub fn raw_type(number: u8, type_of_command: u8, qualifier: u8, result: u8) -> Self {
        Self {
            details: [number, type_of_command, qualifier],
            result,
            additional_info: None,
            data: Vec::new(),
        }
    }

    pub fn additional_info(mut self, info: u8) -> Self {
        self.additional_info = Some(info);
        self
    }

    /// Appends already encoded response data objects.
    pub fn data(mut self, data: &[u8]) -> Self {
        self.data.extend_from_slice(data);
        self
    }

    pub fn hex(&self) -> String {
        let mut raw = vec![0x81, 0x03];
        raw.extend_from_slice(&self.details);
        raw.extend_from_slice(&[0x02, 0x02, 0x82, 0x81]);
        match self.additional_info {
            Some(info) => raw.extend_from_slice(&[0x83, 0x02, self.result, info]),
            None => raw.extend_from_slice(&[0x83, 0x01, self.result]),
        }
        raw.extend_from_slice(&self.data);
        hex::encode(raw)
    }
}

/// MENU SELECTION envelope for `item_id`.
pub fn menu_selection_hex(item_id: u8, help: bool) -> String {
    if help {
        format!("d309820201819001{item_id:02x}1500")
    } else {
        format!("d307820201819001{item_id:02x}")
    }
}

// ============================================================================
// Canned commands
// ============================================================================

pub fn set_up_menu(number: u8) -> EnvelopeBuilder {
    EnvelopeBuilder::new(number, CommandType::SetUpMenu, 0x00)
        .alpha("Services")
        .item(1, "News")
        .item(2, "Games")
}

pub fn remove_menu(number: u8) -> EnvelopeBuilder {
    EnvelopeBuilder::new(number, CommandType::SetUpMenu, 0x00).null_item()
}

pub fn display_text(number: u8, text: &str) -> EnvelopeBuilder {
    EnvelopeBuilder::new(number, CommandType::DisplayText, 0x80).text(text)
}

pub fn get_inkey_yes_no(number: u8, prompt: &str) -> EnvelopeBuilder {
    EnvelopeBuilder::new(number, CommandType::GetInkey, 0x04).text(prompt)
}

pub fn get_input(number: u8, prompt: &str, min: u8, max: u8) -> EnvelopeBuilder {
    EnvelopeBuilder::new(number, CommandType::GetInput, 0x01)
        .text(prompt)
        .response_length(min, max)
}

pub fn set_up_call(number: u8) -> EnvelopeBuilder {
    EnvelopeBuilder::new(number, CommandType::SetUpCall, 0x00)
        .alpha("Call home?")
        .tlv(ComprehensionTag::Address, &[0x91, 0x21, 0x43])
}

pub fn set_up_event_list(number: u8, events: &[u8]) -> EnvelopeBuilder {
    EnvelopeBuilder::new(number, CommandType::SetUpEventList, 0x00).event_list(events)
}

pub fn open_channel(number: u8) -> EnvelopeBuilder {
    EnvelopeBuilder::new(number, CommandType::OpenChannel, 0x01)
}

pub fn more_time(number: u8) -> EnvelopeBuilder {
    EnvelopeBuilder::new(number, CommandType::MoreTime, 0x00)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_text_envelope() {
        assert_eq!(
            display_text(1, "Hi").hex(),
            "d00e8103012180820281828d03044869"
        );
    }

    #[test]
    fn test_corrupt_length() {
        let raw = display_text(1, "Hi").corrupt_length(-1).bytes();
        assert_eq!(raw[1], 0x0D);
    }

    #[test]
    fn test_terminal_response() {
        assert_eq!(
            TerminalResponse::new(1, CommandType::SetUpMenu, 0x00, 0x00).hex(),
            "810301250002028281830100"
        );
        assert_eq!(
            TerminalResponse::new(1, CommandType::DisplayText, 0x80, 0x20)
                .additional_info(0x01)
                .hex(),
            "81030121800202828183022001"
        );
    }

    #[test]
    fn test_menu_selection_hex() {
        assert_eq!(menu_selection_hex(2, false), "d30782020181900102");
        assert_eq!(menu_selection_hex(1, true), "d309820201819001011500");
    }
}
