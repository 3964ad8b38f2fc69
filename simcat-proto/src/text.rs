//! SIM alphabets
//!
//! Decoding and encoding for the character sets a card uses in TEXT STRING,
//! ALPHA IDENTIFIER and ITEM objects:
//!
//! - GSM 7-bit default alphabet, packed into octets (3GPP TS 23.038 Section 6.1.2.1)
//! - GSM 7-bit default alphabet, one septet per octet ("8-bit unpacked")
//! - UCS-2, big endian
//! - the three UCS-2 forms of TS 102 221 Annex A used by alpha identifiers
//!   (`0x80` plain, `0x81` and `0x82` with a base pointer)

use thiserror::Error;

use crate::enums::ResultCode;

/// Escape to the extension table
const GSM_ESCAPE: u8 = 0x1B;

/// Unused octet, terminates unpacked GSM text
const GSM_PADDING: u8 = 0xFF;

/// Data coding scheme of a TEXT STRING (coding group bits 2..3)
pub mod dcs {
    /// GSM default alphabet, packed
    pub const GSM_7BIT_PACKED: u8 = 0x00;
    /// GSM default alphabet, 8-bit unpacked
    pub const GSM_8BIT: u8 = 0x04;
    /// UCS-2
    pub const UCS2: u8 = 0x08;
    /// Mask selecting the alphabet bits
    pub const ALPHABET_MASK: u8 = 0x0C;
}

#[rustfmt::skip]
const GSM_BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', ' ', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

const GSM_EXTENSION: [(u8, char); 10] = [
    (0x0A, '\u{0C}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

/// Errors raised while decoding card text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextError {
    /// Data coding scheme with an alphabet this terminal does not know
    #[error("Unsupported data coding scheme: 0x{0:02X}")]
    UnsupportedCodingScheme(u8),

    /// UCS-2 payload with an odd number of octets
    #[error("UCS-2 text has odd length {0}")]
    OddUcs2Length(usize),

    /// UCS-2 payload that is not valid UTF-16
    #[error("Invalid UCS-2 text")]
    InvalidUcs2,

    /// Compressed UCS-2 header runs past the field
    #[error("Alpha identifier header truncated")]
    TruncatedHeader,
}

impl TextError {
    /// Result code reported to the card for this failure.
    pub fn result_code(&self) -> ResultCode {
        ResultCode::CmdDataNotUnderstood
    }
}

/// Result type for alphabet operations
pub type TextResult<T> = Result<T, TextError>;

fn gsm_extension_char(code: u8) -> Option<char> {
    GSM_EXTENSION
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, ch)| *ch)
}

/// Maps a character to its septets; `None` if the alphabet lacks it.
fn char_to_septets(ch: char) -> Option<(u8, Option<u8>)> {
    if let Some(code) = GSM_BASIC
        .iter()
        .enumerate()
        .position(|(code, c)| *c == ch && code as u8 != GSM_ESCAPE)
    {
        return Some((code as u8, None));
    }
    GSM_EXTENSION
        .iter()
        .find(|(_, c)| *c == ch)
        .map(|(code, _)| (GSM_ESCAPE, Some(*code)))
}

/// Turns a septet sequence into text, resolving escape sequences.
fn septets_to_string(septets: impl IntoIterator<Item = u8>) -> String {
    let mut out = String::new();
    let mut escaped = false;
    for septet in septets {
        let septet = septet & 0x7F;
        if escaped {
            // Unknown extension codes fall back to the basic table
            out.push(gsm_extension_char(septet).unwrap_or(GSM_BASIC[septet as usize]));
            escaped = false;
        } else if septet == GSM_ESCAPE {
            escaped = true;
        } else {
            out.push(GSM_BASIC[septet as usize]);
        }
    }
    out
}

/// Converts text into septets; characters outside the alphabet become spaces.
fn string_to_septets(text: &str) -> Vec<u8> {
    let mut septets = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match char_to_septets(ch) {
            Some((first, second)) => {
                septets.push(first);
                if let Some(second) = second {
                    septets.push(second);
                }
            }
            None => septets.push(0x20),
        }
    }
    septets
}

/// Returns true when every character of `text` exists in the GSM alphabet.
pub fn is_gsm_encodable(text: &str) -> bool {
    text.chars().all(|ch| char_to_septets(ch).is_some())
}

// ============================================================================
// GSM 7-bit packed
// ============================================================================

/// Decodes `septet_count` packed septets from `data`.
pub fn decode_gsm7_packed(data: &[u8], septet_count: usize) -> String {
    let septets = (0..septet_count).map_while(|i| {
        let bit_offset = i * 7;
        let byte_offset = bit_offset / 8;
        let shift = bit_offset % 8;
        let low = *data.get(byte_offset)?;
        let mut septet = (low >> shift) & 0x7F;
        if shift > 1 {
            let high = data.get(byte_offset + 1).copied().unwrap_or(0);
            septet = ((high << (8 - shift)) | septet) & 0x7F;
        }
        Some(septet)
    });
    septets_to_string(septets)
}

/// Packs `text` into GSM 7-bit octets; returns the octets and septet count.
pub fn encode_gsm7_packed(text: &str) -> (Vec<u8>, usize) {
    let septets = string_to_septets(text);
    let mut out = vec![0u8; (septets.len() * 7 + 7) / 8];
    for (i, septet) in septets.iter().enumerate() {
        let bit_offset = i * 7;
        let byte_offset = bit_offset / 8;
        let shift = bit_offset % 8;
        out[byte_offset] |= septet << shift;
        if shift > 1 {
            out[byte_offset + 1] |= septet >> (8 - shift);
        }
    }
    (out, septets.len())
}

// ============================================================================
// GSM 8-bit unpacked
// ============================================================================

/// Decodes unpacked GSM text, stopping at the first `0xFF` padding octet.
pub fn decode_gsm8(data: &[u8]) -> String {
    septets_to_string(data.iter().copied().take_while(|b| *b != GSM_PADDING))
}

/// Encodes text as unpacked GSM octets; characters outside the alphabet
/// become spaces.
pub fn encode_gsm8(text: &str) -> Vec<u8> {
    string_to_septets(text)
}

// ============================================================================
// UCS-2
// ============================================================================

/// Decodes big-endian UCS-2.
pub fn decode_ucs2(data: &[u8]) -> TextResult<String> {
    if data.len() % 2 != 0 {
        return Err(TextError::OddUcs2Length(data.len()));
    }
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| TextError::InvalidUcs2)
}

/// Encodes text as big-endian UCS-2.
pub fn encode_ucs2(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

// ============================================================================
// Card text fields
// ============================================================================

/// Decodes a TEXT STRING value (data coding scheme octet followed by text).
///
/// An empty value means "no text" and yields `None`.
pub fn decode_text_string(value: &[u8]) -> TextResult<Option<String>> {
    let Some((&scheme, text)) = value.split_first() else {
        return Ok(None);
    };
    let decoded = match scheme & dcs::ALPHABET_MASK {
        dcs::GSM_7BIT_PACKED => decode_gsm7_packed(text, text.len() * 8 / 7),
        dcs::GSM_8BIT => decode_gsm8(text),
        dcs::UCS2 => decode_ucs2(text)?,
        _ => return Err(TextError::UnsupportedCodingScheme(scheme)),
    };
    Ok(Some(decoded))
}

/// Decodes an alpha identifier / item text field (TS 102 221 Annex A).
pub fn decode_alpha_field(data: &[u8]) -> TextResult<String> {
    let Some(&first) = data.first() else {
        return Ok(String::new());
    };

    match first {
        0x80 => {
            let units = (data.len() - 1) / 2;
            let mut text = decode_ucs2(&data[1..1 + units * 2])?;
            while text.ends_with('\u{FFFF}') {
                text.pop();
            }
            Ok(text)
        }
        0x81 | 0x82 => {
            let header = if first == 0x81 { 3 } else { 4 };
            if data.len() < header {
                return Err(TextError::TruncatedHeader);
            }
            let count = (data[1] as usize).min(data.len() - header);
            let base: u32 = if first == 0x81 {
                (data[2] as u32) << 7
            } else {
                ((data[2] as u32) << 8) | data[3] as u32
            };
            Ok(decode_compressed_ucs2(&data[header..header + count], base))
        }
        _ => Ok(decode_gsm8(data)),
    }
}

fn decode_compressed_ucs2(body: &[u8], base: u32) -> String {
    let mut out = String::new();
    let mut rest = body;
    while let Some((&octet, tail)) = rest.split_first() {
        if octet & 0x80 != 0 {
            out.push(char::from_u32(base + (octet & 0x7F) as u32).unwrap_or('\u{FFFD}'));
            rest = tail;
        } else {
            let run = rest.iter().take_while(|b| **b & 0x80 == 0).count();
            out.push_str(&septets_to_string(rest[..run].iter().copied()));
            rest = &rest[run..];
        }
    }
    out
}
