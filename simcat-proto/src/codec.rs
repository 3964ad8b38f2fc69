//! BER-TLV and COMPREHENSION-TLV encoding/decoding
//!
//! A proactive command travels as one BER-TLV envelope (tag 0xD0) wrapping a
//! sequence of COMPREHENSION-TLV objects (ETSI TS 101 220 Section 7.1).
//! Decoding is a pure function of the input bytes.
//!
//! # Length forms
//!
//! | First byte | Length            | Constraint           |
//! |------------|-------------------|----------------------|
//! | `00..7F`   | the byte itself   |                      |
//! | `81`       | next byte         | must be `>= 0x80`    |
//! | `82`       | next two bytes    | must be `>= 0x100`   |
//! | `83`       | next three bytes  | must be `>= 0x10000` |
//!
//! The BER envelope header only accepts the first two forms.
//!
//! # Example
//!
//! ```rust
//! use simcat_proto::codec::decode_envelope;
//! use simcat_proto::enums::BerTag;
//!
//! // DISPLAY TEXT, command number 1, empty 8-bit text string
//! let raw = [0xD0, 0x0C, 0x81, 0x03, 0x01, 0x21, 0x80, 0x82, 0x02, 0x81, 0x02,
//!            0x8D, 0x01, 0x04];
//! let envelope = decode_envelope(&raw).unwrap();
//! assert_eq!(envelope.tag, BerTag::ProactiveCommand);
//! assert_eq!(envelope.tlvs.len(), 3);
//! assert!(envelope.length_valid);
//! ```

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use crate::enums::{ber_tag, BerTag, ComprehensionTag, ResultCode};

/// Comprehension-required flag in a COMPREHENSION-TLV tag byte
pub const CR_FLAG: u8 = 0x80;

/// Largest value length a terminal-side TLV may carry (one-byte long form)
pub const MAX_ENCODED_LENGTH: usize = 0xFF;

/// Errors that can occur during TLV encoding/decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TlvError {
    /// The BER envelope header runs past the end of the buffer
    #[error("Envelope header truncated: expected at least {expected} bytes, got {actual}")]
    HeaderTruncated {
        /// Expected minimum bytes
        expected: usize,
        /// Actual bytes available
        actual: usize,
    },

    /// Malformed BER length prefix
    #[error("Invalid BER length: 0x{0:02X}")]
    InvalidBerLength(u8),

    /// The envelope declares more bytes than it carries
    #[error("Declared length {declared} exceeds the {remaining} bytes remaining")]
    MissingData {
        /// Declared BER length
        declared: usize,
        /// Bytes actually following the header
        remaining: usize,
    },

    /// Reserved COMPREHENSION-TLV tag byte
    #[error("Invalid COMPREHENSION-TLV tag: 0x{0:02X}")]
    InvalidTag(u8),

    /// Malformed COMPREHENSION-TLV length prefix
    #[error("Invalid COMPREHENSION-TLV length: 0x{0:02X}")]
    InvalidLength(u8),

    /// A COMPREHENSION-TLV header runs past the end of the buffer
    #[error("COMPREHENSION-TLV truncated at offset {offset}")]
    TlvTruncated {
        /// Offset of the truncated object
        offset: usize,
    },

    /// Value length exceeds remaining buffer
    #[error("Length exceeds buffer: length field is {length}, but only {remaining} bytes remain")]
    LengthExceedsBuffer {
        /// Length specified in the length field
        length: usize,
        /// Remaining bytes in buffer
        remaining: usize,
    },

    /// Encoding error
    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl TlvError {
    /// Result code reported to the card for this failure.
    pub fn result_code(&self) -> ResultCode {
        match self {
            TlvError::HeaderTruncated { .. } => ResultCode::RequiredValuesMissing,
            _ => ResultCode::CmdDataNotUnderstood,
        }
    }
}

/// Result type for TLV codec operations
pub type TlvResult<T> = Result<T, TlvError>;

/// One COMPREHENSION-TLV object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComprehensionTlv {
    /// Tag with the CR bit cleared
    pub tag: u8,
    /// CR bit of the tag byte
    pub comprehension_required: bool,
    /// Value bytes; the encoded length is always `value.len()`
    pub value: Vec<u8>,
}

impl ComprehensionTlv {
    /// Creates a TLV from a raw tag byte; the top bit becomes the CR flag.
    pub fn new(tag_byte: u8, value: Vec<u8>) -> Self {
        Self {
            tag: tag_byte & !CR_FLAG,
            comprehension_required: tag_byte & CR_FLAG != 0,
            value,
        }
    }

    /// Length of the value field.
    pub fn length(&self) -> usize {
        self.value.len()
    }

    /// The tag as a known enum value, if it is one.
    pub fn known_tag(&self) -> Option<ComprehensionTag> {
        ComprehensionTag::try_from(self.tag).ok()
    }

    /// Returns true if this object carries `tag`.
    pub fn is(&self, tag: ComprehensionTag) -> bool {
        self.tag == u8::from(tag)
    }

    /// Tag byte as it appears on the wire.
    pub fn tag_byte(&self) -> u8 {
        if self.comprehension_required {
            self.tag | CR_FLAG
        } else {
            self.tag
        }
    }

    /// Number of bytes this object occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        1 + length_field_size(self.value.len()) + self.value.len()
    }

    /// Encode this object to the provided buffer.
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> TlvResult<()> {
        buf.put_u8(self.tag_byte());
        put_length(buf, self.value.len())?;
        buf.put_slice(&self.value);
        Ok(())
    }
}

/// A decoded BER envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BerEnvelope {
    /// Outer tag
    pub tag: BerTag,
    /// Inner objects in wire order
    pub tlvs: Vec<ComprehensionTlv>,
    /// False when the declared BER length disagrees with the inner objects
    pub length_valid: bool,
}

impl BerEnvelope {
    /// First object carrying `tag`.
    pub fn find(&self, tag: ComprehensionTag) -> Option<&ComprehensionTlv> {
        self.tlvs.iter().find(|tlv| tlv.is(tag))
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a BER envelope.
///
/// A buffer whose first byte is a COMMAND DETAILS tag (CR bit masked) is
/// treated as an envelope-less command and parsed from offset 0. For
/// proactive commands a mismatch between the declared length and the sum of
/// the inner wire sizes clears `length_valid` instead of failing.
pub fn decode_envelope(data: &[u8]) -> TlvResult<BerEnvelope> {
    let mut buf = data;
    if !buf.has_remaining() {
        return Err(TlvError::HeaderTruncated {
            expected: 1,
            actual: 0,
        });
    }

    let outer = buf.get_u8();
    let (tag, declared, start) = if outer == ber_tag::PROACTIVE_COMMAND {
        let declared = decode_ber_length(&mut buf, data.len())?;
        (BerTag::ProactiveCommand, declared, data.len() - buf.remaining())
    } else if outer & !CR_FLAG == u8::from(ComprehensionTag::CommandDetails) {
        (BerTag::Unknown, 0, 0)
    } else if outer == ber_tag::EVENT_DOWNLOAD {
        (BerTag::EventDownload, 0, 1)
    } else {
        (BerTag::Other(outer), 0, 1)
    };

    let remaining = data.len() - start;
    if remaining < declared {
        return Err(TlvError::MissingData {
            declared,
            remaining,
        });
    }

    let tlvs = decode_comprehension_tlvs(data, start)?;

    let mut length_valid = true;
    if tag == BerTag::ProactiveCommand {
        let mut total = 0usize;
        for tlv in &tlvs {
            let item = tlv.length();
            if item > MAX_ENCODED_LENGTH {
                length_valid = false;
                break;
            }
            total += item + if item >= 0x80 { 3 } else { 2 };
        }
        if total != declared {
            length_valid = false;
        }
    }

    Ok(BerEnvelope {
        tag,
        tlvs,
        length_valid,
    })
}

fn decode_ber_length(buf: &mut &[u8], total: usize) -> TlvResult<usize> {
    let truncated = |consumed: usize| TlvError::HeaderTruncated {
        expected: consumed + 1,
        actual: total,
    };

    if !buf.has_remaining() {
        return Err(truncated(1));
    }
    match buf.get_u8() {
        short @ 0x00..=0x7F => Ok(short as usize),
        0x81 => {
            if !buf.has_remaining() {
                return Err(truncated(2));
            }
            let long = buf.get_u8();
            if long < 0x80 {
                return Err(TlvError::InvalidBerLength(long));
            }
            Ok(long as usize)
        }
        other => Err(TlvError::InvalidBerLength(other)),
    }
}

/// Decode every COMPREHENSION-TLV from `start` to the end of `data`.
///
/// A malformed or truncated object fails the whole call.
pub fn decode_comprehension_tlvs(data: &[u8], start: usize) -> TlvResult<Vec<ComprehensionTlv>> {
    let mut buf = data.get(start..).unwrap_or_default();
    let mut tlvs = Vec::new();
    while buf.has_remaining() {
        let offset = data.len() - buf.remaining();
        tlvs.push(decode_comprehension_tlv(&mut buf, offset)?);
    }
    Ok(tlvs)
}

/// Decode one COMPREHENSION-TLV; `offset` is only used for error reports.
pub fn decode_comprehension_tlv<B: Buf>(buf: &mut B, offset: usize) -> TlvResult<ComprehensionTlv> {
    if !buf.has_remaining() {
        return Err(TlvError::TlvTruncated { offset });
    }
    let tag_byte = buf.get_u8();
    match tag_byte {
        // 0x7F introduces the three-byte tag format, which no supported
        // command uses.
        0x00 | 0x7F | 0x80 | 0xFF => return Err(TlvError::InvalidTag(tag_byte)),
        _ => {}
    }

    let length = decode_tlv_length(buf, offset)?;
    if buf.remaining() < length {
        return Err(TlvError::LengthExceedsBuffer {
            length,
            remaining: buf.remaining(),
        });
    }
    let mut value = vec![0u8; length];
    buf.copy_to_slice(&mut value);

    Ok(ComprehensionTlv::new(tag_byte, value))
}

fn decode_tlv_length<B: Buf>(buf: &mut B, offset: usize) -> TlvResult<usize> {
    if !buf.has_remaining() {
        return Err(TlvError::TlvTruncated { offset });
    }
    let first = buf.get_u8();
    let (extra, minimum) = match first {
        0x00..=0x7F => return Ok(first as usize),
        0x81 => (1, 0x80),
        0x82 => (2, 0x100),
        0x83 => (3, 0x10000),
        _ => return Err(TlvError::InvalidLength(first)),
    };
    if buf.remaining() < extra {
        return Err(TlvError::TlvTruncated { offset });
    }
    let mut length = 0usize;
    for _ in 0..extra {
        length = (length << 8) | buf.get_u8() as usize;
    }
    if length < minimum {
        return Err(TlvError::InvalidLength(first));
    }
    Ok(length)
}

// ============================================================================
// Encoding
// ============================================================================

/// Size of the length field for a value of `length` bytes.
pub fn length_field_size(length: usize) -> usize {
    if length > 0x7F {
        2
    } else {
        1
    }
}

/// Write a length field, using the `0x81` long form above 127 bytes.
pub fn put_length<B: BufMut>(buf: &mut B, length: usize) -> TlvResult<()> {
    if length > MAX_ENCODED_LENGTH {
        return Err(TlvError::EncodingError(format!(
            "length {} exceeds maximum of {}",
            length, MAX_ENCODED_LENGTH
        )));
    }
    if length > 0x7F {
        buf.put_u8(0x81);
    }
    buf.put_u8(length as u8);
    Ok(())
}

/// Encode a single COMPREHENSION-TLV from a raw tag byte (CR bit included).
pub fn encode_comprehension_tlv(tag_byte: u8, value: &[u8]) -> TlvResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(2 + value.len());
    buf.put_u8(tag_byte);
    put_length(&mut buf, value.len())?;
    buf.put_slice(value);
    Ok(buf)
}

/// Encode a BER envelope around `items`.
pub fn encode_envelope(tag: u8, items: &[ComprehensionTlv]) -> TlvResult<Vec<u8>> {
    let mut builder = TlvBuilder::new(tag);
    for item in items {
        builder.put_tlv(item.tag_byte(), &item.value)?;
    }
    builder.finish()
}

/// Two-pass builder: the body is serialized first, and `finish` emits the
/// tag and the measured length in front of it.
#[derive(Debug, Clone)]
pub struct TlvBuilder {
    tag: u8,
    body: BytesMut,
}

impl TlvBuilder {
    /// Starts a new object with the given outer tag byte.
    pub fn new(tag: u8) -> Self {
        Self {
            tag,
            body: BytesMut::with_capacity(64),
        }
    }

    /// Appends a complete COMPREHENSION-TLV to the body.
    pub fn put_tlv(&mut self, tag_byte: u8, value: &[u8]) -> TlvResult<&mut Self> {
        self.body.put_u8(tag_byte);
        put_length(&mut self.body, value.len())?;
        self.body.put_slice(value);
        Ok(self)
    }

    /// Appends raw, already encoded bytes to the body.
    pub fn put_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.body.put_slice(bytes);
        self
    }

    /// Current body length.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Emits `tag + length + body`.
    pub fn finish(self) -> TlvResult<Vec<u8>> {
        let mut out = Vec::with_capacity(2 + length_field_size(self.body.len()) + self.body.len());
        out.put_u8(self.tag);
        put_length(&mut out, self.body.len())?;
        out.put_slice(&self.body);
        Ok(out)
    }
}

// ============================================================================
// Tests
// ============================================================================
