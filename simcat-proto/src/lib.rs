//! SIM Application Toolkit proactive command protocol library
//!
//! Implements the card-to-terminal half of ETSI TS 102 223:
//! - BER-TLV / COMPREHENSION-TLV decoding and encoding
//! - typed proactive command parameters
//! - Terminal Response, MENU SELECTION and EVENT DOWNLOAD encoding
//!
//! # Overview
//!
//! Everything in this crate is a pure function of its input bytes. Session
//! state (the outstanding command, the installed main menu) lives in the
//! terminal crate.
//!
//! ## Decoding
//!
//! - [`codec::decode_envelope`]: BER envelope to [`codec::ComprehensionTlv`] list
//! - [`CommandParamsFactory::decode`]: envelope bytes to [`CommandParams`]
//!
//! ## Encoding
//!
//! - [`response::encode_terminal_response`]
//! - [`response::encode_menu_selection`]
//! - [`response::encode_event_download`]
//!
//! # Example
//!
//! ```rust
//! use simcat_proto::{CommandKind, CommandParamsFactory, ResultCode};
//! use simcat_proto::response::encode_terminal_response;
//!
//! // DISPLAY TEXT "Hi", 8-bit GSM
//! let raw = [0xD0, 0x0E, 0x81, 0x03, 0x01, 0x21, 0x80, 0x82, 0x02, 0x81, 0x02,
//!            0x8D, 0x03, 0x04, b'H', b'i'];
//! let params = CommandParamsFactory::default().decode(&raw).unwrap();
//! assert!(matches!(params.kind, CommandKind::DisplayText(_)));
//!
//! let response = encode_terminal_response(&params.details, ResultCode::Ok, None, None).unwrap();
//! assert_eq!(&response[..5], &[0x81, 0x03, 0x01, 0x21, 0x80]);
//! ```

pub mod codec;
pub mod enums;
pub mod factory;
pub mod message;
pub mod params;
pub mod response;
pub mod text;
pub mod values;

// Re-export commonly used types
pub use codec::{BerEnvelope, ComprehensionTlv, TlvBuilder, TlvError};
pub use enums::{BerTag, CommandType, ComprehensionTag, DeviceIdentity, ResultCode};
pub use factory::{CommandParamsFactory, DecodeError, FactoryOptions, RejectedCommand};
pub use message::{CatCmdMessage, CatResponseMessage};
pub use params::{
    BrowserSettings, CallSettings, CommandDetails, CommandKind, CommandParams, Duration, IconRef,
    Input, Item, Menu, TextMessage, ToneSettings,
};
pub use response::{DateTimeTimezone, ResponseData};
pub use text::TextError;
pub use values::ParamsError;
