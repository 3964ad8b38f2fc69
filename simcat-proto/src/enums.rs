//! CAT protocol enumerations
//!
//! Based on ETSI TS 102 223 and ETSI TS 101 220.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// BER-TLV tags of the outer envelope (ETSI TS 101 220 Section 7.2)
pub mod ber_tag {
    /// Proactive command, UICC to terminal
    pub const PROACTIVE_COMMAND: u8 = 0xD0;
    /// Menu selection envelope, terminal to UICC
    pub const MENU_SELECTION: u8 = 0xD3;
    /// Event download envelope, terminal to UICC
    pub const EVENT_DOWNLOAD: u8 = 0xD6;
}

/// Outer tag of a decoded BER envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BerTag {
    /// Proactive command envelope (0xD0)
    ProactiveCommand,
    /// Event download envelope (0xD6)
    EventDownload,
    /// No envelope: the buffer starts directly with COMMAND DETAILS
    Unknown,
    /// Any other outer tag
    Other(u8),
}

impl BerTag {
    /// Returns the tag byte, if the envelope carried one.
    pub fn value(&self) -> Option<u8> {
        match self {
            BerTag::ProactiveCommand => Some(ber_tag::PROACTIVE_COMMAND),
            BerTag::EventDownload => Some(ber_tag::EVENT_DOWNLOAD),
            BerTag::Unknown => None,
            BerTag::Other(tag) => Some(*tag),
        }
    }
}

/// COMPREHENSION-TLV tags (ETSI TS 101 220 Section 7.2, CR bit cleared)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ComprehensionTag {
    CommandDetails = 0x01,
    DeviceIdentities = 0x02,
    Result = 0x03,
    Duration = 0x04,
    AlphaId = 0x05,
    Address = 0x06,
    UssdString = 0x0A,
    SmsTpdu = 0x0B,
    TextString = 0x0D,
    Tone = 0x0E,
    Item = 0x0F,
    ItemId = 0x10,
    ResponseLength = 0x11,
    FileList = 0x12,
    HelpRequest = 0x15,
    DefaultText = 0x17,
    NextActionIndicator = 0x18,
    EventList = 0x19,
    IconId = 0x1E,
    ItemIconIdList = 0x1F,
    DateTimeAndTimezone = 0x26,
    ImmediateResponse = 0x2B,
    DtmfString = 0x2C,
    Language = 0x2D,
    BrowserId = 0x30,
    Url = 0x31,
    Bearer = 0x32,
    BrowserTerminationCause = 0x34,
    BearerDescription = 0x35,
    ChannelData = 0x36,
    ChannelDataLength = 0x37,
    ChannelStatus = 0x38,
    BufferSize = 0x39,
    TextAttribute = 0x50,
}

impl ComprehensionTag {
    /// Returns the tag byte with the comprehension-required bit set.
    pub fn with_cr(self) -> u8 {
        u8::from(self) | 0x80
    }
}

/// Type of command (ETSI TS 102 223 Section 9.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CommandType {
    Refresh = 0x01,
    MoreTime = 0x02,
    PollInterval = 0x03,
    PollingOff = 0x04,
    SetUpEventList = 0x05,
    SetUpCall = 0x10,
    SendSs = 0x11,
    SendUssd = 0x12,
    SendSms = 0x13,
    SendDtmf = 0x14,
    LaunchBrowser = 0x15,
    PlayTone = 0x20,
    DisplayText = 0x21,
    GetInkey = 0x22,
    GetInput = 0x23,
    SelectItem = 0x24,
    SetUpMenu = 0x25,
    ProvideLocalInformation = 0x26,
    SetUpIdleModeText = 0x28,
    LanguageNotification = 0x35,
    OpenChannel = 0x40,
    CloseChannel = 0x41,
    ReceiveData = 0x42,
    SendData = 0x43,
    GetChannelStatus = 0x44,
}

impl CommandType {
    /// Returns true for the bearer independent protocol client commands.
    pub fn is_bip_client(&self) -> bool {
        matches!(
            self,
            CommandType::OpenChannel
                | CommandType::CloseChannel
                | CommandType::ReceiveData
                | CommandType::SendData
        )
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandType::Refresh => "REFRESH",
            CommandType::MoreTime => "MORE TIME",
            CommandType::PollInterval => "POLL INTERVAL",
            CommandType::PollingOff => "POLLING OFF",
            CommandType::SetUpEventList => "SET UP EVENT LIST",
            CommandType::SetUpCall => "SET UP CALL",
            CommandType::SendSs => "SEND SS",
            CommandType::SendUssd => "SEND USSD",
            CommandType::SendSms => "SEND SHORT MESSAGE",
            CommandType::SendDtmf => "SEND DTMF",
            CommandType::LaunchBrowser => "LAUNCH BROWSER",
            CommandType::PlayTone => "PLAY TONE",
            CommandType::DisplayText => "DISPLAY TEXT",
            CommandType::GetInkey => "GET INKEY",
            CommandType::GetInput => "GET INPUT",
            CommandType::SelectItem => "SELECT ITEM",
            CommandType::SetUpMenu => "SET UP MENU",
            CommandType::ProvideLocalInformation => "PROVIDE LOCAL INFORMATION",
            CommandType::SetUpIdleModeText => "SET UP IDLE MODE TEXT",
            CommandType::LanguageNotification => "LANGUAGE NOTIFICATION",
            CommandType::OpenChannel => "OPEN CHANNEL",
            CommandType::CloseChannel => "CLOSE CHANNEL",
            CommandType::ReceiveData => "RECEIVE DATA",
            CommandType::SendData => "SEND DATA",
            CommandType::GetChannelStatus => "GET CHANNEL STATUS",
        };
        write!(f, "{name}")
    }
}

/// General result (ETSI TS 102 223 Section 8.12)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ResultCode {
    // Successful results
    Ok = 0x00,
    PrfrmdWithPartialComprehension = 0x01,
    PrfrmdWithMissingInfo = 0x02,
    PrfrmdWithAdditionalEfsRead = 0x03,
    PrfrmdIconNotDisplayed = 0x04,
    PrfrmdModifiedByNaa = 0x05,
    PrfrmdLimitedService = 0x06,
    PrfrmdWithModification = 0x07,
    PrfrmdNaaNotActive = 0x08,
    PrfrmdToneNotPlayed = 0x09,

    // Session terminated or user interaction
    UiccSessionTermByUser = 0x10,
    BackwardMoveByUser = 0x11,
    NoResponseFromUser = 0x12,
    HelpInfoRequired = 0x13,
    UssdSsSessionTermByUser = 0x14,

    // Temporary problems
    TerminalCrntlyUnableToProcess = 0x20,
    NetworkCrntlyUnableToProcess = 0x21,
    UserNotAccept = 0x22,
    UserClearDownCall = 0x23,
    ContradictionWithTimer = 0x24,
    NaaCallControlTemporary = 0x25,
    LaunchBrowserError = 0x26,
    MmsTemporary = 0x27,

    // Permanent problems
    BeyondTerminalCapability = 0x30,
    CmdTypeNotUnderstood = 0x31,
    CmdDataNotUnderstood = 0x32,
    CmdNumNotKnown = 0x33,
    SsReturnError = 0x34,
    SmsRpError = 0x35,
    RequiredValuesMissing = 0x36,
    UssdReturnError = 0x37,
    MultiCardsCmdError = 0x38,
    UsimCallControlPermanent = 0x39,
    BipError = 0x3A,
    AccessTechUnableToProcess = 0x3B,
    FramesError = 0x3C,
    MmsError = 0x3D,
}

impl ResultCode {
    /// Returns true for the "command performed" family (0x0X).
    pub fn is_success(&self) -> bool {
        u8::from(*self) < 0x10
    }
}

/// Device identities (ETSI TS 102 223 Section 8.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DeviceIdentity {
    Keypad = 0x01,
    Display = 0x02,
    Earpiece = 0x03,
    Uicc = 0x81,
    Terminal = 0x82,
    Network = 0x83,
}

/// Event list codes (ETSI TS 102 223 Section 8.25)
pub mod event {
    pub const MT_CALL: u8 = 0x00;
    pub const CALL_CONNECTED: u8 = 0x01;
    pub const CALL_DISCONNECTED: u8 = 0x02;
    pub const LOCATION_STATUS: u8 = 0x03;
    pub const USER_ACTIVITY: u8 = 0x04;
    pub const IDLE_SCREEN_AVAILABLE: u8 = 0x05;
    pub const CARD_READER_STATUS: u8 = 0x06;
    pub const LANGUAGE_SELECTION: u8 = 0x07;
    pub const BROWSER_TERMINATION: u8 = 0x08;
    pub const DATA_AVAILABLE: u8 = 0x09;
    pub const CHANNEL_STATUS: u8 = 0x0A;

    /// Events this terminal can report to the card.
    pub const SUPPORTED: [u8; 2] = [IDLE_SCREEN_AVAILABLE, LANGUAGE_SELECTION];

    /// Returns true if the terminal can download `code`.
    pub fn is_supported(code: u8) -> bool {
        SUPPORTED.contains(&code)
    }
}

/// PROVIDE LOCAL INFORMATION qualifiers handled by the terminal
pub mod local_info {
    /// Date, time and time zone
    pub const DATE_TIME_TIMEZONE: u8 = 0x03;
    /// Language setting
    pub const LANGUAGE: u8 = 0x04;
}

/// REFRESH qualifiers that clear the idle mode text
pub mod refresh {
    pub const NAA_INIT_AND_FULL_FILE_CHANGE: u8 = 0x00;
    pub const NAA_INIT_AND_FILE_CHANGE: u8 = 0x02;
    pub const NAA_INIT: u8 = 0x03;
    pub const UICC_RESET: u8 = 0x04;

    /// Returns true when the refresh invalidates the idle mode text.
    pub fn clears_idle_text(qualifier: u8) -> bool {
        matches!(
            qualifier,
            NAA_INIT_AND_FULL_FILE_CHANGE | NAA_INIT_AND_FILE_CHANGE | NAA_INIT | UICC_RESET
        )
    }
}

/// Time unit of a DURATION TLV (ETSI TS 102 223 Section 8.8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum TimeUnit {
    Minute = 0x00,
    Second = 0x01,
    TenthSecond = 0x02,
}

/// Tone (ETSI TS 102 223 Section 8.16)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Tone {
    // Standard supervisory tones
    Dial = 0x01,
    Busy = 0x02,
    Congestion = 0x03,
    RadioPathAck = 0x04,
    RadioPathNotAvailable = 0x05,
    ErrorSpecialInfo = 0x06,
    CallWaiting = 0x07,
    Ringing = 0x08,

    // Terminal proprietary tones
    GeneralBeep = 0x10,
    PositiveAck = 0x11,
    NegativeAck = 0x12,
    IncomingSpeechCall = 0x13,
    IncomingSms = 0x14,
    CriticalAlert = 0x15,
    VibrateOnly = 0x20,

    // Themed tones
    Happy = 0x30,
    Sad = 0x31,
    Urgent = 0x32,
    Question = 0x33,
    MessageReceived = 0x34,

    // Melody tones
    Melody1 = 0x40,
    Melody2 = 0x41,
    Melody3 = 0x42,
    Melody4 = 0x43,
    Melody5 = 0x44,
    Melody6 = 0x45,
    Melody7 = 0x46,
    Melody8 = 0x47,
}

/// LAUNCH BROWSER mode, from the command qualifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LaunchBrowserMode {
    /// Launch browser, if not already launched
    #[default]
    LaunchIfNotAlreadyLaunched,
    /// Use the existing browser
    UseExistingBrowser,
    /// Close the existing browser session and launch a new one
    LaunchNewBrowser,
}

impl LaunchBrowserMode {
    /// Maps a LAUNCH BROWSER command qualifier.
    pub fn from_qualifier(qualifier: u8) -> Self {
        match qualifier {
            0x02 => LaunchBrowserMode::UseExistingBrowser,
            0x03 => LaunchBrowserMode::LaunchNewBrowser,
            _ => LaunchBrowserMode::LaunchIfNotAlreadyLaunched,
        }
    }
}

/// SELECT ITEM presentation type, from qualifier bits 0..1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresentationType {
    /// Presentation type is not specified
    #[default]
    NotSpecified,
    /// Presentation as a choice of data values
    DataValues,
    /// Presentation as a choice of navigation options
    NavigationOptions,
}

impl PresentationType {
    /// Maps a SELECT ITEM command qualifier.
    pub fn from_qualifier(qualifier: u8) -> Self {
        if qualifier & 0x01 == 0 {
            PresentationType::NotSpecified
        } else if qualifier & 0x02 == 0 {
            PresentationType::DataValues
        } else {
            PresentationType::NavigationOptions
        }
    }
}
