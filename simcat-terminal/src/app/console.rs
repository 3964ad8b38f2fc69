//! Console front end
//!
//! Line-oriented commands for driving a registry by hand, and collaborators
//! that print everything the engine emits. Used by the `simcat` binary.

use std::sync::Mutex;

use async_trait::async_trait;
use simcat_common::Error;
use simcat_proto::{CatCmdMessage, CatResponseMessage, CommandDetails, CommandType, ResultCode};
use tracing::debug;

use crate::collab::{CatApplication, CatTransport};

/// What the user asked the application to answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseSpec {
    pub result: Option<ResultCode>,
    pub item: Option<u8>,
    pub input: Option<String>,
    pub yes_no: Option<bool>,
    pub confirm: Option<bool>,
    pub additional_info: Option<u8>,
}

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `envelope <hex>`
    Envelope(String),
    /// `notify <hex>`
    EventNotify(String),
    /// `session-end`
    SessionEnd,
    /// `call-setup`
    CallSetup,
    /// `card present|absent`
    Card { present: bool },
    /// `respond <result> [--item N] [--input TEXT] [--yes|--no] [--accept|--reject] [--info N]`
    Respond(ResponseSpec),
    /// `menu <item> [--help]`
    Menu { item: u8, help: bool },
    /// `event <code> [payload-hex]`
    Event { code: u8, payload: Option<Vec<u8>> },
    /// `slot <n>`
    Slot(usize),
    /// `status`
    Status,
    /// `help`
    Help,
    /// `quit`
    Quit,
}

/// Usage text printed by `help`.
pub const CONSOLE_HELP: &str = "\
envelope <hex>          proactive command from the card
notify <hex>            command already handled by the modem
session-end             end of proactive session
call-setup              call set up event
card present|absent     card state change
respond <result> [opts] answer the last command (result in hex, or 'ok')
    --item N --input TEXT --yes --no --accept --reject --info N
menu <item> [--help]    select a main menu item
event <code> [hex]      download an event
slot <n>                switch slot
status                  show the session
quit";

fn parse_u8(token: &str) -> Result<u8, Error> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u8::from_str_radix(digits, 16).map_err(|_| Error::invalid_input(format!("Invalid byte: {token}")))
}

fn parse_result(token: &str) -> Result<ResultCode, Error> {
    if token.eq_ignore_ascii_case("ok") {
        return Ok(ResultCode::Ok);
    }
    let value = parse_u8(token)?;
    ResultCode::try_from(value).map_err(|_| Error::invalid_input(format!("Unknown result code: {token}")))
}

/// The `i`-th token, or an error naming what was expected.
fn arg<'a>(tokens: &[&'a str], i: usize, what: &str) -> Result<&'a str, Error> {
    tokens
        .get(i)
        .copied()
        .ok_or_else(|| {
            Error::invalid_input(format!(
                "{} requires {what}",
                tokens.first().unwrap_or(&"command")
            ))
        })
}

/// Parses one console line.
pub fn parse_console_command(input: &str) -> Result<ConsoleCommand, Error> {
    let tokens: Vec<&str> = input.split_whitespace().collect();

    let Some(first) = tokens.first() else {
        return Err(Error::invalid_input("Empty command"));
    };

    match first.to_lowercase().as_str() {
        "envelope" | "env" => Ok(ConsoleCommand::Envelope(
            arg(&tokens, 1, "a hex envelope")?.to_string(),
        )),
        "notify" => Ok(ConsoleCommand::EventNotify(
            arg(&tokens, 1, "a hex envelope")?.to_string(),
        )),
        "session-end" => Ok(ConsoleCommand::SessionEnd),
        "call-setup" => Ok(ConsoleCommand::CallSetup),
        "card" => match arg(&tokens, 1, "present or absent")? {
            "present" | "in" => Ok(ConsoleCommand::Card { present: true }),
            "absent" | "out" => Ok(ConsoleCommand::Card { present: false }),
            other => Err(Error::invalid_input(format!("Invalid card state: {other}"))),
        },
        "respond" => {
            let mut reply = ResponseSpec {
                result: Some(parse_result(arg(&tokens, 1, "a result code")?)?),
                ..Default::default()
            };
            let mut i = 2;
            while i < tokens.len() {
                match tokens[i] {
                    "--item" => {
                        let id = arg(&tokens, i + 1, "an item id")?;
                        reply.item =
                            Some(id.parse().map_err(|_| {
                            Error::invalid_input(format!("Invalid item id: {id}"))
                        })?);
                        i += 1;
                    }
                    "--input" => {
                        reply.input = Some(arg(&tokens, i + 1, "input text")?.to_string());
                        i += 1;
                    }
                    "--info" => {
                        reply.additional_info = Some(parse_u8(arg(&tokens, i + 1, "a byte")?)?);
                        i += 1;
                    }
                    "--yes" => reply.yes_no = Some(true),
                    "--no" => reply.yes_no = Some(false),
                    "--accept" => reply.confirm = Some(true),
                    "--reject" => reply.confirm = Some(false),
                    other => return Err(Error::invalid_input(format!("Unknown option: {other}"))),
                }
                i += 1;
            }
            Ok(ConsoleCommand::Respond(reply))
        }
        "menu" => {
            let item = arg(&tokens, 1, "an item id")?
                .parse()
                .map_err(|_| Error::invalid_input(format!("Invalid item id: {}", tokens[1])))?;
            let help = tokens.iter().skip(2).any(|&t| t == "--help");
            Ok(ConsoleCommand::Menu { item, help })
        }
        "event" => {
            let code = parse_u8(arg(&tokens, 1, "an event code")?)?;
            let payload = match tokens.get(2) {
                Some(data) => Some(hex::decode(data)?),
                None => None,
            };
            Ok(ConsoleCommand::Event { code, payload })
        }
        "slot" => {
            let slot = arg(&tokens, 1, "a slot number")?
                .parse()
                .map_err(|_| Error::invalid_input(format!("Invalid slot: {}", tokens[1])))?;
            Ok(ConsoleCommand::Slot(slot))
        }
        "status" => Ok(ConsoleCommand::Status),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(Error::invalid_input(format!("Unknown command: {other}"))),
    }
}

/// Transport and application of one slot that print to stdout.
///
/// Remembers the last command shown so that `respond` can address it.
#[derive(Debug)]
pub struct ConsoleCollaborators {
    slot: usize,
    last_command: Mutex<Option<CatCmdMessage>>,
    last_menu: Mutex<Option<CommandDetails>>,
}

impl ConsoleCollaborators {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            last_command: Mutex::new(None),
            last_menu: Mutex::new(None),
        }
    }

    /// Builds the response to the last command shown.
    pub fn build_response(&self, reply: &ResponseSpec) -> Option<CatResponseMessage> {
        let cmd = self.last_command.lock().ok()?.clone()?;
        let mut resp = CatResponseMessage::for_command(&cmd, reply.result.unwrap_or(ResultCode::Ok));
        resp.menu_selection = reply.item;
        resp.user_input = reply.input.clone();
        resp.yes_no = reply.yes_no;
        resp.confirm = reply.confirm;
        resp.additional_info = reply.additional_info;
        Some(resp)
    }

    /// Builds a main menu selection.
    pub fn menu_selection(&self, item: u8, help: bool) -> CatResponseMessage {
        let details = self
            .last_menu
            .lock()
            .ok()
            .and_then(|menu| *menu)
            .unwrap_or_else(|| CommandDetails::new(0, CommandType::SetUpMenu, 0));
        let result = if help {
            ResultCode::HelpInfoRequired
        } else {
            ResultCode::Ok
        };
        CatResponseMessage::new(details, result).with_menu_selection(item)
    }

    /// Builds an event download request.
    pub fn event_download(code: u8, payload: Option<Vec<u8>>) -> CatResponseMessage {
        CatResponseMessage::new(
            CommandDetails::new(0, CommandType::SetUpEventList, 0),
            ResultCode::Ok,
        )
        .with_event(code, payload)
    }

    fn describe(cmd: &CatCmdMessage) -> String {
        let mut line = format!("{}", cmd.details());
        if let Some(text) = cmd.text_message().and_then(|t| t.text.as_deref()) {
            line.push_str(&format!(" \"{text}\""));
        }
        if let Some(input) = cmd.input() {
            if let Some(prompt) = input.text.as_deref() {
                line.push_str(&format!(" \"{prompt}\""));
            }
            line.push_str(&format!(" [{}..{}]", input.min_len, input.max_len));
        }
        if let Some(menu) = cmd.menu() {
            if let Some(title) = menu.title.as_deref() {
                line.push_str(&format!(" \"{title}\""));
            }
            for item in menu.entries() {
                line.push_str(&format!("\n    {}: {}", item.id, item.text));
            }
        }
        if let Some(url) = cmd.browser_settings().and_then(|b| b.url.as_deref()) {
            line.push_str(&format!(" {url}"));
        }
        if cmd.load_icon_failed() {
            line.push_str(" (icons unavailable)");
        }
        line
    }
}

#[async_trait]
impl CatTransport for ConsoleCollaborators {
    async fn send_terminal_response(&self, hex: String) {
        println!("[{}] TERMINAL RESPONSE {hex}", self.slot);
    }

    async fn send_envelope(&self, hex: String) {
        println!("[{}] ENVELOPE {hex}", self.slot);
    }

    async fn request_call_setup_ack(&self, accept: bool) {
        println!("[{}] CALL SETUP {}", self.slot, if accept { "ACCEPT" } else { "REJECT" });
    }
}

#[async_trait]
impl CatApplication for ConsoleCollaborators {
    async fn notify_command(&self, cmd: CatCmdMessage) {
        println!("[{}] COMMAND {}", self.slot, Self::describe(&cmd));
        if cmd.command_type() == Some(CommandType::SetUpMenu) {
            if let Ok(mut menu) = self.last_menu.lock() {
                *menu = Some(*cmd.details());
            }
        }
        match self.last_command.lock() {
            Ok(mut last) => *last = Some(cmd),
            Err(_) => debug!(slot = self.slot, "Console state poisoned"),
        }
    }

    async fn notify_session_end(&self) {
        println!("[{}] SESSION END", self.slot);
    }

    async fn notify_card_presence(&self, present: bool) {
        println!("[{}] CARD {}", self.slot, if present { "PRESENT" } else { "ABSENT" });
    }

    async fn notify_session_ready(&self) {
        println!("[{}] READY", self.slot);
    }
}
