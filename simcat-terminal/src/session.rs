//! Per-slot session state
//!
//! A [`Session`] holds the command waiting for an application decision and
//! the installed main menu. It is owned by the dispatcher task and never
//! shared.

use simcat_proto::{CatCmdMessage, CommandDetails};

/// Dispatcher state derived from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No outstanding command
    Idle,
    /// One command forwarded to the application, waiting for its decision
    AwaitingResponse,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::AwaitingResponse => write!(f, "AwaitingResponse"),
        }
    }
}

/// Outstanding command and installed menu of one slot.
#[derive(Debug, Default)]
pub struct Session {
    current: Option<CatCmdMessage>,
    menu: Option<CatCmdMessage>,
    card_present: Option<bool>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        if self.current.is_some() {
            SessionState::AwaitingResponse
        } else {
            SessionState::Idle
        }
    }

    pub fn current(&self) -> Option<&CatCmdMessage> {
        self.current.as_ref()
    }

    pub fn menu(&self) -> Option<&CatCmdMessage> {
        self.menu.as_ref()
    }

    /// Makes `cmd` the outstanding command, replacing any earlier one.
    pub fn set_current(&mut self, cmd: CatCmdMessage) {
        self.current = Some(cmd);
    }

    pub fn clear_current(&mut self) {
        self.current = None;
    }

    pub fn set_menu(&mut self, cmd: CatCmdMessage) {
        self.menu = Some(cmd);
    }

    pub fn clear_menu(&mut self) {
        self.menu = None;
    }

    /// Re-arms the installed menu as the outstanding command.
    pub fn end_session(&mut self) {
        self.current = self.menu.clone();
    }

    /// True if `details` answer the outstanding command.
    pub fn matches_current(&self, details: &CommandDetails) -> bool {
        self.current
            .as_ref()
            .is_some_and(|cmd| cmd.details() == details)
    }

    /// Records the card presence and returns the previous value.
    ///
    /// A removed card takes the outstanding command and the menu with it.
    pub fn set_card_present(&mut self, present: bool) -> Option<bool> {
        if !present {
            self.current = None;
            self.menu = None;
        }
        self.card_present.replace(present)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            current: self.current.as_ref().map(|cmd| *cmd.details()),
            menu: self.menu.as_ref().map(|cmd| *cmd.details()),
            card_present: self.card_present,
        }
    }
}

/// Point-in-time view of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Details of the outstanding command
    pub current: Option<CommandDetails>,
    /// Details of the installed menu
    pub menu: Option<CommandDetails>,
    /// Last reported card presence, `None` before the first report
    pub card_present: Option<bool>,
}
