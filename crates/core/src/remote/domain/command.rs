use crate::shared::constants::{COMMAND_START, COMMAND_STOP};

/// Control commands a remote peer can send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

impl Command {
    /// Matches the exact wire strings; anything else is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            COMMAND_START => Some(Command::Start),
            COMMAND_STOP => Some(Command::Stop),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => COMMAND_START,
            Command::Stop => COMMAND_STOP,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
