//! Client console commands

use crate::protocol::constants::COMMAND_PREFIX;

/// A parsed client console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Quit,
    Logoff,
    SetHost(Option<String>),
    SetPort(Option<String>),
    Login,
    GetHost,
    GetPort,
    Unknown(String),
}

impl ClientCommand {
    /// Parse a console line; `None` if it should be sent to the server
    pub fn parse(line: &str) -> Option<Self> {
        if !line.starts_with(COMMAND_PREFIX) {
            return None;
        }

        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, Some(rest.trim()).filter(|s| !s.is_empty())),
            None => (line, None),
        };
        let arg = arg.map(str::to_string);
        let name = name.to_lowercase();

        let command = match name.as_str() {
            "#quit" => ClientCommand::Quit,
            "#logoff" => ClientCommand::Logoff,
            "#sethost" => ClientCommand::SetHost(arg),
            "#setport" => ClientCommand::SetPort(arg),
            "#login" => ClientCommand::Login,
            "#gethost" => ClientCommand::GetHost,
            "#getport" => ClientCommand::GetPort,
            _ => ClientCommand::Unknown(name),
        };

        Some(command)
    }
}
