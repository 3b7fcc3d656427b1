pub mod command;
pub mod executable;
pub mod get;
pub mod info;
pub mod keys;
pub mod set;
pub mod type_;

use bytes::Bytes;
use std::str::FromStr;
use std::vec;
use strum_macros::{Display, EnumString};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::Store;

use command::Command as Command_;
use get::Get;
use info::Info;
use keys::Keys;
use set::Set;
use type_::Type;

#[derive(Debug, PartialEq)]
pub enum Command {
    Get(Get),
    Keys(Keys),
    Set(Set),
    Type(Type),

    Command(Command_),
    Info(Info),
}

impl Executable for Command {
    fn exec(self, store: Store) -> Result<Frame, CommandError> {
        match self {
            Command::Command(cmd) => cmd.exec(store),
            Command::Get(cmd) => cmd.exec(store),
            Command::Info(cmd) => cmd.exec(store),
            Command::Keys(cmd) => cmd.exec(store),
            Command::Set(cmd) => cmd.exec(store),
            Command::Type(cmd) => cmd.exec(store),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = CommandError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the server as RESP arrays.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => return Err(CommandError::InvalidRequest(frame.type_name())),
        };

        let mut parts = frames.into_iter();
        let name = match parts.next() {
            Some(Frame::Simple(name)) | Some(Frame::Bulk(name)) => name,
            Some(_) => return Err(CommandError::InvalidCommandName),
            None => return Err(CommandError::EmptyRequest),
        };

        // Names are matched regardless of case.
        let name = std::str::from_utf8(&name)
            .ok()
            .and_then(|name| CommandName::from_str(name).ok())
            .ok_or_else(|| CommandError::UnknownCommand(printable(&name)))?;

        let parser = &mut CommandParser { name, parts };

        let command = match name {
            CommandName::Command => Command_::try_from(&mut *parser).map(Command::Command),
            CommandName::Get => Get::try_from(&mut *parser).map(Command::Get),
            CommandName::Info => Info::try_from(&mut *parser).map(Command::Info),
            CommandName::Keys => Keys::try_from(&mut *parser).map(Command::Keys),
            CommandName::Set => Set::try_from(&mut *parser).map(Command::Set),
            CommandName::Type => Type::try_from(&mut *parser).map(Command::Type),
        }?;

        parser.finish()?;

        Ok(command)
    }
}

/// Renders client-supplied bytes for an error reply. The result is ASCII without CR or LF, so the
/// reply stays a single simple error.
fn printable(bytes: &[u8]) -> String {
    const MAX_LEN: usize = 128;

    let mut s = bytes[..bytes.len().min(MAX_LEN)].escape_ascii().to_string();
    if bytes.len() > MAX_LEN {
        s.push_str("...");
    }
    s
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub(crate) enum CommandName {
    Command,
    Get,
    Info,
    Keys,
    Set,
    Type,
}

pub(crate) struct CommandParser {
    name: CommandName,
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    fn next_frame(&mut self) -> Result<Frame, CommandError> {
        self.parts
            .next()
            .ok_or_else(|| CommandError::WrongArity(self.name.to_string()))
    }

    /// Both `Simple` and `Bulk` frames are accepted as strings. While errors are stored as
    /// bytes, they are considered separate types.
    fn next_bytes(&mut self, argument: &'static str) -> Result<Bytes, CommandError> {
        match self.next_frame()? {
            Frame::Simple(bytes) | Frame::Bulk(bytes) => Ok(bytes),
            _ => Err(CommandError::InvalidArgument { argument }),
        }
    }

    fn skip_rest(&mut self) {
        self.parts.by_ref().for_each(drop);
    }

    fn finish(&mut self) -> Result<(), CommandError> {
        if self.parts.len() > 0 {
            return Err(CommandError::WrongArity(self.name.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandError {
    #[error("ERR Protocol error: expected array, got {0}")]
    InvalidRequest(&'static str),
    #[error("ERR Protocol error: empty request")]
    EmptyRequest,
    #[error("ERR Protocol error: command must be a string")]
    InvalidCommandName,
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),
    #[error("ERR {argument} must be a string")]
    InvalidArgument { argument: &'static str },
    #[error("ERR invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
}
