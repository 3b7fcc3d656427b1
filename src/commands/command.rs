use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::Store;

/// Replies with an empty array: no command docs are advertised. Clients send `COMMAND` on
/// connect, with any number of arguments.
#[derive(Debug, PartialEq)]
pub struct Command {}

impl Executable for Command {
    fn exec(self, _store: Store) -> Result<Frame, CommandError> {
        Ok(Frame::Array(vec![]))
    }
}

impl TryFrom<&mut CommandParser> for Command {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.skip_rest();
        Ok(Self {})
    }
}
