use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::{Store, Value};

/// Set `key` to hold the string `value`. If `key` already holds a value, it is overwritten,
/// regardless of its type.
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: Bytes,
    pub value: Bytes,
}

impl Executable for Set {
    fn exec(self, store: Store) -> Result<Frame, CommandError> {
        store.lock().set(self.key, Value::from(self.value));

        Ok(Frame::simple("OK"))
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes("key")?;
        let value = parser.next_bytes("value")?;

        Ok(Self { key, value })
    }
}
