use bytes::Bytes;
use std::env::consts::{ARCH, OS};
use std::process;

use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::Store;

#[derive(Debug, PartialEq)]
pub struct Info;

impl Executable for Info {
    fn exec(self, _store: Store) -> Result<Frame, CommandError> {
        let info = format!(
            "# Server\r\n\
             arcdis_version:{}\r\n\
             os:{OS}\r\n\
             arch:{ARCH}\r\n\
             process_id:{}\r\n",
            env!("CARGO_PKG_VERSION"),
            process::id(),
        );

        Ok(Frame::Bulk(Bytes::from(info)))
    }
}

impl TryFrom<&mut CommandParser> for Info {
    type Error = CommandError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
