use bytes::BytesMut;
use std::{
    fmt::{self, Write},
    io::{self},
    str,
};
use tokio_util::codec::{Decoder, Encoder};

use crate::proto::command::Command;

/// Line codec for SCPI style instruments.
///
/// Outbound commands are rendered as text and terminated with the
/// configured terminator. Inbound data is split at `\n`, a trailing
/// `\r` is dropped.
pub struct ScpiCodec {
    terminator: String,
}

impl ScpiCodec {
    pub fn new(terminator: impl Into<String>) -> Self {
        Self {
            terminator: terminator.into(),
        }
    }

    fn convert_line(mut line: BytesMut) -> io::Result<String> {
        if line.last() == Some(&b'\n') {
            line.truncate(line.len() - 1);
        }
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Ok(str::from_utf8(&line)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
            .to_string())
    }
}

impl Default for ScpiCodec {
    fn default() -> Self {
        Self::new(crate::DEFAULT_TERMINATOR)
    }
}

impl Decoder for ScpiCodec {
    type Item = String;
    // Device reported errors are ordinary response lines at this level.
    // Only framing and I/O problems are errors here.
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|b| *b == b'\n') {
            Some(n) => Self::convert_line(src.split_to(n + 1)).map(Some),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            // Unterminated answer, take what the device sent
            None => Self::convert_line(src.split()).map(Some),
        }
    }
}

fn write_fmt_guarded(dst: &mut BytesMut, args: fmt::Arguments<'_>) -> Result<(), io::Error> {
    dst.write_fmt(args)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

impl Encoder<Command> for ScpiCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.to_string();
        if !line.is_ascii() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Command is not ASCII: {:?}", line),
            ));
        }
        write_fmt_guarded(dst, format_args!("{}{}", line, self.terminator))
    }
}
