//! Purpose: Typed requests for writing into an editor-hosted terminal.
//! Exports: `TermRequest`, `TermSink`, `TermWriter`, `JsonlSink`, `RecordingSink`.
//! Role: Replaces interpolated editor command strings with a closed request set.
//! Invariants: Empty text is never dispatched.
//! Invariants: Only `submit` appends the configured line ending; raw sends are byte-exact.

use std::io::Write;

use serde::{Serialize, Serializer};

use crate::config::{Config, LineEnding, TermFlavor};
use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TermRequest {
    /// Vim `term_sendkeys`.
    SendKeys { channel_id: u32, text: String },
    /// Neovim `chansend`.
    Chansend {
        channel_id: u32,
        #[serde(serialize_with = "serialize_bytes_lossy")]
        bytes: Vec<u8>,
    },
}

impl TermRequest {
    pub fn payload(&self) -> &[u8] {
        match self {
            TermRequest::SendKeys { text, .. } => text.as_bytes(),
            TermRequest::Chansend { bytes, .. } => bytes,
        }
    }
}

fn serialize_bytes_lossy<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

pub trait TermSink {
    fn dispatch(&mut self, request: TermRequest) -> Result<(), Error>;
}

impl<T: TermSink + ?Sized> TermSink for &mut T {
    fn dispatch(&mut self, request: TermRequest) -> Result<(), Error> {
        (**self).dispatch(request)
    }
}

/// Writes one JSON object per request, for a host plugin to replay.
#[derive(Debug)]
pub struct JsonlSink<W: Write> {
    out: W,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TermSink for JsonlSink<W> {
    fn dispatch(&mut self, request: TermRequest) -> Result<(), Error> {
        let send_error = |err: std::io::Error| {
            Error::new(ErrorKind::Send)
                .with_message("failed to write terminal request")
                .with_source(err)
        };
        serde_json::to_writer(&mut self.out, &request).map_err(|err| {
            Error::new(ErrorKind::Send)
                .with_message("failed to encode terminal request")
                .with_source(err)
        })?;
        self.out.write_all(b"\n").map_err(send_error)?;
        self.out.flush().map_err(send_error)
    }
}

/// Keeps dispatched requests in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub requests: Vec<TermRequest>,
}

impl RecordingSink {
    /// Everything dispatched so far, concatenated as text.
    pub fn transcript(&self) -> String {
        self.requests
            .iter()
            .map(|request| String::from_utf8_lossy(request.payload()).into_owned())
            .collect()
    }
}

impl TermSink for RecordingSink {
    fn dispatch(&mut self, request: TermRequest) -> Result<(), Error> {
        self.requests.push(request);
        Ok(())
    }
}

/// Builds requests for one terminal and hands them to a sink.
#[derive(Debug)]
pub struct TermWriter<S: TermSink> {
    sink: S,
    flavor: TermFlavor,
    channel_id: u32,
    line_ending: LineEnding,
}

impl<S: TermSink> TermWriter<S> {
    pub fn new(sink: S, flavor: TermFlavor, channel_id: u32, line_ending: LineEnding) -> Self {
        Self {
            sink,
            flavor,
            channel_id,
            line_ending,
        }
    }

    pub fn from_config(sink: S, config: &Config) -> Self {
        Self::new(sink, config.terminal, config.channel_id, config.line_ending)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Sends `text` followed by the line ending, as if typed and entered.
    pub fn submit(&mut self, text: &str) -> Result<(), Error> {
        if text.is_empty() {
            return Ok(());
        }
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push_str(self.line_ending.as_str());
        self.dispatch(line)
    }

    /// Sends `text` exactly, without a line ending.
    pub fn send_raw(&mut self, text: &str) -> Result<(), Error> {
        if text.is_empty() {
            return Ok(());
        }
        self.dispatch(text.to_string())
    }

    pub fn send_key(&mut self, key: char) -> Result<(), Error> {
        self.send_raw(key.encode_utf8(&mut [0u8; 4]))
    }

    fn dispatch(&mut self, text: String) -> Result<(), Error> {
        let request = match self.flavor {
            TermFlavor::Vim => TermRequest::SendKeys {
                channel_id: self.channel_id,
                text,
            },
            TermFlavor::Neovim => TermRequest::Chansend {
                channel_id: self.channel_id,
                bytes: text.into_bytes(),
            },
        };
        self.sink.dispatch(request)
    }
}
