//! Purpose: Deliver cell text to a remote receiver over one persistent TCP stream.
//! Exports: `SocketChannel`, `ChannelStatus`, `is_closed`, `MESSAGE_TERMINATOR`.
//! Role: Lazily connected, transparently reconnected transport owned by the session.
//! Invariants: Every message on the wire ends with exactly one NUL terminator.
//! Invariants: At most one connect attempt is made per `send`; nothing is retried.
//! Invariants: `is_closed` never blocks and never consumes buffered bytes.

use std::io::{self, Write};
use std::net::TcpStream;

use crate::core::error::{Error, ErrorKind};

pub const MESSAGE_TERMINATOR: u8 = 0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelStatus {
    Unopened,
    Open,
    Closed,
}

#[derive(Debug)]
pub struct SocketChannel {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
    status: ChannelStatus,
}

impl SocketChannel {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            stream: None,
            status: ChannelStatus::Unopened,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Last known status; does not probe the connection.
    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    /// Probes the stream and downgrades the status when the peer went away.
    pub fn is_open(&mut self) -> bool {
        let closed = match &self.stream {
            Some(stream) => is_closed(stream),
            None => return false,
        };
        if closed {
            tracing::debug!(host = %self.host, port = self.port, "socket peer closed");
            self.stream = None;
            self.status = ChannelStatus::Closed;
        }
        !closed
    }

    pub fn connect(&mut self) -> Result<(), Error> {
        tracing::debug!(host = %self.host, port = self.port, "connecting socket channel");
        match TcpStream::connect((self.host.as_str(), self.port)) {
            Ok(stream) => {
                // Small cells should go out immediately rather than wait for coalescing.
                let _ = stream.set_nodelay(true);
                self.stream = Some(stream);
                self.status = ChannelStatus::Open;
                Ok(())
            }
            Err(err) => {
                self.stream = None;
                self.status = ChannelStatus::Closed;
                Err(Error::new(ErrorKind::Connect)
                    .with_message(format!(
                        "failed to connect to {}:{}",
                        self.host, self.port
                    ))
                    .with_hint("Check that the receiver is listening on the configured host/port.")
                    .with_source(err))
            }
        }
    }

    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        if self.status == ChannelStatus::Open {
            self.status = ChannelStatus::Closed;
        }
    }

    /// Sends one NUL-terminated message, reconnecting first if the stream is gone.
    pub fn send(&mut self, text: &str) -> Result<(), Error> {
        if text.is_empty() {
            return Ok(());
        }
        if !self.is_open() {
            if self.status == ChannelStatus::Closed {
                tracing::debug!(host = %self.host, port = self.port, "reconnecting socket channel");
            }
            self.connect()?;
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::new(ErrorKind::Internal).with_message("socket channel has no stream"));
        };
        if let Err(err) = write_message(stream, text) {
            self.stream = None;
            self.status = ChannelStatus::Closed;
            return Err(Error::new(ErrorKind::Send)
                .with_message(format!("failed to send to {}:{}", self.host, self.port))
                .with_source(err));
        }
        tracing::debug!(bytes = text.len(), "sent cell over socket");
        Ok(())
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn write_message(stream: &mut TcpStream, text: &str) -> io::Result<()> {
    stream.write_all(text.as_bytes())?;
    if !text.as_bytes().ends_with(&[MESSAGE_TERMINATOR]) {
        stream.write_all(&[MESSAGE_TERMINATOR])?;
    }
    stream.flush()
}

/// Best-effort check for a peer that has shut down the connection.
///
/// Zero bytes on a non-blocking peek means an orderly shutdown; would-block means
/// the stream is idle but open; any other error counts as closed.
#[cfg(unix)]
pub fn is_closed(stream: &TcpStream) -> bool {
    use std::os::unix::io::AsRawFd;

    let mut buf = [0u8; 16];
    let rc = unsafe {
        libc::recv(
            stream.as_raw_fd(),
            buf.as_mut_ptr().cast::<libc::c_void>(),
            buf.len(),
            libc::MSG_PEEK | libc::MSG_DONTWAIT,
        )
    };
    if rc > 0 {
        return false;
    }
    if rc == 0 {
        return true;
    }
    io::Error::last_os_error().kind() != io::ErrorKind::WouldBlock
}

#[cfg(not(unix))]
pub fn is_closed(stream: &TcpStream) -> bool {
    let mut buf = [0u8; 16];
    if stream.set_nonblocking(true).is_err() {
        return true;
    }
    let closed = match stream.peek(&mut buf) {
        Ok(0) => true,
        Ok(_) => false,
        Err(err) => err.kind() != io::ErrorKind::WouldBlock,
    };
    if stream.set_nonblocking(false).is_err() {
        return true;
    }
    closed
}
