//! Wire format shared by [`crate::server`] and [`crate::client`].
//!
//! Requests are command lines terminated by a NUL byte. Responses are the
//! raw output of the command followed by one [`SENTINEL`] byte. There is no
//! length prefix: the server reassembles requests from whatever the stream
//! delivers, splitting on NUL, so one receive may carry several requests or
//! only part of one. A request longer than [`COMM_BUFFER_SIZE`] (terminator
//! included) is discarded up to its NUL and answered with a single error.

use std::io::{self, ErrorKind, Read, Write};

use crate::error::ProtocolError;

/// End-of-response marker (ASCII EOT), not expected in normal text output.
pub const SENTINEL: u8 = 0x04;
/// Receive buffer size, and therefore the largest request accepted.
pub const COMM_BUFFER_SIZE: usize = 64 * 1024;

pub const DEFAULT_PORT: u16 = 1234;
pub const DEFAULT_SERVER_IFACE: &str = "0.0.0.0";
pub const DEFAULT_CLIENT_ADDR: &str = "127.0.0.1";

pub const MSG_GOODBYE: &str = "Goodbye!\n";
pub const MSG_STOPPING: &str = "Server stopping...\n";
pub const MSG_EXECUTED: &str = "Command executed.\n";

pub fn write_request(w: &mut impl Write, line: &str) -> Result<(), ProtocolError> {
    let len = line.len() + 1;
    if len > COMM_BUFFER_SIZE {
        return Err(ProtocolError::Oversized(len));
    }
    let mut data = Vec::with_capacity(len);
    data.extend_from_slice(line.as_bytes());
    data.push(0);
    w.write_all(&data)?;
    w.flush()?;
    Ok(())
}

/// Send `body` and close the response with the sentinel.
pub fn write_response(w: &mut impl Write, body: &[u8]) -> io::Result<()> {
    w.write_all(body)?;
    write_eof(w)
}

pub fn write_eof(w: &mut impl Write) -> io::Result<()> {
    w.write_all(&[SENTINEL])?;
    w.flush()
}

/// Largest request body accepted, not counting the NUL terminator.
pub const MAX_REQUEST_LEN: usize = COMM_BUFFER_SIZE - 1;

/// Reassembles NUL-terminated requests from a byte stream.
#[derive(Debug, Default)]
pub struct RequestFramer {
    pending: Vec<u8>,
    /// Bytes of an over-limit request thrown away so far.
    dropped: Option<usize>,
}

impl RequestFramer {
    pub fn new() -> Self { RequestFramer::default() }

    /// Bytes received that are not yet terminated.
    pub fn has_pending(&self) -> bool { !self.pending.is_empty() || self.dropped.is_some() }

    /// Feed one receive. Every request completed by it is returned in order,
    /// trimmed of whitespace, or as the error it is answered with. Zero-byte
    /// requests (back-to-back NULs) are skipped.
    pub fn push(&mut self, data: &[u8]) -> Vec<Result<String, ProtocolError>> {
        let mut requests = Vec::new();
        let mut rest = data;
        loop {
            let nul = rest.iter().position(|&b| b == 0);
            let piece = &rest[..nul.unwrap_or(rest.len())];
            if let Some(n) = &mut self.dropped {
                *n += piece.len();
            } else if self.pending.len() + piece.len() > MAX_REQUEST_LEN {
                self.dropped = Some(self.pending.len() + piece.len());
                self.pending = Vec::new();
            } else {
                self.pending.extend_from_slice(piece);
            }
            let Some(i) = nul else { break };
            rest = &rest[i + 1..];
            if let Some(n) = self.dropped.take() {
                requests.push(Err(ProtocolError::Oversized(n + 1)));
                continue;
            }
            let body = std::mem::take(&mut self.pending);
            if body.is_empty() {
                continue;
            }
            requests.push(match String::from_utf8(body) {
                Ok(line) => Ok(line.trim().to_string()),
                Err(_) => Err(ProtocolError::InvalidUtf8),
            });
        }
        requests
    }
}

/// `read` that retries on EINTR.
pub fn read_chunk(r: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match r.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
