use std::io::{BufRead, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use log::{debug, info, warn};

use crate::error::ProtocolError;
use crate::local::next_line;
use crate::protocol::{read_chunk, write_request, COMM_BUFFER_SIZE, SENTINEL};
use crate::EXIT_CMD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Full response received, sentinel seen.
    Complete,
    /// `exit` was sent and the farewell consumed.
    Exited,
    /// The server closed the connection mid-response.
    Closed,
}

pub struct Client {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl Client {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect(addr)?;
        info!("connected to {}", stream.peer_addr()?);
        Ok(Client { stream, buf: vec![0; COMM_BUFFER_SIZE] })
    }

    /// Send one command line and copy its response to `out`, minus the
    /// sentinel. `exit` gets exactly one receive for the farewell.
    pub fn execute(&mut self, line: &str, out: &mut impl Write) -> Result<Reply, ProtocolError> {
        let line = line.trim();
        match write_request(&mut self.stream, line) {
            Err(ProtocolError::Io(e)) if matches!(e.kind(), ErrorKind::BrokenPipe | ErrorKind::ConnectionReset) => {
                debug!("send failed: {}", e);
                return Ok(Reply::Closed);
            }
            other => other?,
        }
        if line == EXIT_CMD {
            let n = read_chunk(&mut self.stream, &mut self.buf)?;
            let chunk = &self.buf[..n];
            out.write_all(chunk.strip_suffix(&[SENTINEL]).unwrap_or(chunk))?;
            out.flush()?;
            return Ok(Reply::Exited);
        }
        relay_response(&mut self.stream, out, &mut self.buf)
    }

    /// Read lines from `input` and run each remotely until `exit`, end of
    /// input, or the server hanging up. Blank lines are not sent.
    pub fn run(&mut self, mut input: impl BufRead, out: &mut impl Write, prompt: Option<&str>) -> Result<(), ProtocolError> {
        loop {
            if let Some(p) = prompt {
                write!(out, "{}", p)?;
                out.flush()?;
            }
            let line = match next_line(&mut input)? {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    warn!("skipping input line: {}", e);
                    eprintln!("rdsh: input line is not valid UTF-8, not sent");
                    continue;
                }
                None => {
                    if prompt.is_some() { writeln!(out)?; }
                    return Ok(());
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match self.execute(&line, out)? {
                Reply::Complete => {}
                Reply::Exited => return Ok(()),
                Reply::Closed => {
                    writeln!(out, "Server closed connection")?;
                    return Ok(());
                }
            }
        }
    }
}

/// Copy response chunks to `out` until one ends with the sentinel.
pub fn relay_response(stream: &mut impl Read, out: &mut impl Write, buf: &mut [u8]) -> Result<Reply, ProtocolError> {
    loop {
        let n = read_chunk(stream, buf)?;
        if n == 0 {
            debug!("server closed the connection mid-response");
            return Ok(Reply::Closed);
        }
        let chunk = &buf[..n];
        if let Some(body) = chunk.strip_suffix(&[SENTINEL]) {
            out.write_all(body)?;
            out.flush()?;
            return Ok(Reply::Complete);
        }
        out.write_all(chunk)?;
    }
}
