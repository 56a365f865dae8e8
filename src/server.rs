use std::io::{self, ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::unix::io::AsRawFd;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::builtin::{self, BuiltinOutcome, ShellState};
use crate::error::ProtocolError;
use crate::exec::{run_pipeline, IoBinding};
use crate::parser::parse_pipeline;
use crate::protocol::{
    read_chunk, write_eof, write_response, RequestFramer, COMM_BUFFER_SIZE, MSG_EXECUTED,
    MSG_GOODBYE, MSG_STOPPING,
};
use crate::{EXIT_CMD, STOP_SERVER_CMD};

/// How a session finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client sent `exit` or hung up; keep accepting.
    ClientExited,
    /// Client sent `stop-server`; the accept loop ends.
    StopRequested,
}

/// Serves one client at a time: a session runs to completion before the next
/// connection is accepted.
pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        Ok(Server { listener: TcpListener::bind(addr)? })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> { self.listener.local_addr() }

    /// Accept and serve clients until one asks the server to stop.
    pub fn run(self) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(conn) => conn,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("accept failed"),
            };
            info!("client {} connected", peer);
            match Session::new(stream).run() {
                Ok(SessionEnd::StopRequested) => {
                    info!("client {} requested server to stop, stopping...", peer);
                    return Ok(());
                }
                Ok(SessionEnd::ClientExited) => info!("client {} exited: getting next connection...", peer),
                Err(e) => warn!("session with {} ended: {}", peer, e),
            }
        }
    }
}

/// One accepted connection.
pub struct Session {
    stream: TcpStream,
    buf: Vec<u8>,
    framer: RequestFramer,
    state: ShellState,
}

impl Session {
    pub fn new(stream: TcpStream) -> Self {
        Session { stream, buf: vec![0; COMM_BUFFER_SIZE], framer: RequestFramer::new(), state: ShellState::default() }
    }

    pub fn last_status(&self) -> i32 { self.state.last_status }

    pub fn run(&mut self) -> Result<SessionEnd, ProtocolError> {
        loop {
            let n = read_chunk(&mut self.stream, &mut self.buf)?;
            if n == 0 {
                if self.framer.has_pending() {
                    debug!("dropping unterminated request");
                }
                debug!("peer closed the connection");
                return Ok(SessionEnd::ClientExited);
            }
            for request in self.framer.push(&self.buf[..n]) {
                let end = match request {
                    Ok(line) => self.handle(&line)?,
                    Err(e) => {
                        warn!("rejected request: {}", e);
                        write_response(&mut self.stream, format!("{}\n", e).as_bytes())?;
                        None
                    }
                };
                if let Some(end) = end {
                    return Ok(end);
                }
            }
        }
    }

    fn handle(&mut self, line: &str) -> Result<Option<SessionEnd>, ProtocolError> {
        debug!("received command: {}", line);
        match line {
            EXIT_CMD => return self.finish(MSG_GOODBYE, SessionEnd::ClientExited),
            STOP_SERVER_CMD => return self.finish(MSG_STOPPING, SessionEnd::StopRequested),
            _ => {}
        }

        let pipeline = match parse_pipeline(line) {
            Ok(p) => p,
            Err(e) => {
                write_response(&mut self.stream, format!("{}\n", e).as_bytes())?;
                return Ok(None);
            }
        };

        let (mut out, mut err) = (Vec::new(), Vec::new());
        match builtin::dispatch(&pipeline, &mut self.state, &mut out, &mut err)? {
            BuiltinOutcome::Exit => return self.finish(MSG_GOODBYE, SessionEnd::ClientExited),
            BuiltinOutcome::StopServer => return self.finish(MSG_STOPPING, SessionEnd::StopRequested),
            BuiltinOutcome::Executed(_) => {
                out.append(&mut err);
                if out.is_empty() {
                    out.extend_from_slice(MSG_EXECUTED.as_bytes());
                }
                write_response(&mut self.stream, &out)?;
                return Ok(None);
            }
            BuiltinOutcome::NotBuiltin => {}
        }

        info!("rdsh-exec: {}", line);
        match run_pipeline(&pipeline, &IoBinding::socket(self.stream.as_raw_fd())) {
            Ok(status) => self.state.last_status = status.aggregate,
            Err(e) => {
                self.state.last_status = 1;
                writeln!(self.stream, "rdsh-error: {}", e)?;
            }
        }
        write_eof(&mut self.stream)?;
        Ok(None)
    }

    fn finish(&mut self, msg: &str, end: SessionEnd) -> Result<Option<SessionEnd>, ProtocolError> {
        write_response(&mut self.stream, msg.as_bytes())?;
        Ok(Some(end))
    }
}
