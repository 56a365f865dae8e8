use std::ffi::NulError;
use std::io;
use thiserror::Error;

use crate::redirect::RedirectKind;
use crate::{MAX_ARGS, MAX_COMMANDS, MAX_LINE_LEN, MAX_TOKEN_LEN};

/// Rejections produced while turning a line into a pipeline. The `Display`
/// text is what the user (or remote peer) gets to see.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("warning: no commands provided")]
    NoCommands,
    #[error("error: piping limited to {} commands", MAX_COMMANDS)]
    TooManyCommands,
    #[error("error: too many arguments, limit is {} per command", MAX_ARGS)]
    TooManyArguments,
    #[error("error: argument longer than {} characters", MAX_TOKEN_LEN)]
    TokenTooLong,
    #[error("error: command line longer than {} characters", MAX_LINE_LEN)]
    LineTooLong,
}

/// Failures that abort a whole pipeline before or while its children start.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("missing filename for redirection `{0}`")]
    MissingRedirectionTarget(RedirectKind),
    #[error("no program left to run after redirection")]
    NoProgram,
    #[error("argument contains a NUL byte")]
    Nul(#[from] NulError),
    #[error("pipe: {0}")]
    Pipe(#[source] nix::Error),
    #[error("fork: {0}")]
    Fork(#[source] nix::Error),
    #[error("wait: {0}")]
    Wait(#[source] nix::Error),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection i/o: {0}")]
    Io(#[from] io::Error),
    #[error("peer closed the connection")]
    Closed,
    #[error("error: request of {0} bytes exceeds the receive buffer")]
    Oversized(usize),
    #[error("error: request is not valid UTF-8")]
    InvalidUtf8,
}
