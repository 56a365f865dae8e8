use std::ffi::CString;
use std::fmt;
use std::os::unix::io::RawFd;

use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup2};

use crate::command::Command;
use crate::error::ExecError;

/// Permission bits for files created by `>` and `>>`.
pub const CREATE_MODE: u32 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind { Input, Truncate, Append }

impl RedirectKind {
    pub fn from_token(tok: &str) -> Option<Self> {
        match tok {
            "<" => Some(RedirectKind::Input),
            ">" => Some(RedirectKind::Truncate),
            ">>" => Some(RedirectKind::Append),
            _ => None,
        }
    }

    pub fn is_input(self) -> bool { self == RedirectKind::Input }

    /// Standard stream replaced by this redirection.
    pub fn target_fd(self) -> RawFd {
        if self.is_input() { libc::STDIN_FILENO } else { libc::STDOUT_FILENO }
    }

    fn flags(self) -> OFlag {
        match self {
            RedirectKind::Input => OFlag::O_RDONLY,
            RedirectKind::Truncate => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
            RedirectKind::Append => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_APPEND,
        }
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RedirectKind::Input => "<",
            RedirectKind::Truncate => ">",
            RedirectKind::Append => ">>",
        })
    }
}

/// A redirection lifted out of a stage's arguments. `position` is where the
/// operator sat in the original argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectionSpec {
    pub kind: RedirectKind,
    pub target: CString,
    pub position: usize,
}

/// Remove redirection operators and their filenames from `cmd`.
///
/// Only the first input and the first output redirection are taken; any later
/// operator for a direction already taken stays in place as a plain argument.
pub fn take_redirections(cmd: &mut Command) -> Result<Vec<RedirectionSpec>, ExecError> {
    let mut specs: Vec<RedirectionSpec> = Vec::new();
    let (mut have_in, mut have_out) = (false, false);
    let mut removed = 0;
    let mut i = 0;
    while i < cmd.argc() {
        let kind = match cmd.arg(i).and_then(RedirectKind::from_token) {
            Some(k) if !(if k.is_input() { have_in } else { have_out }) => k,
            _ => { i += 1; continue; }
        };
        let target = cmd.arg(i + 1).ok_or(ExecError::MissingRedirectionTarget(kind))?;
        specs.push(RedirectionSpec { kind, target: CString::new(target)?, position: i + removed });
        if kind.is_input() { have_in = true; } else { have_out = true; }
        cmd.remove_args(i, 2);
        removed += 2;
    }
    Ok(specs)
}

/// Open the target and splice it over the matching standard stream. Runs in
/// the forked child, so it must not allocate.
pub(crate) fn apply(spec: &RedirectionSpec) -> nix::Result<()> {
    let fd = open(spec.target.as_c_str(), spec.kind.flags(), Mode::from_bits_truncate(CREATE_MODE))?;
    let target = spec.kind.target_fd();
    if fd == target {
        return Ok(());
    }
    let res = dup2(fd, target);
    let _ = close(fd);
    res.map(drop)
}
