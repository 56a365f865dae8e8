use std::ffi::CString;
use std::ptr;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::io::RawFd;

use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{kill, signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup2, fork, pipe2, ForkResult, Pid};

use crate::command::Pipeline;
use crate::error::ExecError;
use crate::redirect::{self, take_redirections, RedirectionSpec};
use crate::SPECIAL_STATUS;

/// Exit status of a stage whose program could not be found.
pub const STATUS_NOT_FOUND: i32 = 127;
/// Exit status of a stage whose program was found but could not be run.
pub const STATUS_NOT_EXECUTABLE: i32 = 126;

/// Where the outer ends of a pipeline attach: stdin of the first stage,
/// stdout of the last, stderr of all. `None` keeps the caller's stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoBinding {
    pub stdin: Option<RawFd>,
    pub stdout: Option<RawFd>,
    pub stderr: Option<RawFd>,
}

impl IoBinding {
    pub fn terminal() -> Self { IoBinding::default() }

    pub fn socket(fd: RawFd) -> Self {
        IoBinding { stdin: Some(fd), stdout: Some(fd), stderr: Some(fd) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Inherit,
    Fd(RawFd),
    /// Read end of pipe `n` (between stage `n` and `n + 1`).
    PipeRead(usize),
    /// Write end of pipe `n`.
    PipeWrite(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageWiring {
    pub stdin: Endpoint,
    pub stdout: Endpoint,
    pub stderr: Endpoint,
}

/// Stream triple for every stage of an `stages`-long pipeline. stderr always
/// goes to the error binding; it is never chained through a pipe.
pub fn wiring_table(stages: usize, io: &IoBinding) -> Vec<StageWiring> {
    let outer = |fd: Option<RawFd>| fd.map_or(Endpoint::Inherit, Endpoint::Fd);
    (0..stages)
        .map(|i| StageWiring {
            stdin: if i == 0 { outer(io.stdin) } else { Endpoint::PipeRead(i - 1) },
            stdout: if i + 1 == stages { outer(io.stdout) } else { Endpoint::PipeWrite(i) },
            stderr: outer(io.stderr),
        })
        .collect()
}

/// The aggregate is the last stage's status, unless some stage exited with
/// [`SPECIAL_STATUS`], which then wins wherever it occurred.
pub fn aggregate_status(stages: &[i32]) -> i32 {
    if stages.contains(&SPECIAL_STATUS) {
        SPECIAL_STATUS
    } else {
        stages.last().copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    /// One entry per stage, in stage order.
    pub stages: Vec<i32>,
    pub aggregate: i32,
}

struct StagePlan {
    argv: Vec<CString>,
    /// `argv` as a NULL-terminated pointer table for `execvp(3)`. The pointers
    /// borrow the heap buffers of `argv`, which never move.
    argv_ptrs: Vec<*const libc::c_char>,
    redirects: Vec<RedirectionSpec>,
    wiring: StageWiring,
}

// Everything a child needs is prepared here, before the first fork.
fn plan(pipeline: &Pipeline, io: &IoBinding) -> Result<Vec<StagePlan>, ExecError> {
    let table = wiring_table(pipeline.len(), io);
    pipeline
        .iter()
        .zip(table)
        .map(|(cmd, wiring)| {
            let mut cmd = cmd.clone();
            let redirects = take_redirections(&mut cmd)?;
            if cmd.is_empty() {
                return Err(ExecError::NoProgram);
            }
            let argv = cmd.argv().map(CString::new).collect::<Result<Vec<_>, _>>()?;
            let argv_ptrs = argv.iter().map(|a| a.as_ptr()).chain(Some(ptr::null())).collect();
            Ok(StagePlan { argv, argv_ptrs, redirects, wiring })
        })
        .collect()
}

/// Run every stage of `pipeline` as its own child process, chained with
/// pipes, and wait for all of them.
pub fn run_pipeline(pipeline: &Pipeline, io: &IoBinding) -> Result<PipelineStatus, ExecError> {
    let plans = plan(pipeline, io)?;

    let mut pipes: Vec<(OwnedFd, OwnedFd)> = Vec::with_capacity(plans.len().saturating_sub(1));
    for _ in 1..plans.len() {
        // on error the pipes created so far are closed when `pipes` drops
        pipes.push(pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?);
    }

    let mut children: Vec<Pid> = Vec::with_capacity(plans.len());
    for stage in &plans {
        match unsafe { fork() } {
            Ok(ForkResult::Child) => exec_stage(stage, &pipes),
            Ok(ForkResult::Parent { child }) => {
                debug!("stage {} {:?} started as pid {}", children.len(), stage.argv[0], child);
                children.push(child);
            }
            Err(e) => {
                drop(pipes);
                abort_children(&children);
                return Err(ExecError::Fork(e));
            }
        }
    }
    // the parent must not hold any pipe end, or readers never see EOF
    drop(pipes);

    let mut stages = Vec::with_capacity(children.len());
    let mut failure = None;
    for pid in children {
        match wait_exit_code(pid) {
            Ok(code) => stages.push(code),
            Err(e) => {
                warn!("wait for pid {} failed: {}", pid, e);
                failure.get_or_insert(e);
            }
        }
    }
    if let Some(e) = failure {
        return Err(e);
    }
    let aggregate = aggregate_status(&stages);
    debug!("pipeline statuses {:?} -> {}", stages, aggregate);
    Ok(PipelineStatus { stages, aggregate })
}

fn wait_exit_code(pid: Pid) -> Result<i32, ExecError> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(128 + sig as i32),
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(e) => return Err(ExecError::Wait(e)),
        }
    }
}

fn abort_children(children: &[Pid]) {
    for &pid in children {
        let _ = kill(pid, Signal::SIGKILL);
        let _ = waitpid(pid, None);
    }
}

// ---- child side: no allocation from here on ----

fn exec_stage(stage: &StagePlan, pipes: &[(OwnedFd, OwnedFd)]) -> ! {
    let wired = wire(&stage.wiring, pipes);
    for (r, w) in pipes {
        let _ = close(r.as_raw_fd());
        let _ = close(w.as_raw_fd());
    }
    if let Err(e) = wired {
        report(b"dup2", e);
        child_exit(1);
    }
    // the shell ignores SIGPIPE; programs expect the default
    let _ = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) };
    for spec in &stage.redirects {
        if let Err(e) = redirect::apply(spec) {
            report(spec.target.as_bytes(), e);
            child_exit(1);
        }
    }
    unsafe { libc::execvp(stage.argv[0].as_ptr(), stage.argv_ptrs.as_ptr()) };
    let err = Errno::last();
    report(stage.argv[0].as_bytes(), err);
    child_exit(if err == Errno::ENOENT { STATUS_NOT_FOUND } else { STATUS_NOT_EXECUTABLE })
}

fn wire(wiring: &StageWiring, pipes: &[(OwnedFd, OwnedFd)]) -> nix::Result<()> {
    let slots = [
        (wiring.stdin, libc::STDIN_FILENO),
        (wiring.stdout, libc::STDOUT_FILENO),
        (wiring.stderr, libc::STDERR_FILENO),
    ];
    for (endpoint, target) in slots {
        let src = match endpoint {
            Endpoint::Inherit => continue,
            Endpoint::Fd(fd) => fd,
            Endpoint::PipeRead(n) => pipes[n].0.as_raw_fd(),
            Endpoint::PipeWrite(n) => pipes[n].1.as_raw_fd(),
        };
        if src != target {
            dup2(src, target)?;
        }
    }
    Ok(())
}

fn report(what: &[u8], err: Errno) {
    let parts: [&[u8]; 4] = [what, b": ", err.desc().as_bytes(), b"\n"];
    for part in parts {
        unsafe { libc::write(libc::STDERR_FILENO, part.as_ptr().cast(), part.len()) };
    }
}

fn child_exit(code: i32) -> ! {
    unsafe { libc::_exit(code) }
}
