use std::io::{self, BufRead, Write};
use std::string::FromUtf8Error;

use anyhow::Result;
use log::warn;

use crate::builtin::{self, BuiltinOutcome, ShellState};
use crate::exec::{run_pipeline, IoBinding};
use crate::parser::parse_pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step { Continue, Exit }

/// Handle one line against the terminal's own streams. Messages from the
/// shell itself go to `out`; pipelines write straight to file descriptors 1
/// and 2.
pub fn run_line(line: &str, state: &mut ShellState, out: &mut impl Write) -> Result<Step> {
    let pipeline = match parse_pipeline(line) {
        Ok(p) => p,
        Err(e) => {
            writeln!(out, "{}", e)?;
            return Ok(Step::Continue);
        }
    };
    match builtin::dispatch(&pipeline, state, out, &mut io::stderr())? {
        BuiltinOutcome::Exit | BuiltinOutcome::StopServer => return Ok(Step::Exit),
        BuiltinOutcome::Executed(_) => return Ok(Step::Continue),
        BuiltinOutcome::NotBuiltin => {}
    }
    // children write to fd 1 directly; anything we buffered must go first
    out.flush()?;
    match run_pipeline(&pipeline, &IoBinding::terminal()) {
        Ok(status) => state.last_status = status.aggregate,
        Err(e) => {
            warn!("pipeline failed: {}", e);
            eprintln!("rdsh: {}", e);
            state.last_status = 1;
        }
    }
    Ok(Step::Continue)
}

/// Next line of `input` without its line ending. `Ok(None)` at end of input;
/// the inner error is a line that is not valid UTF-8.
pub(crate) fn next_line(input: &mut impl BufRead) -> io::Result<Option<Result<String, FromUtf8Error>>> {
    let mut buf = Vec::new();
    if input.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8(buf)))
}

/// Read-eval loop for local use. Returns the last aggregate status.
pub fn run(mut input: impl BufRead, out: &mut impl Write, prompt: Option<&str>) -> Result<i32> {
    let mut state = ShellState::default();
    loop {
        if let Some(p) = prompt {
            write!(out, "{}", p)?;
            out.flush()?;
        }
        let line = match next_line(&mut input)? {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                warn!("skipping input line: {}", e);
                eprintln!("rdsh: input line is not valid UTF-8, skipped");
                continue;
            }
            None => {
                if prompt.is_some() { writeln!(out)?; }
                break;
            }
        };
        if run_line(&line, &mut state, out)? == Step::Exit {
            writeln!(out, "exiting...")?;
            break;
        }
    }
    out.flush()?;
    Ok(state.last_status)
}
