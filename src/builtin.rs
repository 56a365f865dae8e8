use std::io::{self, Write};

use log::debug;

use crate::command::Pipeline;
use crate::{EXIT_CMD, STOP_SERVER_CMD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin { Exit, Cd, Dragon, StopServer, Rc }

pub fn match_builtin(name: &str) -> Option<Builtin> {
    match name {
        EXIT_CMD => Some(Builtin::Exit),
        "cd" => Some(Builtin::Cd),
        "dragon" => Some(Builtin::Dragon),
        STOP_SERVER_CMD => Some(Builtin::StopServer),
        "rc" => Some(Builtin::Rc),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinOutcome {
    /// Not a built-in; hand the pipeline to the executor.
    NotBuiltin,
    Exit,
    StopServer,
    /// Ran in-process with the given status.
    Executed(i32),
}

/// State the built-ins can see: the last pipeline's aggregate status.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellState {
    pub last_status: i32,
}

const DRAGON: &str = r"
      \||/
      |  @___oo
    /\  /\   / (__,,,,|
   ) /^\) ^\/ _)
   )   /^\/   _)
   )   _ /  / _)
 /\  )/\/ ||  | )_)
<  >      |(,,) )__)
 ||      /    \)___)\
 | \____(      )___) )___
  \______(_______;;; __;;;
";

/// Run the first stage's program if it names a built-in. Only the first
/// token of the first stage is ever looked at; the rest of the pipeline is
/// ignored once a built-in matches.
pub fn dispatch(
    pipeline: &Pipeline,
    state: &mut ShellState,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<BuiltinOutcome> {
    let Some(first) = pipeline.first() else { return Ok(BuiltinOutcome::NotBuiltin) };
    let Some(builtin) = first.program().and_then(match_builtin) else {
        return Ok(BuiltinOutcome::NotBuiltin);
    };
    debug!("builtin {:?}", builtin);
    let outcome = match builtin {
        Builtin::Exit => BuiltinOutcome::Exit,
        Builtin::StopServer => BuiltinOutcome::StopServer,
        Builtin::Cd => {
            let status = match first.arg(1) {
                None => 0,
                Some(dir) => match nix::unistd::chdir(dir) {
                    Ok(()) => 0,
                    Err(e) => { writeln!(err, "cd: {}: {}", dir, e.desc())?; 1 }
                },
            };
            state.last_status = status;
            BuiltinOutcome::Executed(status)
        }
        Builtin::Dragon => {
            out.write_all(DRAGON.trim_start_matches('\n').as_bytes())?;
            state.last_status = 0;
            BuiltinOutcome::Executed(0)
        }
        Builtin::Rc => {
            writeln!(out, "{}", state.last_status)?;
            BuiltinOutcome::Executed(state.last_status)
        }
    };
    out.flush()?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_pipeline;

    fn run(line: &str, state: &mut ShellState) -> (BuiltinOutcome, String, String) {
        let p = parse_pipeline(line).unwrap();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let o = dispatch(&p, state, &mut out, &mut err).unwrap();
        (o, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn only_first_token_of_first_stage_counts() {
        let mut st = ShellState::default();
        assert_eq!(run("echo exit", &mut st).0, BuiltinOutcome::NotBuiltin);
        assert_eq!(run("ls | exit", &mut st).0, BuiltinOutcome::NotBuiltin);
        assert_eq!(run("exit | ls", &mut st).0, BuiltinOutcome::Exit);
        assert_eq!(run("stop-server", &mut st).0, BuiltinOutcome::StopServer);
    }

    #[test]
    fn rc_reports_last_status_without_changing_it() {
        let mut st = ShellState { last_status: 3 };
        let (o, out, _) = run("rc", &mut st);
        assert_eq!(o, BuiltinOutcome::Executed(3));
        assert_eq!(out, "3\n");
        assert_eq!(st.last_status, 3);
    }

    #[test]
    fn cd_failure_is_reported_not_fatal() {
        let mut st = ShellState::default();
        let (o, out, err) = run("cd /definitely/not/a/dir", &mut st);
        assert_eq!(o, BuiltinOutcome::Executed(1));
        assert!(out.is_empty());
        assert!(err.starts_with("cd: /definitely/not/a/dir:"), "{err}");
        assert_eq!(st.last_status, 1);
    }

    #[test]
    fn cd_without_argument_is_noop() {
        let mut st = ShellState { last_status: 7 };
        assert_eq!(run("cd", &mut st).0, BuiltinOutcome::Executed(0));
    }

    #[test]
    fn dragon_prints_banner() {
        let mut st = ShellState::default();
        let (o, out, _) = run("dragon", &mut st);
        assert_eq!(o, BuiltinOutcome::Executed(0));
        assert!(out.contains("@___oo"));
    }
}
