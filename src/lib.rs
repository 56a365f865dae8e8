//! Remote pipeline-execution shell.
//!
//! A command line is parsed into a [`command::Pipeline`], built-ins are
//! intercepted by [`builtin`], everything else runs as a chain of forked
//! children in [`exec`]. The same machinery is driven locally by [`local`] or
//! over a TCP connection by [`server`] / [`client`].

pub mod builtin;
pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod exec;
pub mod local;
pub mod parser;
pub mod protocol;
pub mod redirect;
pub mod server;
pub mod tokenizer;

pub use command::{Command, Pipeline};
pub use error::{ExecError, ParseError, ProtocolError};
pub use parser::parse_pipeline;

/// Maximum number of stages in one pipeline.
pub const MAX_COMMANDS: usize = 8;
/// Maximum number of arguments (program name included) per stage.
pub const MAX_ARGS: usize = 8;
/// Maximum length of a single argument, in bytes.
pub const MAX_TOKEN_LEN: usize = 256;
/// Maximum length of a whole command line, in bytes.
pub const MAX_LINE_LEN: usize = 64 + MAX_TOKEN_LEN;

/// Status code that wins over the last stage's status when aggregating.
pub const SPECIAL_STATUS: i32 = 99;

pub const PROMPT: &str = "dsh4> ";
pub const EXIT_CMD: &str = "exit";
pub const STOP_SERVER_CMD: &str = "stop-server";
