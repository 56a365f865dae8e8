use crate::command::Pipeline;
use crate::error::ParseError;
use crate::tokenizer::tokenize;
use crate::MAX_LINE_LEN;

pub const PIPE_CHAR: char = '|';

/// Parse a command line into its stages.
///
/// The line is split on `|` before any quote handling, so a pipe inside
/// quotes still separates stages. Empty segments (leading, trailing or
/// doubled `|`) are skipped.
pub fn parse_pipeline(line: &str) -> Result<Pipeline, ParseError> {
    let line = line.trim();
    if line.len() > MAX_LINE_LEN {
        return Err(ParseError::LineTooLong);
    }
    let mut pipeline = Pipeline::new();
    for segment in line.split(PIPE_CHAR) {
        if let Some(cmd) = tokenize(segment)? {
            pipeline.push(cmd)?;
        }
    }
    if pipeline.is_empty() {
        return Err(ParseError::NoCommands);
    }
    Ok(pipeline)
}
