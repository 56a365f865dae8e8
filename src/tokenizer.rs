use crate::command::Command;
use crate::error::ParseError;
use crate::MAX_TOKEN_LEN;

/// Split one stage into arguments.
///
/// Whitespace separates arguments unless inside a `"..."` span. A quote that
/// opens an argument is not part of it, and the matching quote closes the
/// argument right there. A quote found in the middle of a bare word is kept
/// verbatim and only switches quoting on. An unterminated quote runs to the
/// end of the text. Returns `Ok(None)` when the text holds no argument at all.
pub fn tokenize(text: &str) -> Result<Option<Command>, ParseError> {
    let bytes = text.as_bytes();
    let mut cmd = Command::new(text);
    let mut in_quotes = false;
    let mut in_token = false;
    let mut start = 0;

    for (i, &c) in bytes.iter().enumerate() {
        if c == b'"' {
            if !in_token {
                start = i + 1;
                in_token = true;
            } else if in_quotes {
                emit(&mut cmd, start, i)?;
                in_token = false;
            }
            in_quotes = !in_quotes;
        } else if is_space(c) && !in_quotes {
            if in_token {
                emit(&mut cmd, start, i)?;
                in_token = false;
            }
        } else if !in_token {
            start = i;
            in_token = true;
        }
    }
    if in_token {
        emit(&mut cmd, start, bytes.len())?;
    }

    Ok(if cmd.is_empty() { None } else { Some(cmd) })
}

// `is_ascii_whitespace` leaves out vertical tab; C's isspace does not.
fn is_space(c: u8) -> bool {
    c.is_ascii_whitespace() || c == 0x0b
}

fn emit(cmd: &mut Command, start: usize, end: usize) -> Result<(), ParseError> {
    if end - start > MAX_TOKEN_LEN {
        return Err(ParseError::TokenTooLong);
    }
    cmd.push_arg(start..end)
}
