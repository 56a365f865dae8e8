use std::ops::Range;

use crate::error::ParseError;
use crate::{MAX_ARGS, MAX_COMMANDS};

/// One pipeline stage: an owned copy of the stage text plus the byte ranges
/// of its arguments. Arguments are always borrowed from `text`, so they can
/// never outlive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    args: Vec<Range<usize>>,
}

impl Command {
    pub(crate) fn new(text: &str) -> Self {
        Command { text: text.to_string(), args: Vec::with_capacity(MAX_ARGS) }
    }

    pub(crate) fn push_arg(&mut self, span: Range<usize>) -> Result<(), ParseError> {
        if self.args.len() >= MAX_ARGS {
            return Err(ParseError::TooManyArguments);
        }
        self.args.push(span);
        Ok(())
    }

    /// Drop `count` arguments starting at `at`, shifting the rest left.
    pub(crate) fn remove_args(&mut self, at: usize, count: usize) {
        let end = (at + count).min(self.args.len());
        self.args.drain(at..end);
    }

    pub fn argc(&self) -> usize { self.args.len() }

    pub fn is_empty(&self) -> bool { self.args.is_empty() }

    pub fn arg(&self, i: usize) -> Option<&str> {
        self.args.get(i).map(|r| &self.text[r.clone()])
    }

    pub fn program(&self) -> Option<&str> { self.arg(0) }

    pub fn argv(&self) -> impl Iterator<Item = &str> + '_ {
        self.args.iter().map(move |r| &self.text[r.clone()])
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.argv().map(str::to_string).collect()
    }
}

/// Ordered stages, left to right; never longer than [`MAX_COMMANDS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline { commands: Vec::with_capacity(MAX_COMMANDS) }
    }

    pub fn push(&mut self, command: Command) -> Result<(), ParseError> {
        if self.commands.len() >= MAX_COMMANDS {
            return Err(ParseError::TooManyCommands);
        }
        self.commands.push(command);
        Ok(())
    }

    pub fn len(&self) -> usize { self.commands.len() }

    pub fn is_empty(&self) -> bool { self.commands.is_empty() }

    pub fn first(&self) -> Option<&Command> { self.commands.first() }

    pub fn commands(&self) -> &[Command] { &self.commands }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> { self.commands.iter() }
}

impl<'a> IntoIterator for &'a Pipeline {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;
    fn into_iter(self) -> Self::IntoIter { self.commands.iter() }
}
