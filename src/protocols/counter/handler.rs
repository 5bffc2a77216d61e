//! Counter protocol handler.
//!
//! Owns the shared count and is the only place it changes.

use super::parser::{self, Command, Invalid, Verb};
use crate::runtime::{Message, Protocol};
use tracing::debug;

/// The counter shared by every connected client.
#[derive(Debug, Default)]
pub struct CounterProtocol {
    count: i64,
}

impl CounterProtocol {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the counter.
    pub fn count(&self) -> i64 {
        self.count
    }

    /// Parse `input`, apply it to the count, and format the response.
    ///
    /// The count changes only when the returned command is `Incr` or `Decr`.
    pub fn handle_command(&mut self, input: &[u8]) -> (Command, String) {
        let command = match parser::parse(input) {
            Command::Incr(n) => self.apply(Verb::Incr, n),
            Command::Decr(n) => self.apply(Verb::Decr, n),
            other => other,
        };

        let response = match &command {
            Command::Output => parser::response_count(self.count),
            Command::Incr(n) => parser::response_changed(Verb::Incr, *n, self.count),
            Command::Decr(n) => parser::response_changed(Verb::Decr, *n, self.count),
            Command::Invalid(reason) => {
                debug!(reason = ?reason, input = %String::from_utf8_lossy(input).trim_end(), "Invalid command");
                parser::response_invalid(*reason)
            }
        };

        (command, response)
    }

    fn apply(&mut self, verb: Verb, amount: i64) -> Command {
        let updated = match verb {
            Verb::Incr => self.count.checked_add(amount),
            Verb::Decr => self.count.checked_sub(amount),
        };

        match (verb, updated) {
            (Verb::Incr, Some(count)) => {
                self.count = count;
                Command::Incr(amount)
            }
            (Verb::Decr, Some(count)) => {
                self.count = count;
                Command::Decr(amount)
            }
            (verb, None) => Command::Invalid(Invalid::Overflow(verb)),
        }
    }
}

impl Protocol for CounterProtocol {
    fn handle(&mut self, line: &[u8]) -> Message {
        match self.handle_command(line) {
            (Command::Incr(_) | Command::Decr(_), text) => Message::broadcast(text),
            (_, text) => Message::unicast(text),
        }
    }

    fn reject(&self) -> Message {
        Message::unicast(parser::response_invalid(Invalid::Unknown))
    }
}
