//! Counter protocol parser and response formatting.

use std::fmt;

/// Verbs that take an integer operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Incr,
    Decr,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Incr => "INCR",
            Verb::Decr => "DECR",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a line was not accepted as a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalid {
    /// Operand missing, non-numeric, out of range, or followed by extra tokens.
    NotAnInteger(Verb),
    /// Applying the operand would overflow the count.
    Overflow(Verb),
    /// Unrecognized verb, or empty input.
    Unknown,
}

/// Parsed counter command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Incr(i64),
    Decr(i64),
    Output,
    Invalid(Invalid),
}

/// Parse one command line.
///
/// The line terminator is optional. `OUTPUT` must match the whole line
/// exactly. For INCR and DECR surrounding whitespace is ignored, tokens may
/// be separated by any run of whitespace, and exactly one integer token must
/// follow the verb.
pub fn parse(input: &[u8]) -> Command {
    let line = strip_terminator(input);
    if line == b"OUTPUT" {
        return Command::Output;
    }

    let line = match std::str::from_utf8(line) {
        Ok(s) => s,
        Err(_) => return Command::Invalid(Invalid::Unknown),
    };

    let mut tokens = line.split_whitespace();
    let verb = match tokens.next() {
        Some("INCR") => Verb::Incr,
        Some("DECR") => Verb::Decr,
        _ => return Command::Invalid(Invalid::Unknown),
    };

    let amount = match (tokens.next(), tokens.next()) {
        (Some(operand), None) => operand.parse::<i64>().ok(),
        _ => None,
    };

    match (verb, amount) {
        (Verb::Incr, Some(n)) => Command::Incr(n),
        (Verb::Decr, Some(n)) => Command::Decr(n),
        (verb, None) => Command::Invalid(Invalid::NotAnInteger(verb)),
    }
}

/// Drop one trailing LF and the CR before it, if present.
fn strip_terminator(input: &[u8]) -> &[u8] {
    let line = input.strip_suffix(b"\n").unwrap_or(input);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// `Current Count: {count}\r\n`
pub fn response_count(count: i64) -> String {
    format!("Current Count: {count}\r\n")
}

/// `Increased by {n} (Current Count: {count})\r\n`, or the DECR equivalent.
pub fn response_changed(verb: Verb, amount: i64, count: i64) -> String {
    let action = match verb {
        Verb::Incr => "Increased",
        Verb::Decr => "Decreased",
    };
    format!("{action} by {amount} (Current Count: {count})\r\n")
}

/// Diagnostic sent back for an invalid line.
///
/// An overflowing operand gets the same answer as a malformed one.
pub fn response_invalid(reason: Invalid) -> String {
    match reason {
        Invalid::NotAnInteger(verb) | Invalid::Overflow(verb) => {
            format!("{verb} command takes an integer. \r\n")
        }
        Invalid::Unknown => "Not a command handled by the server.\r\n".to_string(),
    }
}
