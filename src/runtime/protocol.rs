//! Protocol seam for the connection manager.
//!
//! The manager frames input into lines and hands each line to a `Protocol`.
//! The protocol answers with a `Message` that says what to send and to whom.

/// Who receives a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Only the connection that sent the command.
    Unicast,
    /// Every live connection, the sender included.
    Broadcast,
}

/// A CRLF-terminated response paired with its delivery mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub delivery: Delivery,
}

impl Message {
    pub fn unicast(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delivery: Delivery::Unicast,
        }
    }

    pub fn broadcast(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delivery: Delivery::Broadcast,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

/// A line-oriented protocol served by the connection manager.
///
/// Implementations own whatever shared state their commands mutate. They are
/// only ever called from the thread running the manager's ticks.
pub trait Protocol {
    /// Handle one line of input, without its terminator.
    fn handle(&mut self, line: &[u8]) -> Message;

    /// Response for input that never formed a line within the read bound.
    fn reject(&self) -> Message;
}
