//! Counter protocol implementation.
//!
//! Clients share one signed counter:
//! - `INCR <n>\r\n` adds `n` and broadcasts the result to every client
//! - `DECR <n>\r\n` subtracts `n` and broadcasts the result to every client
//! - `OUTPUT\r\n` reports the count to the requester only
//!
//! Anything else gets a diagnostic sent to the requester only.
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  INCR 5\r\n
//! Response: Increased by 5 (Current Count: 50)\r\n      (all clients)
//!
//! Request:  OUTPUT\r\n
//! Response: Current Count: 50\r\n                       (requester)
//!
//! Request:  INCR abc\r\n
//! Response: INCR command takes an integer. \r\n         (requester)
//!
//! Request:  HELLO\r\n
//! Response: Not a command handled by the server.\r\n    (requester)
//! ```

pub mod handler;
pub mod parser;

pub use handler::CounterProtocol;
