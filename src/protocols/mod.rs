//! Protocol implementations.
//!
//! Each protocol plugs into the runtime through `runtime::Protocol`.
//!
//! - `counter`: shared counter with INCR/DECR broadcast and OUTPUT queries

pub mod counter;
