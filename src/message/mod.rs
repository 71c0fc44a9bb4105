//! This module exports the minimal message-passing API used by ghost-cell
//! exchanges, which is encapsulated by a `Communicator` trait. Implementors
//! only need to write a tagged, non-blocking `send` and a blocking `recv`
//! for a given transport layer. Three transports are included: a serial
//! loopback for single-process runs, an in-process channel group where each
//! rank is a thread, and a pure-Rust TCP transport where each rank is a
//! process.
//!

mod backoff;
pub mod channel;
pub mod comm;
pub mod request;
pub mod serial;
pub mod tcp;
pub mod util;

pub use channel::ChannelCommunicator;
pub use comm::{Communicator, Envelope, Tag};
pub use serial::SerialCommunicator;
pub use tcp::{TcpCommunicator, TcpHost};
