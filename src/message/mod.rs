//! This module exports a minimal message-passing API, which is encapsulated
//! by a `Communicator` trait. Implementors only need to write blocking `send`
//! and `recv` operations for a given transport layer; the trait then
//! provides ring neighbors and default implementations for broadcast,
//! reduce, and reduce-all operations. Two transports are included: an
//! in-process one over zero-capacity channels, and a pure-Rust TCP one.
//!

mod backoff;
pub mod channel;
pub mod comm;
pub mod tcp;
pub mod util;
