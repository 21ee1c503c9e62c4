//! Protocol framing for Novalink
//!
//! Pure encode/decode routines for the two wire formats spoken on the
//! shared port. Nothing in here performs I/O: decoders take the bytes
//! buffered so far and either produce a frame together with the number of
//! bytes it occupied, report that more bytes are needed, or reject the
//! input as a protocol violation.

pub mod consts;
pub mod file;
pub mod socks;

pub use file::{FileCommand, ServerMessage};
pub use socks::{ConnectRequest, Greeting, TargetAddr};

/// Outcome of a successful decode: the frame and how many bytes it consumed
pub type Decoded<T> = Option<(T, usize)>;
