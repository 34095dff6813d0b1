//! imlink core: transport-agnostic protocol primitives and the error type.
//!
//! This crate defines the wire-level contracts of the length-prefixed IM
//! protocol: the 12-byte frame header, the command enumeration, flag bits,
//! every typed body and the frame codec. It carries no runtime or transport
//! dependencies so the same codec serves the async client, fake servers in
//! tests, and tooling.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed input
//! surfaces as `ImlinkError`, never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorCode, ImlinkError, Result};
