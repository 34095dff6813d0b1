//! Top-level facade crate for imlink.
//!
//! Re-exports the protocol core and the client engine so users can depend on a single crate.

pub mod core {
    pub use imlink_core::*;
}

pub mod client {
    pub use imlink_client::*;
}
