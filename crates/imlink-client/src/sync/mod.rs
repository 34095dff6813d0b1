//! Offline catch-up ("sync") for direct and group message backlogs.

pub mod engine;
pub mod store;

pub use engine::{Cursors, EndOutcome, SyncEngine, SyncScope, Window};
pub use store::{CursorStore, FileCursorStore, MemoryCursorStore};
