//! Lead and engine-state storage for Prospector.
//!
//! This module provides persistent storage for leads and the growth cycle's
//! state, supporting file-based and in-memory backends.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileProspectStore;
pub use memory::MemoryProspectStore;
pub use traits::ProspectStore;
