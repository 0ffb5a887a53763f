//! Shared utilities for weft.
//!
//! Cross-cutting concerns used by the other weft crates: the unified error
//! type, filesystem helpers, hashing, the per-project advisory lock, and
//! terminal status output.

pub mod errors;
pub mod fs;
pub mod hash;
pub mod lock;
pub mod process;
pub mod progress;
