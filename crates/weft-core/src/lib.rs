//! Core data types for weft.
//!
//! Package identities, the `Weft.toml` manifest schema, the `Weft.lock`
//! document, and the user-level configuration in `~/.weft/config.toml`.

pub mod config;
pub mod identity;
pub mod lockfile;
pub mod manifest;
