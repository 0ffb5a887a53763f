//! Collaborators the resolver talks to: the package registry (metadata only)
//! and git (sources at exact commits).
//!
//! [`RegistryClient`] and [`GitFetcher`] are the seams; [`http::HttpRegistry`]
//! and [`git::GitCli`] are the production implementations, and
//! [`memory`] holds in-process implementations for tests and offline use.

pub mod git;
pub mod http;
pub mod memory;
pub mod traits;

pub use traits::{GitFetcher, RegistryClient, ResolvedRelease, VersionInfo};
