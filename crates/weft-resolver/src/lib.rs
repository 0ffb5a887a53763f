//! Dependency resolution: version specifiers and selection, the resolved
//! package graph, the shared package cache, and lockfile reconciliation.

pub mod cache;
pub mod conflict;
pub mod graph;
pub mod lock;
pub mod resolver;
pub mod select;
pub mod version;
