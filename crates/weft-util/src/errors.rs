use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all weft operations.
#[derive(Debug, Error, Diagnostic)]
pub enum WeftError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    #[diagnostic(code(weft::io))]
    Io(#[from] std::io::Error),

    /// Invalid or malformed manifest.
    #[error("Manifest error: {message}")]
    #[diagnostic(code(weft::manifest), help("Check your Weft.toml for syntax errors"))]
    Manifest { message: String },

    /// Unreadable or malformed lockfile.
    #[error("Lockfile error: {message}")]
    #[diagnostic(code(weft::lockfile))]
    Lockfile { message: String },

    /// A version specifier could not be parsed.
    #[error("Invalid version specifier `{specifier}`: {reason}")]
    #[diagnostic(
        code(weft::invalid_specifier),
        help("Use an exact version (1.2.3), ^1.2.3, ~1.2, 1.x, or comparators like >=1.0.0 <2.0.0")
    )]
    InvalidSpecifier { specifier: String, reason: String },

    /// No published version satisfies a specifier.
    #[error("No version of {identity} matches `{specifier}`")]
    #[diagnostic(code(weft::not_found))]
    NotFound { identity: String, specifier: String },

    /// Several requesters constrain one identity and no version satisfies all of them.
    #[error("Conflicting requirements for {identity}: {}", requesters.join(", "))]
    #[diagnostic(
        code(weft::conflict),
        help("Relax one of the specifiers or pin a version in [overrides]")
    )]
    Conflict {
        identity: String,
        requesters: Vec<String>,
    },

    /// A package or header refers back to itself through the listed path.
    #[error("Dependency cycle: {}", cycle.join(" -> "))]
    #[diagnostic(code(weft::cyclic_dependency))]
    CyclicDependency { cycle: Vec<String> },

    /// One identity is reached through a local path and through a different source.
    #[error("{identity} is requested from different sources: {first} and {second}")]
    #[diagnostic(
        code(weft::local_path_mismatch),
        help("Point every dependent at the same local directory, or drop the local path")
    )]
    LocalPathMismatch {
        identity: String,
        first: String,
        second: String,
    },

    /// Strict mode found the lockfile out of step with the manifest.
    #[error("Lockfile is out of date: {message}")]
    #[diagnostic(
        code(weft::lock_inconsistency),
        help("Run `weft install` without --locked to refresh Weft.lock")
    )]
    LockInconsistency { message: String },

    /// An include directive names a header that is not part of the resolved set.
    #[error("Unresolved include `{target}` at {}:{line}: {reason}", file.display())]
    #[diagnostic(code(weft::unresolved_directive))]
    UnresolvedDirective {
        file: PathBuf,
        line: usize,
        target: String,
        reason: String,
    },

    /// Transient failure talking to the registry or fetching sources.
    #[error("Fetch failed for {resource}: {message}")]
    #[diagnostic(code(weft::fetch_failure), help("Check your network connection and retry"))]
    FetchFailure { resource: String, message: String },

    /// The registry answered with something other than a usable response.
    #[error("Registry error: {message}")]
    #[diagnostic(code(weft::registry))]
    Registry { message: String },

    /// A collaborator call exceeded its deadline.
    #[error("{operation} timed out after {seconds}s")]
    #[diagnostic(code(weft::timeout))]
    Timeout { operation: String, seconds: u64 },

    /// Another weft process holds the project lock.
    #[error("Project is locked by another weft process ({})", path.display())]
    #[diagnostic(
        code(weft::project_locked),
        help("Wait for the other install to finish and try again")
    )]
    ProjectLocked { path: PathBuf },
}

impl WeftError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailure { .. } | Self::Timeout { .. })
    }
}

/// Convenience alias for results carrying a [`WeftError`].
pub type WeftResult<T> = Result<T, WeftError>;
