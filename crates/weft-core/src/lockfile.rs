use std::path::Path;

use serde::{Deserialize, Serialize};
use weft_util::errors::{WeftError, WeftResult};

use crate::identity::PackageIdentity;

pub const LOCKFILE_NAME: &str = "Weft.lock";
pub const LOCKFILE_VERSION: u32 = 1;

const HEADER: &str = "# This file is generated by weft. Do not edit it by hand.\n";

/// Exact pins for every registry package in a resolved graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub version: u32,
    /// Digest of the root manifest's dependency and override declarations.
    pub fingerprint: String,
    #[serde(default)]
    pub package: Vec<LockedPackage>,
}

/// A single locked package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPackage {
    pub organization: String,
    pub name: String,
    pub target: String,
    pub version: String,
    pub commit_hash: String,
    /// Repository URL the commit was fetched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl LockedPackage {
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(&self.target, &self.organization, &self.name)
    }
}

impl Lockfile {
    /// Build a lockfile; entries are sorted so equal inputs serialize identically.
    pub fn new(fingerprint: String, mut package: Vec<LockedPackage>) -> Self {
        package.sort_by(|a, b| {
            (&a.organization, &a.name, &a.target).cmp(&(&b.organization, &b.name, &b.target))
        });
        Self {
            version: LOCKFILE_VERSION,
            fingerprint,
            package,
        }
    }

    /// Load and parse a `Weft.lock` file from the given path.
    pub fn from_path(path: &Path) -> WeftResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| WeftError::Lockfile {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::from_str(&content)
    }

    /// Load `Weft.lock` from a project directory if it exists.
    pub fn load_optional(project_root: &Path) -> WeftResult<Option<Self>> {
        let path = project_root.join(LOCKFILE_NAME);
        if path.is_file() {
            Self::from_path(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> WeftResult<Self> {
        let lockfile: Self = toml::from_str(content).map_err(|e| WeftError::Lockfile {
            message: format!("Failed to parse {LOCKFILE_NAME}: {e}"),
        })?;
        if lockfile.version != LOCKFILE_VERSION {
            return Err(WeftError::Lockfile {
                message: format!(
                    "unsupported lockfile version {} (expected {LOCKFILE_VERSION})",
                    lockfile.version
                ),
            });
        }
        Ok(lockfile)
    }

    /// Serialize the lockfile to a pretty-printed TOML string.
    pub fn to_string_pretty(&self) -> WeftResult<String> {
        let body = toml::to_string_pretty(self).map_err(|e| WeftError::Lockfile {
            message: format!("Failed to serialize {LOCKFILE_NAME}: {e}"),
        })?;
        Ok(format!("{HEADER}{body}"))
    }

    /// Write the lockfile atomically to `path`.
    pub fn write_to(&self, path: &Path) -> WeftResult<()> {
        let content = self.to_string_pretty()?;
        weft_util::fs::write_atomic(path, content.as_bytes())?;
        Ok(())
    }

    pub fn find(&self, identity: &PackageIdentity) -> Option<&LockedPackage> {
        self.package.iter().find(|p| p.identity() == *identity)
    }
}
