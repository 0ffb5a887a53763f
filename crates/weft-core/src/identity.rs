use std::fmt;

use serde::{Deserialize, Serialize};
use weft_util::errors::{WeftError, WeftResult};

/// Names one package lineage in the registry namespace.
///
/// The organization is always stored lowercase; the name keeps its case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub target: String,
    pub organization: String,
    pub name: String,
}

impl PackageIdentity {
    pub fn new(target: &str, organization: &str, name: &str) -> Self {
        Self {
            target: target.to_string(),
            organization: organization.to_lowercase(),
            name: name.to_string(),
        }
    }

    /// `@organization/name`, as written in manifests.
    pub fn key(&self) -> String {
        format!("@{}/{}", self.organization, self.name)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}/{}", self.organization, self.name)
    }
}

/// Split a manifest identity key into `(organization, name)`.
///
/// `name` alone refers to `own_organization`; anything else must be
/// `@organization/name`.
pub fn parse_identity_key(key: &str, own_organization: &str) -> WeftResult<(String, String)> {
    let (org, name) = match key.strip_prefix('@') {
        Some(rest) => rest.split_once('/').ok_or_else(|| WeftError::Manifest {
            message: format!("dependency key `{key}` must be `@organization/name`"),
        })?,
        None => (own_organization, key),
    };

    if !is_valid_segment(org) || !is_valid_segment(name) {
        return Err(WeftError::Manifest {
            message: format!("invalid dependency key `{key}`"),
        });
    }
    Ok((org.to_lowercase(), name.to_string()))
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
