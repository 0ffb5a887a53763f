//! Accumulated version requirements and conflict reporting.

use std::collections::BTreeMap;
use std::fmt;

use weft_core::identity::PackageIdentity;
use weft_util::errors::WeftError;

use crate::select::{select, PublishedVersion};
use crate::version::{SemanticVersion, VersionSpecifier};

/// The package that declared a dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    Root(PackageIdentity),
    Registry(PackageIdentity, SemanticVersion),
    Local(PackageIdentity),
}

impl Origin {
    pub fn identity(&self) -> &PackageIdentity {
        match self {
            Origin::Root(identity) | Origin::Registry(identity, _) | Origin::Local(identity) => {
                identity
            }
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Root(identity) => write!(f, "{identity} (root)"),
            Origin::Registry(identity, version) => write!(f, "{identity} v{version}"),
            Origin::Local(identity) => write!(f, "{identity} (local)"),
        }
    }
}

/// One edge's demand on an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub origin: Origin,
    pub specifier: VersionSpecifier,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requires {}", self.origin, self.specifier)
    }
}

/// Every requirement seen during a resolution run, per identity.
///
/// Requirements outlive the round that added them so a restart selects
/// against what it learned. Callers decide which of them still apply
/// through a liveness predicate, and prune those whose origin was dropped.
#[derive(Debug, Default)]
pub struct RequirementSet {
    by_identity: BTreeMap<PackageIdentity, Vec<Requirement>>,
}

impl RequirementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a requirement. Returns `false` if it was already known.
    pub fn add(&mut self, identity: &PackageIdentity, requirement: Requirement) -> bool {
        let entries = self.by_identity.entry(identity.clone()).or_default();
        if entries.contains(&requirement) {
            return false;
        }
        entries.push(requirement);
        true
    }

    pub fn get(&self, identity: &PackageIdentity) -> &[Requirement] {
        self.by_identity
            .get(identity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Requirements on `identity` accepted by `live`.
    pub fn live<'a>(
        &'a self,
        identity: &PackageIdentity,
        live: impl Fn(&Requirement) -> bool,
    ) -> Vec<&'a Requirement> {
        self.get(identity).iter().filter(|r| live(r)).collect()
    }

    /// Drop every requirement `keep` rejects and return what was dropped.
    pub fn prune(&mut self, keep: impl Fn(&Requirement) -> bool) -> Vec<Requirement> {
        let mut dropped = Vec::new();
        for entries in self.by_identity.values_mut() {
            let (kept, gone): (Vec<_>, Vec<_>) = entries.drain(..).partition(|r| keep(r));
            *entries = kept;
            dropped.extend(gone);
        }
        self.by_identity.retain(|_, entries| !entries.is_empty());
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }

    /// Select against the requirements of `identity` accepted by `live`.
    ///
    /// Fails with `NotFound` when a single specifier has no match on its own,
    /// and with `Conflict` naming every live requester when each specifier is
    /// satisfiable alone but not together.
    pub fn select<'a>(
        &self,
        identity: &PackageIdentity,
        candidates: &'a [PublishedVersion],
        live: impl Fn(&Requirement) -> bool,
    ) -> Result<&'a PublishedVersion, WeftError> {
        let requirements = self.live(identity, live);
        let specifiers: Vec<&VersionSpecifier> =
            requirements.iter().map(|r| &r.specifier).collect();
        if let Some(found) = select(candidates, &specifiers) {
            return Ok(found);
        }

        if let Some(unsatisfiable) = specifiers
            .iter()
            .find(|s| select(candidates, &[**s]).is_none())
        {
            return Err(WeftError::NotFound {
                identity: identity.to_string(),
                specifier: unsatisfiable.to_string(),
            });
        }

        Err(WeftError::Conflict {
            identity: identity.to_string(),
            requesters: requirements.iter().map(ToString::to_string).collect(),
        })
    }
}
