//! Choosing one published version for a set of specifiers.

use weft_core::identity::PackageIdentity;
use weft_registry::VersionInfo;
use weft_util::errors::{WeftError, WeftResult};

use crate::version::{SemanticVersion, VersionSpecifier};

/// One release as seen by the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVersion {
    pub version: SemanticVersion,
    pub commit_hash: String,
    pub yanked: bool,
    pub repo_url: Option<String>,
}

impl PublishedVersion {
    /// Convert a registry listing, dropping entries whose version does not parse.
    pub fn from_listing(identity: &PackageIdentity, listing: Vec<VersionInfo>) -> Vec<Self> {
        listing
            .into_iter()
            .filter_map(|info| match SemanticVersion::parse(&info.version) {
                Ok(version) => Some(Self {
                    version,
                    commit_hash: info.commit_hash,
                    yanked: info.yanked,
                    repo_url: info.repo_url,
                }),
                Err(_) => {
                    tracing::debug!("{identity}: ignoring unparseable version `{}`", info.version);
                    None
                }
            })
            .collect()
    }
}

/// Pick the highest candidate satisfying every specifier.
///
/// 1. keep candidates every specifier matches
/// 2. drop yanked ones, unless a specifier pins exactly that version
/// 3. if nothing is left, fall back to a yanked candidate equal to an
///    explicit `>=` bound
/// 4. drop pre-releases unless every specifier opts in
/// 5. take the maximum by SemVer precedence
pub fn select<'a>(
    candidates: &'a [PublishedVersion],
    specifiers: &[&VersionSpecifier],
) -> Option<&'a PublishedVersion> {
    let published: Vec<SemanticVersion> = candidates
        .iter()
        .filter(|c| !c.version.is_prerelease())
        .map(|c| c.version.clone())
        .collect();

    let matching: Vec<&PublishedVersion> = candidates
        .iter()
        .filter(|c| specifiers.iter().all(|s| s.matches_in(&c.version, &published)))
        .collect();

    let mut kept: Vec<&PublishedVersion> = matching
        .iter()
        .copied()
        .filter(|c| !c.yanked || specifiers.iter().any(|s| s.is_exact_pin_of(&c.version)))
        .collect();

    if kept.is_empty() {
        let fallback = matching
            .iter()
            .copied()
            .filter(|c| {
                c.yanked
                    && specifiers
                        .iter()
                        .any(|s| s.explicit_lower_bounds().any(|b| *b == c.version))
            })
            .max_by(|a, b| a.version.cmp(&b.version));
        if let Some(candidate) = fallback {
            tracing::warn!(
                "selecting yanked version {} because a `>=` bound requires it",
                candidate.version
            );
            kept.push(candidate);
        }
    }

    kept.into_iter()
        .filter(|c| {
            !c.version.is_prerelease() || specifiers.iter().all(|s| s.opts_into_prerelease())
        })
        .max_by(|a, b| a.version.cmp(&b.version))
}

/// Resolve a single specifier, failing with `NotFound` when nothing qualifies.
pub fn resolve<'a>(
    identity: &PackageIdentity,
    candidates: &'a [PublishedVersion],
    specifier: &VersionSpecifier,
) -> WeftResult<&'a PublishedVersion> {
    select(candidates, &[specifier]).ok_or_else(|| WeftError::NotFound {
        identity: identity.to_string(),
        specifier: specifier.to_string(),
    })
}
