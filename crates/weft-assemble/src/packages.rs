//! Where each resolved package keeps its published headers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use weft_core::identity::PackageIdentity;
use weft_resolver::graph::DependencyGraph;
use weft_util::errors::{WeftError, WeftResult};

use crate::directive::IncludeDirective;

/// Directory, relative to a package root, holding its published headers.
pub const INCLUDE_DIR: &str = "weft/include";

/// A header located on disk, plus where it sits inside an include tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedHeader {
    pub path: PathBuf,
    /// `<organization>/<name>/<path>` with the organization lowercased.
    pub mirror: PathBuf,
}

#[derive(Debug)]
struct PackageRoot {
    identity: PackageIdentity,
    root: PathBuf,
}

/// Materialized roots of every package in a resolved graph, keyed by
/// lowercase organization and name.
///
/// Directives do not name a target, so two packages sharing organization
/// and name under different targets cannot both be addressed.
#[derive(Debug, Default)]
pub struct PackageSet {
    roots: HashMap<(String, String), PackageRoot>,
    project: Option<(String, String)>,
}

impl PackageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_graph(graph: &DependencyGraph) -> WeftResult<Self> {
        let mut set = Self::new();
        for node in graph.nodes_with_root() {
            set.insert(&node.identity, &node.path)?;
        }
        set.project = graph.root_node().map(|root| key(&root.identity));
        Ok(set)
    }

    /// Register the root of `identity`. Fails when another target already
    /// claimed the same organization and name.
    pub fn insert(&mut self, identity: &PackageIdentity, root: &Path) -> WeftResult<()> {
        let key = key(identity);
        if let Some(existing) = self.roots.get(&key) {
            if existing.identity.target != identity.target {
                return Err(WeftError::Manifest {
                    message: format!(
                        "{identity} is resolved for both `{}` and `{}`; include \
                         directives cannot tell them apart",
                        existing.identity.target, identity.target
                    ),
                });
            }
        }
        self.roots.insert(
            key,
            PackageRoot {
                identity: identity.clone(),
                root: root.to_path_buf(),
            },
        );
        Ok(())
    }

    /// Whether `organization`/`name` is the project being assembled.
    pub fn is_project(&self, organization: &str, name: &str) -> bool {
        self.project
            .as_ref()
            .is_some_and(|(org, n)| *org == organization.to_lowercase() && n == name)
    }

    /// Resolve a directive to a header file inside the package it names.
    pub fn locate(&self, directive: &IncludeDirective) -> WeftResult<LocatedHeader> {
        let unresolved = |reason: String| WeftError::UnresolvedDirective {
            file: directive.file.clone(),
            line: directive.line,
            target: directive.target.clone(),
            reason,
        };

        let segments: Vec<&str> = directive.target.split('/').collect();
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\'))
        {
            return Err(unresolved(
                "paths must be relative and may not contain `.` or `..` segments".to_string(),
            ));
        }
        let [organization, name, rest @ ..] = segments.as_slice() else {
            return Err(unresolved("expected <organization>/<name>/<path>".to_string()));
        };
        if rest.is_empty() {
            return Err(unresolved("expected <organization>/<name>/<path>".to_string()));
        }

        let organization = organization.to_lowercase();
        let root = self
            .roots
            .get(&(organization.clone(), name.to_string()))
            .map(|entry| &entry.root)
            .ok_or_else(|| {
                unresolved(format!(
                    "@{organization}/{name} is not in the resolved dependency graph"
                ))
            })?;

        let include = root.join(INCLUDE_DIR);
        let org_dir = find_dir_ignoring_case(&include, &organization)
            .unwrap_or_else(|| include.join(&organization));
        let relative: PathBuf = std::iter::once(*name).chain(rest.iter().copied()).collect();
        let path = org_dir.join(&relative);
        if !path.is_file() {
            return Err(unresolved(format!("{} does not exist", path.display())));
        }

        Ok(LocatedHeader {
            path: path.canonicalize()?,
            mirror: Path::new(&organization).join(relative),
        })
    }

    /// Every header published by a package other than the project itself,
    /// sorted by mirror path.
    pub fn published_headers(&self) -> WeftResult<Vec<LocatedHeader>> {
        let mut headers = Vec::new();
        for (key, entry) in &self.roots {
            if Some(key) == self.project.as_ref() {
                continue;
            }
            headers.extend(mirrored_files(&entry.root.join(INCLUDE_DIR))?);
        }
        headers.sort_by(|a, b| a.mirror.cmp(&b.mirror));
        headers.dedup_by(|a, b| a.mirror == b.mirror);
        Ok(headers)
    }

    /// Every file under `weft/include/<organization>/<name>` of the named
    /// package, sorted by mirror path. Empty for unknown packages.
    pub fn package_headers(
        &self,
        organization: &str,
        name: &str,
    ) -> WeftResult<Vec<LocatedHeader>> {
        let organization = organization.to_lowercase();
        let Some(entry) = self.roots.get(&(organization.clone(), name.to_string())) else {
            return Ok(Vec::new());
        };
        let include = entry.root.join(INCLUDE_DIR);
        let Some(org_dir) = find_dir_ignoring_case(&include, &organization) else {
            return Ok(Vec::new());
        };
        let package_dir = org_dir.join(name);
        if !package_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut headers = Vec::new();
        for path in weft_util::fs::walk_files(&package_dir)? {
            let Ok(relative) = path.strip_prefix(&package_dir) else {
                continue;
            };
            headers.push(LocatedHeader {
                mirror: Path::new(&organization).join(name).join(relative),
                path: path.canonicalize()?,
            });
        }
        headers.sort_by(|a, b| a.mirror.cmp(&b.mirror));
        Ok(headers)
    }
}

fn key(identity: &PackageIdentity) -> (String, String) {
    (identity.organization.to_lowercase(), identity.name.clone())
}

/// Files under an include directory, mirrored as `<organization>/<rest>`
/// with the organization lowercased.
fn mirrored_files(include: &Path) -> WeftResult<Vec<LocatedHeader>> {
    let mut headers = Vec::new();
    if !include.is_dir() {
        return Ok(headers);
    }
    for path in weft_util::fs::walk_files(include)? {
        let Ok(relative) = path.strip_prefix(include) else {
            continue;
        };
        let mut components = relative.iter();
        let Some(organization) = components.next() else {
            continue;
        };
        let mirror =
            Path::new(&organization.to_string_lossy().to_lowercase()).join(components.as_path());
        headers.push(LocatedHeader {
            path: path.canonicalize()?,
            mirror,
        });
    }
    Ok(headers)
}

/// `dir/<name>`, matching `name` case-insensitively against existing entries.
fn find_dir_ignoring_case(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = dir.join(name);
    if exact.is_dir() {
        return Some(exact);
    }
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .find(|entry| entry.file_name().to_string_lossy().to_lowercase() == name)
        .map(|entry| entry.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(target: &str) -> IncludeDirective {
        IncludeDirective {
            file: PathBuf::from("Bot.mq5"),
            line: 3,
            target: target.to_string(),
        }
    }

    fn json_id(target: &str) -> PackageIdentity {
        PackageIdentity::new(target, "acme", "json")
    }

    fn package(tmp: &Path, org_dir: &str, name: &str, file: &str) -> PathBuf {
        let root = tmp.join(name);
        let dir = root.join(INCLUDE_DIR).join(org_dir).join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), "// header\n").unwrap();
        root
    }

    #[test]
    fn organization_matches_case_insensitively() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = package(tmp.path(), "Acme", "json", "json.mqh");
        let mut set = PackageSet::new();
        set.insert(&json_id("mql5"), &root).unwrap();

        let found = set.locate(&directive("ACME/json/json.mqh")).unwrap();
        assert!(found.path.ends_with("json.mqh"));
        assert_eq!(found.mirror, PathBuf::from("acme/json/json.mqh"));
    }

    #[test]
    fn unknown_package_is_unresolved() {
        let set = PackageSet::new();
        let err = set.locate(&directive("acme/json/json.mqh")).unwrap_err();
        match err {
            WeftError::UnresolvedDirective { line, reason, .. } => {
                assert_eq!(line, 3);
                assert!(reason.contains("@acme/json"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn parent_segments_are_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = package(tmp.path(), "acme", "json", "json.mqh");
        let mut set = PackageSet::new();
        set.insert(&json_id("mql5"), &root).unwrap();
        for target in ["acme/json/../json/json.mqh", "acme/json", "/acme/json/json.mqh"] {
            assert!(matches!(
                set.locate(&directive(target)),
                Err(WeftError::UnresolvedDirective { .. })
            ));
        }
    }

    #[test]
    fn missing_file_is_unresolved() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = package(tmp.path(), "acme", "json", "json.mqh");
        let mut set = PackageSet::new();
        set.insert(&json_id("mql5"), &root).unwrap();
        assert!(matches!(
            set.locate(&directive("acme/json/missing.mqh")),
            Err(WeftError::UnresolvedDirective { .. })
        ));
    }

    #[test]
    fn same_package_under_two_targets_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = package(tmp.path(), "acme", "json", "json.mqh");
        let mut set = PackageSet::new();
        set.insert(&json_id("mql5"), &root).unwrap();
        set.insert(&json_id("mql5"), &root).unwrap();
        assert!(matches!(
            set.insert(&json_id("mql4"), &root),
            Err(WeftError::Manifest { .. })
        ));
    }

    #[test]
    fn package_headers_cover_the_whole_package_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = package(tmp.path(), "Acme", "json", "json.mqh");
        let nested = root.join(INCLUDE_DIR).join("Acme/json/detail");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("parse.mqh"), "// parse\n").unwrap();
        let other = root.join(INCLUDE_DIR).join("acme/extra");
        std::fs::create_dir_all(&other).unwrap();
        std::fs::write(other.join("extra.mqh"), "// extra\n").unwrap();
        let mut set = PackageSet::new();
        set.insert(&json_id("mql5"), &root).unwrap();

        let mirrors: Vec<PathBuf> = set
            .package_headers("ACME", "json")
            .unwrap()
            .into_iter()
            .map(|h| h.mirror)
            .collect();
        assert_eq!(
            mirrors,
            [
                PathBuf::from("acme/json/detail/parse.mqh"),
                PathBuf::from("acme/json/json.mqh"),
            ]
        );
        assert!(set.package_headers("acme", "missing").unwrap().is_empty());
    }
}
