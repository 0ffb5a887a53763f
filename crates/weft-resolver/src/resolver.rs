//! Resolution of a root manifest into a [`DependencyGraph`].
//!
//! Packages are visited depth-first in declaration order, one version per
//! identity. Every edge adds a requirement tagged with the package version
//! that declared it; when a requirement rules out a version already selected
//! in the current round, the round restarts with what it learned, so the next
//! round selects against the full intersection. A requirement only counts
//! while its declaring version is still selected, and requirements whose
//! declaring version left the graph are discarded between rounds. Registry
//! listings are fetched once per run and prefetched concurrently for each
//! package's dependencies.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use petgraph::graph::NodeIndex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use weft_core::identity::PackageIdentity;
use weft_core::lockfile::{LockedPackage, Lockfile};
use weft_core::manifest::{DependencyDecl, DependencySource, Manifest, ProjectType};
use weft_registry::RegistryClient;
use weft_util::errors::{WeftError, WeftResult};

use crate::cache::PackageCache;
use crate::conflict::{Origin, Requirement, RequirementSet};
use crate::graph::{DepEdge, DependencyGraph, NodeSource, ResolvedNode};
use crate::select::{select, PublishedVersion};
use crate::version::{SemanticVersion, VersionSpecifier};

const DEFAULT_JOBS: usize = 8;
const MAX_ROUNDS: usize = 64;

/// Resolves manifests against a registry, materializing packages through a
/// shared [`PackageCache`].
pub struct GraphBuilder {
    registry: Arc<dyn RegistryClient>,
    cache: Arc<PackageCache>,
    jobs: usize,
}

impl GraphBuilder {
    pub fn new(registry: Arc<dyn RegistryClient>, cache: Arc<PackageCache>) -> Self {
        Self {
            registry,
            cache,
            jobs: DEFAULT_JOBS,
        }
    }

    /// Limit concurrent registry and git calls.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn cache(&self) -> &PackageCache {
        &self.cache
    }

    /// Select fresh versions for every dependency of `manifest`.
    pub async fn build(&self, root_dir: &Path, manifest: &Manifest) -> WeftResult<DependencyGraph> {
        Session::new(self, root_dir, manifest, None)?.run().await
    }

    /// Walk the graph using the versions pinned in `lockfile`, failing with
    /// `LockInconsistency` wherever the pins no longer fit.
    pub async fn build_locked(
        &self,
        root_dir: &Path,
        manifest: &Manifest,
        lockfile: &Lockfile,
    ) -> WeftResult<DependencyGraph> {
        Session::new(self, root_dir, manifest, Some(lockfile))?
            .run()
            .await
    }
}

#[derive(Debug, Clone)]
struct OverrideEntry {
    version: SemanticVersion,
    declared_by: String,
    from_root: bool,
}

#[derive(Debug, Clone)]
struct Choice {
    version: SemanticVersion,
    commit_hash: String,
    repo_url: String,
}

#[derive(Debug, Clone)]
enum Selected {
    Registry { version: SemanticVersion, path: PathBuf },
    Local { root: PathBuf },
}

struct Frame {
    node: NodeIndex,
    origin: Origin,
    edges: Vec<DependencyDecl>,
    next: usize,
}

enum Visit {
    Done,
    Descend(PackageIdentity, Frame),
    Restart,
}

#[derive(Default)]
struct Round {
    graph: DependencyGraph,
    selected: HashMap<PackageIdentity, Selected>,
    /// Identities open on the current traversal path, root first.
    path: Vec<PackageIdentity>,
}

enum Pass {
    Complete(Round),
    Restart(Round),
}

impl Round {
    /// Whether edges declared by `origin` still apply in this round. Origins
    /// not selected yet count when `pending` is set.
    fn keeps(&self, origin: &Origin, pending: bool) -> bool {
        match origin {
            Origin::Root(_) => true,
            Origin::Registry(identity, version) => match self.selected.get(identity) {
                Some(Selected::Registry { version: current, .. }) => current == version,
                Some(Selected::Local { .. }) => false,
                None => pending,
            },
            Origin::Local(identity) => match self.selected.get(identity) {
                Some(Selected::Local { .. }) => true,
                Some(Selected::Registry { .. }) => false,
                None => pending,
            },
        }
    }
}

/// State that survives restarts within one resolution run.
struct Session<'a> {
    builder: &'a GraphBuilder,
    root_dir: PathBuf,
    root: &'a Manifest,
    pins: Option<HashMap<PackageIdentity, LockedPackage>>,
    requirements: RequirementSet,
    overrides: HashMap<PackageIdentity, OverrideEntry>,
    candidates: HashMap<PackageIdentity, Arc<Vec<PublishedVersion>>>,
    listing_errors: HashMap<PackageIdentity, WeftError>,
    repo_urls: HashMap<(PackageIdentity, SemanticVersion), String>,
    manifests: HashMap<PathBuf, Manifest>,
    last_restart: Option<PackageIdentity>,
}

impl<'a> Session<'a> {
    fn new(
        builder: &'a GraphBuilder,
        root_dir: &Path,
        root: &'a Manifest,
        lockfile: Option<&Lockfile>,
    ) -> WeftResult<Self> {
        let pins = lockfile.map(|lf| {
            lf.package
                .iter()
                .map(|p| (p.identity(), p.clone()))
                .collect::<HashMap<_, _>>()
        });
        let mut session = Self {
            builder,
            root_dir: root_dir.canonicalize()?,
            root,
            pins,
            requirements: RequirementSet::new(),
            overrides: HashMap::new(),
            candidates: HashMap::new(),
            listing_errors: HashMap::new(),
            repo_urls: HashMap::new(),
            manifests: HashMap::new(),
            last_restart: None,
        };
        let requester = Origin::Root(root.identity()).to_string();
        session.collect_overrides(root, &requester, true, None)?;
        Ok(session)
    }

    async fn run(mut self) -> WeftResult<DependencyGraph> {
        for number in 1..=MAX_ROUNDS {
            match self.round().await? {
                Pass::Complete(round) => {
                    let dropped = self.requirements.prune(|r| round.keeps(&r.origin, false));
                    if dropped.is_empty() {
                        self.finish(&round.graph)?;
                        return Ok(round.graph);
                    }
                    tracing::debug!(
                        "dropped {} requirement(s) of versions no longer in the graph, \
                         resolving again (round {})",
                        dropped.len(),
                        number + 1
                    );
                }
                Pass::Restart(round) => {
                    self.requirements.prune(|r| round.keeps(&r.origin, true));
                    tracing::debug!(
                        "selection of {} changed, restarting resolution (round {})",
                        self.last_restart
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_default(),
                        number + 1
                    );
                }
            }
        }

        let identity = self
            .last_restart
            .clone()
            .unwrap_or_else(|| self.root.identity());
        Err(WeftError::Conflict {
            identity: identity.to_string(),
            requesters: self
                .requirements
                .get(&identity)
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
    }

    /// One depth-first pass from the root.
    async fn round(&mut self) -> WeftResult<Pass> {
        let mut round = Round::default();
        let identity = self.root.identity();
        let root = round.graph.add_node(ResolvedNode {
            identity: identity.clone(),
            version: SemanticVersion::parse(&self.root.version).ok(),
            commit_hash: None,
            path: self.root_dir.clone(),
            source: NodeSource::Root,
        });
        round.graph.set_root(root);
        round.path.push(identity.clone());

        let edges = self.root.dependency_decls(&self.root_dir)?;
        self.prefetch(&edges, &round).await;
        let mut stack = vec![Frame {
            node: root,
            origin: Origin::Root(identity.clone()),
            edges,
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.next == frame.edges.len() {
                stack.pop();
                round.path.pop();
                continue;
            }
            let decl = frame.edges[frame.next].clone();
            frame.next += 1;
            let (parent, origin) = (frame.node, frame.origin.clone());

            match self.visit(&mut round, parent, &origin, decl).await? {
                Visit::Done => {}
                Visit::Descend(identity, child) => {
                    round.path.push(identity);
                    stack.push(child);
                }
                Visit::Restart => return Ok(Pass::Restart(round)),
            }
        }

        Ok(Pass::Complete(round))
    }

    async fn visit(
        &mut self,
        round: &mut Round,
        parent: NodeIndex,
        origin: &Origin,
        decl: DependencyDecl,
    ) -> WeftResult<Visit> {
        let identity = decl.identity;
        if let Some(pos) = round.path.iter().position(|open| *open == identity) {
            let mut cycle: Vec<String> = round.path[pos..].iter().map(ToString::to_string).collect();
            cycle.push(identity.to_string());
            return Err(WeftError::CyclicDependency { cycle });
        }

        match decl.source {
            DependencySource::Local { path } => self.visit_local(round, parent, identity, path).await,
            DependencySource::Registry { specifier } => {
                self.visit_registry(round, parent, origin, identity, &specifier)
                    .await
            }
        }
    }

    async fn visit_registry(
        &mut self,
        round: &mut Round,
        parent: NodeIndex,
        origin: &Origin,
        identity: PackageIdentity,
        specifier: &str,
    ) -> WeftResult<Visit> {
        let parsed = VersionSpecifier::parse(specifier)?;
        self.requirements.add(
            &identity,
            Requirement {
                origin: origin.clone(),
                specifier: parsed,
            },
        );
        let edge = DepEdge::Registry {
            specifier: specifier.to_string(),
        };

        match round.selected.get(&identity).cloned() {
            Some(Selected::Local { root }) => {
                return Err(WeftError::LocalPathMismatch {
                    identity: identity.to_string(),
                    first: format!("local path {}", root.display()),
                    second: format!("registry specifier `{specifier}`"),
                });
            }
            Some(Selected::Registry { version, .. }) => {
                let choice = self.choose(&identity, round).await?;
                if let Some(node) = round.graph.find(&identity) {
                    round.graph.add_edge(parent, node, edge);
                }
                if choice.version != version {
                    self.last_restart = Some(identity);
                    return Ok(Visit::Restart);
                }
                return Ok(Visit::Done);
            }
            None => {}
        }

        let choice = self.choose(&identity, round).await?;
        let path = self
            .builder
            .cache
            .fetch(&choice.repo_url, &choice.commit_hash)
            .await?;
        let manifest = self.load_package_manifest(&identity, &path)?;

        let node = round.graph.add_node(ResolvedNode {
            identity: identity.clone(),
            version: Some(choice.version.clone()),
            commit_hash: Some(choice.commit_hash.clone()),
            path: path.clone(),
            source: NodeSource::Registry {
                repo_url: choice.repo_url.clone(),
            },
        });
        round.graph.add_edge(parent, node, edge);
        round.selected.insert(
            identity.clone(),
            Selected::Registry {
                version: choice.version.clone(),
                path: path.clone(),
            },
        );
        tracing::debug!("selected {identity} v{} for {origin}", choice.version);

        let origin = Origin::Registry(identity.clone(), choice.version);
        if self.collect_overrides(&manifest, &origin.to_string(), false, Some(&*round))? {
            return Ok(Visit::Restart);
        }
        let edges = manifest.dependency_decls(&path)?;
        self.prefetch(&edges, round).await;
        Ok(Visit::Descend(
            identity,
            Frame {
                node,
                origin,
                edges,
                next: 0,
            },
        ))
    }

    async fn visit_local(
        &mut self,
        round: &mut Round,
        parent: NodeIndex,
        identity: PackageIdentity,
        path: PathBuf,
    ) -> WeftResult<Visit> {
        if self.pins.is_some() {
            return Err(WeftError::LockInconsistency {
                message: format!(
                    "{identity} is a local path dependency ({}), which cannot be locked",
                    path.display()
                ),
            });
        }
        if let Some(entry) = self.overrides.get(&identity) {
            return Err(WeftError::LocalPathMismatch {
                identity: identity.to_string(),
                first: format!("override to {} by {}", entry.version, entry.declared_by),
                second: format!("local path {}", path.display()),
            });
        }

        let root = path.canonicalize().map_err(|e| WeftError::Manifest {
            message: format!(
                "local dependency {identity} at {} is not readable: {e}",
                path.display()
            ),
        })?;
        let edge = DepEdge::Local { path: path.clone() };

        match round.selected.get(&identity) {
            Some(Selected::Local { root: existing }) if *existing == root => {
                if let Some(node) = round.graph.find(&identity) {
                    round.graph.add_edge(parent, node, edge);
                }
                return Ok(Visit::Done);
            }
            Some(Selected::Local { root: existing }) => {
                return Err(WeftError::LocalPathMismatch {
                    identity: identity.to_string(),
                    first: format!("local path {}", existing.display()),
                    second: format!("local path {}", root.display()),
                });
            }
            Some(Selected::Registry { version, path: fetched }) => {
                if fetched.canonicalize().ok().as_ref() == Some(&root) {
                    if let Some(node) = round.graph.find(&identity) {
                        round.graph.add_edge(parent, node, edge);
                    }
                    return Ok(Visit::Done);
                }
                return Err(WeftError::LocalPathMismatch {
                    identity: identity.to_string(),
                    first: format!("registry version {version}"),
                    second: format!("local path {}", root.display()),
                });
            }
            None => {}
        }

        let manifest = self.load_package_manifest(&identity, &root)?;
        let node = round.graph.add_node(ResolvedNode {
            identity: identity.clone(),
            version: None,
            commit_hash: None,
            path: root.clone(),
            source: NodeSource::Local,
        });
        round.graph.add_edge(parent, node, edge);
        round
            .selected
            .insert(identity.clone(), Selected::Local { root: root.clone() });

        let origin = Origin::Local(identity.clone());
        if self.collect_overrides(&manifest, &origin.to_string(), false, Some(&*round))? {
            return Ok(Visit::Restart);
        }
        let edges = manifest.dependency_decls(&root)?;
        self.prefetch(&edges, round).await;
        Ok(Visit::Descend(
            identity,
            Frame {
                node,
                origin,
                edges,
                next: 0,
            },
        ))
    }

    /// Decide the version of `identity` from its pin, its override, or the
    /// intersection of the requirements that still apply in `round`.
    async fn choose(&mut self, identity: &PackageIdentity, round: &Round) -> WeftResult<Choice> {
        if let Some(pins) = &self.pins {
            let pin = pins
                .get(identity)
                .cloned()
                .ok_or_else(|| WeftError::LockInconsistency {
                    message: format!("{identity} is not pinned"),
                })?;
            return self.choose_pinned(identity, pin, round).await;
        }

        let candidates = self.candidates_for(identity).await?;
        let chosen = match self.overrides.get(identity) {
            Some(entry) => candidates
                .iter()
                .find(|c| c.version == entry.version)
                .ok_or_else(|| WeftError::NotFound {
                    identity: identity.to_string(),
                    specifier: format!("={}", entry.version),
                })?,
            None => self
                .requirements
                .select(identity, &candidates, |r| round.keeps(&r.origin, true))?,
        }
        .clone();

        let repo_url = match chosen.repo_url {
            Some(url) => url,
            None => {
                self.repo_url_for(identity, &chosen.version, &chosen.commit_hash)
                    .await?
            }
        };
        Ok(Choice {
            version: chosen.version,
            commit_hash: chosen.commit_hash,
            repo_url,
        })
    }

    async fn choose_pinned(
        &mut self,
        identity: &PackageIdentity,
        pin: LockedPackage,
        round: &Round,
    ) -> WeftResult<Choice> {
        let version =
            SemanticVersion::parse(&pin.version).map_err(|_| WeftError::LockInconsistency {
                message: format!("{identity} is pinned to unparseable version `{}`", pin.version),
            })?;

        match self.overrides.get(identity) {
            Some(entry) if entry.version != version => {
                return Err(WeftError::LockInconsistency {
                    message: format!(
                        "{identity} is pinned to {version} but overridden to {}",
                        entry.version
                    ),
                });
            }
            Some(_) => {}
            None => {
                if let Some(req) = self
                    .requirements
                    .live(identity, |r| round.keeps(&r.origin, true))
                    .into_iter()
                    .find(|r| !r.specifier.matches(&version))
                {
                    return Err(WeftError::LockInconsistency {
                        message: format!(
                            "{identity} is pinned to {version}, which no longer satisfies `{}` ({})",
                            req.specifier, req.origin
                        ),
                    });
                }
            }
        }

        let repo_url = match pin.source {
            Some(url) => url,
            None => self.repo_url_for(identity, &version, &pin.commit_hash).await?,
        };
        Ok(Choice {
            version,
            commit_hash: pin.commit_hash,
            repo_url,
        })
    }

    /// Ask the registry which repository holds an exact release.
    async fn repo_url_for(
        &mut self,
        identity: &PackageIdentity,
        version: &SemanticVersion,
        commit_hash: &str,
    ) -> WeftResult<String> {
        let key = (identity.clone(), version.clone());
        if let Some(url) = self.repo_urls.get(&key) {
            return Ok(url.clone());
        }
        let release = self
            .builder
            .registry
            .resolve(identity, &format!("={version}"))
            .await?;
        if release.commit_hash != commit_hash {
            let message = format!(
                "{identity} v{version} resolves to commit {}, expected {commit_hash}",
                release.commit_hash
            );
            return Err(if self.pins.is_some() {
                WeftError::LockInconsistency { message }
            } else {
                WeftError::Registry { message }
            });
        }
        self.repo_urls.insert(key, release.repo_url.clone());
        Ok(release.repo_url)
    }

    async fn candidates_for(
        &mut self,
        identity: &PackageIdentity,
    ) -> WeftResult<Arc<Vec<PublishedVersion>>> {
        if let Some(found) = self.candidates.get(identity) {
            return Ok(Arc::clone(found));
        }
        if let Some(err) = self.listing_errors.remove(identity) {
            return Err(err);
        }
        let listing = self.builder.registry.list_versions(identity).await?;
        let published = Arc::new(PublishedVersion::from_listing(identity, listing));
        self.candidates.insert(identity.clone(), Arc::clone(&published));
        Ok(published)
    }

    /// Fetch listings for the registry dependencies in `edges` concurrently,
    /// then warm the cache with their likely selections.
    async fn prefetch(&mut self, edges: &[DependencyDecl], round: &Round) {
        if self.pins.is_none() {
            self.prefetch_listings(edges).await;
        }
        self.prefetch_sources(edges, round).await;
    }

    async fn prefetch_listings(&mut self, edges: &[DependencyDecl]) {
        let mut seen = HashSet::new();
        let missing: Vec<PackageIdentity> = edges
            .iter()
            .filter(|d| matches!(d.source, DependencySource::Registry { .. }))
            .map(|d| d.identity.clone())
            .filter(|id| !self.candidates.contains_key(id) && !self.listing_errors.contains_key(id))
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if missing.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.builder.jobs));
        let mut join_set = JoinSet::new();
        for identity in missing {
            let registry = Arc::clone(&self.builder.registry);
            let sem = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = sem.acquire().await;
                let result = registry.list_versions(&identity).await;
                (identity, result)
            });
        }
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((identity, Ok(listing))) => {
                    let published = PublishedVersion::from_listing(&identity, listing);
                    self.candidates.insert(identity, Arc::new(published));
                }
                Ok((identity, Err(err))) => {
                    self.listing_errors.insert(identity, err);
                }
                Err(e) => tracing::warn!("registry lookup task failed: {e}"),
            }
        }
    }

    /// Start fetching the sources each new dependency would most likely
    /// resolve to. Failures are left for the sequential visit to report.
    async fn prefetch_sources(&mut self, edges: &[DependencyDecl], round: &Round) {
        let mut targets: Vec<(String, String)> = Vec::new();
        for decl in edges {
            let DependencySource::Registry { specifier } = &decl.source else {
                continue;
            };
            if let Some(target) = self.tentative_source(&decl.identity, specifier, round) {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        if targets.len() < 2 {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.builder.jobs));
        let mut join_set = JoinSet::new();
        for (repo_url, commit_hash) in targets {
            let cache = Arc::clone(&self.builder.cache);
            let sem = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = sem.acquire().await;
                let result = cache.fetch(&repo_url, &commit_hash).await;
                (repo_url, commit_hash, result)
            });
        }
        while let Some(joined) = join_set.join_next().await {
            if let Ok((repo_url, commit_hash, Err(e))) = joined {
                tracing::debug!("prefetch of {repo_url}@{commit_hash} failed: {e}");
            }
        }
    }

    fn tentative_source(
        &self,
        identity: &PackageIdentity,
        specifier: &str,
        round: &Round,
    ) -> Option<(String, String)> {
        if let Some(pins) = &self.pins {
            let pin = pins.get(identity)?;
            return Some((pin.source.clone()?, pin.commit_hash.clone()));
        }
        let candidates = self.candidates.get(identity)?;
        let chosen = match self.overrides.get(identity) {
            Some(entry) => candidates.iter().find(|c| c.version == entry.version)?,
            None => {
                let extra = VersionSpecifier::parse(specifier).ok()?;
                let mut specifiers: Vec<&VersionSpecifier> = self
                    .requirements
                    .live(identity, |r| round.keeps(&r.origin, true))
                    .into_iter()
                    .map(|r| &r.specifier)
                    .collect();
                specifiers.push(&extra);
                select(candidates, &specifiers)?
            }
        };
        Some((chosen.repo_url.clone()?, chosen.commit_hash.clone()))
    }

    /// Load a dependency's manifest, which must describe a package.
    fn load_package_manifest(
        &mut self,
        identity: &PackageIdentity,
        dir: &Path,
    ) -> WeftResult<Manifest> {
        if let Some(manifest) = self.manifests.get(dir) {
            return Ok(manifest.clone());
        }
        let manifest = Manifest::load(dir).map_err(|e| WeftError::Manifest {
            message: format!("{identity} ({}): {e}", dir.display()),
        })?;
        if manifest.project_type != ProjectType::Package {
            return Err(WeftError::Manifest {
                message: format!(
                    "{identity} ({}) is a {:?} project; only packages can be dependencies",
                    dir.display(),
                    manifest.project_type
                ),
            });
        }
        let declared = manifest.identity();
        if declared.organization != identity.organization || declared.name != identity.name {
            tracing::warn!("{identity} resolved to a manifest that declares itself as {declared}");
        }
        self.manifests.insert(dir.to_path_buf(), manifest.clone());
        Ok(manifest)
    }

    /// Merge `manifest`'s overrides. Returns `true` when one of them changes a
    /// version already selected in `round`.
    fn collect_overrides(
        &mut self,
        manifest: &Manifest,
        requester: &str,
        from_root: bool,
        round: Option<&Round>,
    ) -> WeftResult<bool> {
        let mut restart = false;
        for decl in manifest.override_decls()? {
            let version = SemanticVersion::from(decl.version);
            let identity = decl.identity;

            if let Some(existing) = self.overrides.get(&identity) {
                if existing.version == version {
                    continue;
                }
                if existing.from_root && !from_root {
                    tracing::warn!(
                        "{requester} overrides {identity} to {version}; keeping {} from {}",
                        existing.version,
                        existing.declared_by
                    );
                    continue;
                }
                return Err(WeftError::Conflict {
                    identity: identity.to_string(),
                    requesters: vec![
                        format!("{} overrides to {}", existing.declared_by, existing.version),
                        format!("{requester} overrides to {version}"),
                    ],
                });
            }

            match round.and_then(|r| r.selected.get(&identity)) {
                Some(Selected::Local { root }) => {
                    return Err(WeftError::LocalPathMismatch {
                        identity: identity.to_string(),
                        first: format!("local path {}", root.display()),
                        second: format!("override to {version} by {requester}"),
                    });
                }
                Some(Selected::Registry { version: current, .. }) if *current != version => {
                    self.last_restart = Some(identity.clone());
                    restart = true;
                }
                _ => {}
            }

            self.overrides.insert(
                identity,
                OverrideEntry {
                    version,
                    declared_by: requester.to_string(),
                    from_root,
                },
            );
        }
        Ok(restart)
    }

    fn finish(&self, graph: &DependencyGraph) -> WeftResult<()> {
        for (identity, entry) in &self.overrides {
            if graph.find(identity).is_none() {
                tracing::warn!(
                    "override {identity} = {} from {} matches no package in the graph",
                    entry.version,
                    entry.declared_by
                );
            }
        }

        if let Some(pins) = &self.pins {
            let mut stale: Vec<&PackageIdentity> =
                pins.keys().filter(|id| graph.find(id).is_none()).collect();
            stale.sort();
            if let Some(identity) = stale.first() {
                return Err(WeftError::LockInconsistency {
                    message: format!("{identity} is pinned but no longer part of the graph"),
                });
            }
        }
        Ok(())
    }
}
