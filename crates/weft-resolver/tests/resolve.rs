use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use weft_core::identity::PackageIdentity;
use weft_core::manifest::Manifest;
use weft_registry::memory::{DirFetcher, MemoryRegistry};
use weft_resolver::cache::PackageCache;
use weft_resolver::graph::{DependencyGraph, NodeSource};
use weft_resolver::lock::{lockfile_from_graph, LockReconciler};
use weft_resolver::resolver::GraphBuilder;
use weft_util::errors::WeftError;

struct World {
    tmp: TempDir,
    registry: MemoryRegistry,
    fetcher: DirFetcher,
}

fn manifest_toml(
    name: &str,
    version: &str,
    kind: &str,
    deps: &[(&str, &str)],
    overrides: &[(&str, &str)],
) -> String {
    let mut text = format!(
        "target = \"mql5\"\norganization = \"acme\"\nname = \"{name}\"\n\
         description = \"\"\nversion = \"{version}\"\ntype = \"{kind}\"\n"
    );
    text.push_str("\n[dependencies]\n");
    for (key, value) in deps {
        text.push_str(&format!("\"{key}\" = \"{value}\"\n"));
    }
    text.push_str("\n[overrides]\n");
    for (key, value) in overrides {
        text.push_str(&format!("\"{key}\" = \"{value}\"\n"));
    }
    text
}

fn id(name: &str) -> PackageIdentity {
    PackageIdentity::new("mql5", "acme", name)
}

fn repo(name: &str) -> String {
    format!("https://git.example/acme/{name}")
}

impl World {
    fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
            registry: MemoryRegistry::new(),
            fetcher: DirFetcher::new(),
        }
    }

    fn write_package(
        &self,
        dir: &Path,
        name: &str,
        version: &str,
        deps: &[(&str, &str)],
        overrides: &[(&str, &str)],
    ) {
        std::fs::create_dir_all(dir.join("weft/include/acme").join(name)).unwrap();
        std::fs::write(
            dir.join("Weft.toml"),
            manifest_toml(name, version, "package", deps, overrides),
        )
        .unwrap();
        std::fs::write(
            dir.join(format!("weft/include/acme/{name}/{name}.mqh")),
            format!("// {name} {version}\n"),
        )
        .unwrap();
    }

    fn publish(&self, name: &str, version: &str, deps: &[(&str, &str)]) {
        self.publish_with_overrides(name, version, deps, &[]);
    }

    fn publish_with_overrides(
        &self,
        name: &str,
        version: &str,
        deps: &[(&str, &str)],
        overrides: &[(&str, &str)],
    ) {
        let dir = self.tmp.path().join("sources").join(format!("{name}-{version}"));
        self.write_package(&dir, name, version, deps, overrides);
        let commit = format!("{name}{}", version.replace('.', ""));
        self.registry.publish(&id(name), version, &commit, &repo(name));
        self.fetcher.add(&repo(name), &commit, &dir);
    }

    fn project(&self, deps: &[(&str, &str)], overrides: &[(&str, &str)]) -> (PathBuf, Manifest) {
        let dir = self.tmp.path().join("app");
        std::fs::create_dir_all(&dir).unwrap();
        let text = manifest_toml("app", "0.1.0", "expert", deps, overrides);
        std::fs::write(dir.join("Weft.toml"), &text).unwrap();
        (dir, Manifest::from_str(&text).unwrap())
    }

    fn builder(&self) -> GraphBuilder {
        let cache = PackageCache::new(
            self.tmp.path().join("cache"),
            Arc::new(self.fetcher.clone()),
        );
        GraphBuilder::new(Arc::new(self.registry.clone()), Arc::new(cache)).with_jobs(4)
    }
}

fn version_of(graph: &DependencyGraph, name: &str) -> String {
    let idx = graph.find(&id(name)).expect("package in graph");
    graph.node(idx).version.as_ref().unwrap().to_string()
}

#[tokio::test]
async fn diamond_selects_single_highest_version() {
    let w = World::new();
    w.publish("a", "1.0.0", &[("c", "^1.0.0")]);
    w.publish("b", "1.0.0", &[("c", "^1.2.0")]);
    for v in ["1.0.0", "1.2.0", "1.5.0", "2.0.0"] {
        w.publish("c", v, &[]);
    }
    let (dir, manifest) = w.project(&[("a", "^1.0.0"), ("b", "^1.0.0")], &[]);

    let graph = w.builder().build(&dir, &manifest).await.unwrap();
    assert_eq!(graph.all_nodes().len(), 3);
    assert_eq!(version_of(&graph, "c"), "1.5.0");
    assert_eq!(
        graph.print_tree(None),
        "\
@acme/app v0.1.0
├── @acme/a v1.0.0
│   └── @acme/c v1.5.0
└── @acme/b v1.0.0
    └── @acme/c v1.5.0
"
    );
}

#[tokio::test]
async fn later_requirement_restarts_with_intersection() {
    let w = World::new();
    w.publish("a", "1.0.0", &[("c", "^1.0.0")]);
    w.publish("b", "1.0.0", &[("c", "<1.3.0")]);
    for v in ["1.0.0", "1.2.0", "1.5.0"] {
        w.publish("c", v, &[]);
    }
    let (dir, manifest) = w.project(&[("a", "^1.0.0"), ("b", "^1.0.0")], &[]);

    let graph = w.builder().build(&dir, &manifest).await.unwrap();
    assert_eq!(version_of(&graph, "c"), "1.2.0");
    // listings are a per-run snapshot, even across restarts
    assert_eq!(w.registry.list_calls(), 3);
}

#[tokio::test]
async fn disjoint_requirements_name_every_requester() {
    let w = World::new();
    w.publish("a", "1.0.0", &[("c", "^1.0.0")]);
    w.publish("b", "1.0.0", &[("c", "^2.0.0")]);
    w.publish("c", "1.0.0", &[]);
    w.publish("c", "2.0.0", &[]);
    let (dir, manifest) = w.project(&[("a", "^1.0.0"), ("b", "^1.0.0")], &[]);

    match w.builder().build(&dir, &manifest).await {
        Err(WeftError::Conflict { identity, requesters }) => {
            assert_eq!(identity, "@acme/c");
            assert_eq!(
                requesters,
                [
                    "@acme/a v1.0.0 requires ^1.0.0",
                    "@acme/b v1.0.0 requires ^2.0.0"
                ]
            );
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn abandoned_selection_does_not_constrain_dependencies() {
    let w = World::new();
    w.publish("a", "1.4.0", &[("b", "^1.0.0")]);
    w.publish("a", "1.5.0", &[("b", "^2.0.0")]);
    w.publish("b", "1.0.0", &[]);
    w.publish("b", "2.0.0", &[]);
    w.publish("c", "1.0.0", &[("a", "<1.5.0")]);
    let (dir, manifest) = w.project(&[("a", "^1.0.0"), ("c", "^1.0.0")], &[]);

    let graph = w.builder().build(&dir, &manifest).await.unwrap();
    assert_eq!(version_of(&graph, "a"), "1.4.0");
    assert_eq!(version_of(&graph, "b"), "1.0.0");
    assert_eq!(version_of(&graph, "c"), "1.0.0");
}

#[tokio::test]
async fn missing_version_is_not_found() {
    let w = World::new();
    w.publish("a", "1.0.0", &[]);
    let (dir, manifest) = w.project(&[("a", "^2.0.0")], &[]);
    assert!(matches!(
        w.builder().build(&dir, &manifest).await,
        Err(WeftError::NotFound { .. })
    ));
}

#[tokio::test]
async fn root_override_wins_over_specifiers() {
    let w = World::new();
    w.publish("a", "1.0.0", &[("c", "^1.2.0")]);
    w.publish("c", "1.0.0", &[]);
    w.publish("c", "1.2.0", &[]);
    let (dir, manifest) = w.project(&[("a", "^1.0.0")], &[("c", "1.0.0")]);

    let graph = w.builder().build(&dir, &manifest).await.unwrap();
    assert_eq!(version_of(&graph, "c"), "1.0.0");
}

#[tokio::test]
async fn dependency_override_applies_to_the_whole_graph() {
    let w = World::new();
    w.publish_with_overrides("a", "1.0.0", &[], &[("c", "1.0.0")]);
    w.publish("b", "1.0.0", &[("c", "^1.0.0")]);
    w.publish("c", "1.0.0", &[]);
    w.publish("c", "1.2.0", &[]);
    let (dir, manifest) = w.project(&[("a", "^1.0.0"), ("b", "^1.0.0")], &[]);

    let graph = w.builder().build(&dir, &manifest).await.unwrap();
    assert_eq!(version_of(&graph, "c"), "1.0.0");
}

#[tokio::test]
async fn dependency_override_restarts_an_earlier_selection() {
    let w = World::new();
    w.publish_with_overrides("a", "1.0.0", &[], &[("c", "1.0.0")]);
    w.publish("c", "1.0.0", &[]);
    w.publish("c", "1.2.0", &[]);
    let (dir, manifest) = w.project(&[("c", "^1.0.0"), ("a", "^1.0.0")], &[]);

    let graph = w.builder().build(&dir, &manifest).await.unwrap();
    assert_eq!(version_of(&graph, "c"), "1.0.0");
    assert_eq!(graph.all_nodes().len(), 2);
}

#[tokio::test]
async fn disagreeing_dependency_overrides_conflict() {
    let w = World::new();
    w.publish_with_overrides("a", "1.0.0", &[], &[("c", "1.0.0")]);
    w.publish_with_overrides("b", "1.0.0", &[], &[("c", "1.2.0")]);
    w.publish("c", "1.0.0", &[]);
    w.publish("c", "1.2.0", &[]);
    let (dir, manifest) = w.project(&[("a", "^1.0.0"), ("b", "^1.0.0")], &[]);

    match w.builder().build(&dir, &manifest).await {
        Err(WeftError::Conflict { identity, requesters }) => {
            assert_eq!(identity, "@acme/c");
            assert_eq!(
                requesters,
                [
                    "@acme/a v1.0.0 overrides to 1.0.0",
                    "@acme/b v1.0.0 overrides to 1.2.0"
                ]
            );
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn root_override_beats_dependency_override() {
    let w = World::new();
    w.publish_with_overrides("a", "1.0.0", &[("c", "^1.0.0")], &[("c", "1.2.0")]);
    w.publish("c", "1.0.0", &[]);
    w.publish("c", "1.2.0", &[]);
    let (dir, manifest) = w.project(&[("a", "^1.0.0")], &[("c", "1.0.0")]);

    let graph = w.builder().build(&dir, &manifest).await.unwrap();
    assert_eq!(version_of(&graph, "c"), "1.0.0");
}

#[tokio::test]
async fn override_of_local_dependency_is_a_mismatch() {
    let w = World::new();
    w.write_package(&w.tmp.path().join("json"), "json", "0.3.0", &[], &[]);
    let (dir, manifest) = w.project(&[("json", "../json")], &[("json", "1.0.0")]);

    assert!(matches!(
        w.builder().build(&dir, &manifest).await,
        Err(WeftError::LocalPathMismatch { .. })
    ));
}

#[tokio::test]
async fn package_cycle_is_reported() {
    let w = World::new();
    w.publish("a", "1.0.0", &[("b", "^1.0.0")]);
    w.publish("b", "1.0.0", &[("a", "^1.0.0")]);
    let (dir, manifest) = w.project(&[("a", "^1.0.0")], &[]);

    match w.builder().build(&dir, &manifest).await {
        Err(WeftError::CyclicDependency { cycle }) => {
            assert_eq!(cycle, ["@acme/a", "@acme/b", "@acme/a"]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn local_dependency_is_used_in_place() {
    let w = World::new();
    let local = w.tmp.path().join("json");
    w.write_package(&local, "json", "0.3.0", &[], &[]);
    let (dir, manifest) = w.project(&[("json", "../json")], &[]);

    let graph = w.builder().build(&dir, &manifest).await.unwrap();
    let node = graph.node(graph.find(&id("json")).unwrap());
    assert_eq!(node.source, NodeSource::Local);
    assert_eq!(node.path, local.canonicalize().unwrap());
    assert!(node.version.is_none());
    assert_eq!(w.registry.list_calls(), 0);
}

#[tokio::test]
async fn local_and_registry_sources_clash() {
    let w = World::new();
    w.write_package(&w.tmp.path().join("json"), "json", "0.3.0", &[], &[]);
    w.publish("a", "1.0.0", &[("json", "^1.0.0")]);
    w.publish("json", "1.0.0", &[]);
    let (dir, manifest) = w.project(&[("json", "../json"), ("a", "^1.0.0")], &[]);

    assert!(matches!(
        w.builder().build(&dir, &manifest).await,
        Err(WeftError::LocalPathMismatch { .. })
    ));
}

#[tokio::test]
async fn dependencies_must_be_packages() {
    let w = World::new();
    let local = w.tmp.path().join("bot");
    std::fs::create_dir_all(&local).unwrap();
    std::fs::write(
        local.join("Weft.toml"),
        manifest_toml("bot", "1.0.0", "expert", &[], &[]),
    )
    .unwrap();
    let (dir, manifest) = w.project(&[("bot", "../bot")], &[]);

    assert!(matches!(
        w.builder().build(&dir, &manifest).await,
        Err(WeftError::Manifest { .. })
    ));
}

#[tokio::test]
async fn strict_mode_reuses_pins() {
    let w = World::new();
    w.publish("a", "1.0.0", &[]);
    let (dir, manifest) = w.project(&[("a", "^1.0.0")], &[]);
    let builder = w.builder();
    let reconciler = LockReconciler::new(&builder);

    let first = reconciler.reconcile(&dir, &manifest, None, false).await.unwrap();
    assert!(!first.reused);

    w.publish("a", "1.1.0", &[]);
    let locked = reconciler
        .reconcile(&dir, &manifest, Some(&first.lockfile), true)
        .await
        .unwrap();
    assert!(locked.reused);
    assert_eq!(version_of(&locked.graph, "a"), "1.0.0");
    assert_eq!(locked.lockfile, first.lockfile);

    let fresh = reconciler
        .reconcile(&dir, &manifest, Some(&first.lockfile), false)
        .await
        .unwrap();
    assert_eq!(version_of(&fresh.graph, "a"), "1.1.0");
}

#[tokio::test]
async fn rerun_produces_identical_lockfile() {
    let w = World::new();
    w.publish("a", "1.0.0", &[("c", "^1.0.0")]);
    w.publish("c", "1.0.0", &[]);
    let (dir, manifest) = w.project(&[("a", "^1.0.0")], &[]);
    let builder = w.builder();
    let reconciler = LockReconciler::new(&builder);

    let first = reconciler.reconcile(&dir, &manifest, None, false).await.unwrap();
    let second = reconciler
        .reconcile(&dir, &manifest, Some(&first.lockfile), false)
        .await
        .unwrap();
    assert!(second.reused);
    assert_eq!(
        first.lockfile.to_string_pretty().unwrap(),
        second.lockfile.to_string_pretty().unwrap()
    );
}

#[tokio::test]
async fn strict_mode_rejects_stale_lockfiles() {
    let w = World::new();
    w.publish("a", "1.0.0", &[]);
    w.publish("b", "1.0.0", &[]);
    let (dir, manifest) = w.project(&[("a", "^1.0.0")], &[]);
    let builder = w.builder();
    let reconciler = LockReconciler::new(&builder);

    assert!(matches!(
        reconciler.reconcile(&dir, &manifest, None, true).await,
        Err(WeftError::LockInconsistency { .. })
    ));

    let lock = reconciler
        .reconcile(&dir, &manifest, None, false)
        .await
        .unwrap()
        .lockfile;
    let (dir, changed) = w.project(&[("a", "^1.0.0"), ("b", "^1.0.0")], &[]);
    assert!(matches!(
        reconciler.reconcile(&dir, &changed, Some(&lock), true).await,
        Err(WeftError::LockInconsistency { .. })
    ));
}

#[tokio::test]
async fn strict_mode_rejects_pins_outside_specifier() {
    let w = World::new();
    w.publish("a", "1.0.0", &[]);
    w.publish("a", "2.0.0", &[]);
    let (dir, manifest) = w.project(&[("a", "^1.0.0")], &[]);
    let builder = w.builder();

    let graph = builder.build(&dir, &manifest).await.unwrap();
    let mut lock = lockfile_from_graph(&graph, String::new());
    lock.package[0].version = "2.0.0".to_string();
    lock.package[0].commit_hash = "a200".to_string();

    assert!(matches!(
        builder.build_locked(&dir, &manifest, &lock).await,
        Err(WeftError::LockInconsistency { .. })
    ));
}

#[tokio::test]
async fn strict_mode_rejects_local_dependencies() {
    let w = World::new();
    w.write_package(&w.tmp.path().join("json"), "json", "0.3.0", &[], &[]);
    let (dir, manifest) = w.project(&[("json", "../json")], &[]);
    let builder = w.builder();

    let graph = builder.build(&dir, &manifest).await.unwrap();
    let lock = lockfile_from_graph(&graph, String::new());
    assert!(matches!(
        builder.build_locked(&dir, &manifest, &lock).await,
        Err(WeftError::LockInconsistency { .. })
    ));
}

#[tokio::test]
async fn concurrent_fetches_of_one_commit_coalesce() {
    let w = World::new();
    w.publish("a", "1.0.0", &[]);
    let fetcher = w.fetcher.clone().with_delay(Duration::from_millis(50));
    let cache = PackageCache::new(w.tmp.path().join("cache"), Arc::new(fetcher));

    let (repo_a1, repo_a2) = (repo("a"), repo("a"));
    let (first, second) = tokio::join!(
        cache.fetch(&repo_a1, "a100"),
        cache.fetch(&repo_a2, "a100")
    );
    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(w.fetcher.calls(&repo("a"), "a100"), 1);
    assert!(cache.entry_path("a100").join("Weft.toml").is_file());
}

#[tokio::test]
async fn cached_commits_are_not_fetched_again() {
    let w = World::new();
    w.publish("a", "1.0.0", &[]);
    let (dir, manifest) = w.project(&[("a", "^1.0.0")], &[]);

    w.builder().build(&dir, &manifest).await.unwrap();
    w.builder().build(&dir, &manifest).await.unwrap();
    assert_eq!(w.fetcher.calls(&repo("a"), "a100"), 1);
}
