use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use weft_core::config::GlobalConfig;
use weft_core::identity::PackageIdentity;
use weft_core::lockfile::{Lockfile, LOCKFILE_NAME};
use weft_ops::ops_install::{install_with, InstallOptions};
use weft_ops::ops_tree::{tree_with, TreeOptions};
use weft_ops::Collaborators;
use weft_registry::memory::{DirFetcher, MemoryRegistry};
use weft_util::errors::WeftError;
use weft_util::lock::ProjectLock;

struct World {
    tmp: TempDir,
    registry: MemoryRegistry,
    fetcher: DirFetcher,
}

impl World {
    fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
            registry: MemoryRegistry::new(),
            fetcher: DirFetcher::new(),
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            registry: Arc::new(self.registry.clone()),
            fetcher: Arc::new(self.fetcher.clone()),
        }
    }

    /// Publish `@acme/json` whose only header defines `JSON_VERSION`.
    fn publish_json(&self, version: &str) {
        let dir = self.tmp.path().join("sources").join(format!("json-{version}"));
        let inc = dir.join("weft/include/acme/json");
        std::fs::create_dir_all(&inc).unwrap();
        std::fs::write(
            dir.join("Weft.toml"),
            format!(
                "target = \"mql5\"\norganization = \"acme\"\nname = \"json\"\n\
                 description = \"json\"\nversion = \"{version}\"\ntype = \"package\"\n"
            ),
        )
        .unwrap();
        std::fs::write(inc.join("json.mqh"), format!("#define JSON_VERSION \"{version}\"\n")).unwrap();

        let commit = format!("json{}", version.replace('.', ""));
        let repo = "https://git.example/acme/json";
        self.registry
            .publish(&PackageIdentity::new("mql5", "acme", "json"), version, &commit, repo);
        self.fetcher.add(repo, &commit, &dir);
    }

    /// A flat-mode expert advisor depending on `json` with `specifier`.
    fn project(&self, specifier: &str) -> PathBuf {
        let dir = self.tmp.path().join("bot");
        std::fs::create_dir_all(dir.join("src")).unwrap();
        std::fs::write(
            dir.join("Weft.toml"),
            format!(
                "target = \"mql5\"\norganization = \"acme\"\nname = \"bot\"\n\
                 description = \"bot\"\nversion = \"0.1.0\"\ntype = \"expert\"\n\
                 include_mode = \"flat\"\nentrypoints = [\"src/Bot.mq5\"]\n\n\
                 [dependencies]\njson = \"{specifier}\"\n"
            ),
        )
        .unwrap();
        std::fs::write(
            dir.join("src/Bot.mq5"),
            "/* @weft:include \"acme/json/json.mqh\" */\nvoid OnTick() {}\n",
        )
        .unwrap();
        dir
    }
}

fn flat_output(project: &Path) -> String {
    std::fs::read_to_string(project.join("weft/flat/Bot_flat.mq5")).unwrap()
}

#[tokio::test]
async fn install_locks_and_assembles() {
    let w = World::new();
    w.publish_json("1.0.0");
    w.publish_json("1.1.0");
    let project = w.project("^1.0.0");
    let config = GlobalConfig::default();

    let report = install_with(&project, &InstallOptions::default(), &w.collaborators(), &config)
        .await
        .unwrap();
    assert!(report.lockfile_written);
    assert_eq!(report.tree, "@acme/bot v0.1.0\n└── @acme/json v1.1.0\n");
    assert!(flat_output(&project).contains("#define JSON_VERSION \"1.1.0\""));

    let lockfile = Lockfile::from_path(&project.join(LOCKFILE_NAME)).unwrap();
    assert_eq!(lockfile.package.len(), 1);
    assert_eq!(lockfile.package[0].commit_hash, "json110");
    assert_eq!(
        lockfile.package[0].source.as_deref(),
        Some("https://git.example/acme/json")
    );
    assert!(project.join(".weft/packages/json110").is_dir());

    let again = install_with(&project, &InstallOptions::default(), &w.collaborators(), &config)
        .await
        .unwrap();
    assert!(!again.lockfile_written);
}

#[tokio::test]
async fn locked_install_without_lockfile_fails() {
    let w = World::new();
    w.publish_json("1.0.0");
    let project = w.project("^1.0.0");

    let err = install_with(
        &project,
        &InstallOptions { locked: true },
        &w.collaborators(),
        &GlobalConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WeftError>(),
        Some(WeftError::LockInconsistency { .. })
    ));
    assert!(!project.join(LOCKFILE_NAME).exists());
}

#[tokio::test]
async fn locked_install_keeps_pins_when_newer_versions_appear() {
    let w = World::new();
    w.publish_json("1.0.0");
    let project = w.project("^1.0.0");
    let config = GlobalConfig::default();
    install_with(&project, &InstallOptions::default(), &w.collaborators(), &config)
        .await
        .unwrap();
    let before = std::fs::read(project.join(LOCKFILE_NAME)).unwrap();

    w.publish_json("1.2.0");
    let report = install_with(&project, &InstallOptions { locked: true }, &w.collaborators(), &config)
        .await
        .unwrap();
    assert!(!report.lockfile_written);
    assert!(flat_output(&project).contains("#define JSON_VERSION \"1.0.0\""));
    assert_eq!(std::fs::read(project.join(LOCKFILE_NAME)).unwrap(), before);
}

#[tokio::test]
async fn tree_honors_a_consistent_lockfile_and_writes_nothing() {
    let w = World::new();
    w.publish_json("1.0.0");
    let project = w.project("^1.0.0");
    let config = GlobalConfig::default();
    install_with(&project, &InstallOptions::default(), &w.collaborators(), &config)
        .await
        .unwrap();
    let before = std::fs::read(project.join(LOCKFILE_NAME)).unwrap();
    w.publish_json("1.3.0");

    let locked = tree_with(&project, &TreeOptions::default(), &w.collaborators(), &config)
        .await
        .unwrap();
    assert!(locked.contains("@acme/json v1.0.0"));

    w.project("~1.3");
    let fresh = tree_with(&project, &TreeOptions::default(), &w.collaborators(), &config)
        .await
        .unwrap();
    assert!(fresh.contains("@acme/json v1.3.0"));
    assert_eq!(std::fs::read(project.join(LOCKFILE_NAME)).unwrap(), before);
}

#[tokio::test]
async fn concurrent_invocation_fails_fast() {
    let w = World::new();
    w.publish_json("1.0.0");
    let project = w.project("^1.0.0");
    let _held = ProjectLock::acquire(&project).unwrap();

    let err = install_with(
        &project,
        &InstallOptions::default(),
        &w.collaborators(),
        &GlobalConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WeftError>(),
        Some(WeftError::ProjectLocked { .. })
    ));
}
