use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use weft_util::errors::{WeftError, WeftResult};

use crate::identity::{parse_identity_key, PackageIdentity};

/// Primary manifest file name.
pub const MANIFEST_FILE: &str = "Weft.toml";
/// JSON manifest, read only when no `Weft.toml` exists.
pub const MANIFEST_JSON_FILE: &str = "weft.json";

/// The parsed representation of a project manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub target: String,
    pub organization: String,
    pub name: String,
    pub description: String,
    pub version: String,

    #[serde(rename = "type")]
    pub project_type: ProjectType,

    #[serde(default)]
    pub include_mode: IncludeMode,

    #[serde(default)]
    pub entrypoints: Vec<String>,

    #[serde(default)]
    pub dependencies: OrderedTable,

    #[serde(default)]
    pub overrides: OrderedTable,

    /// Top-level keys weft does not interpret, kept as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Package,
    Expert,
    Indicator,
    Script,
    Library,
    Service,
}

/// How dependency headers are made available to the compiler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeMode {
    /// Mirror referenced headers into `weft/include`.
    #[default]
    Include,
    /// Concatenate one header per entrypoint into `weft/flat`.
    Flat,
}

/// A string-to-string table that remembers declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedTable(Vec<(String, String)>);

impl OrderedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for OrderedTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OrderedTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = OrderedTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, String)> = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    if entries.iter().any(|(k, _)| *k == key) {
                        return Err(serde::de::Error::custom(format!("duplicate key `{key}`")));
                    }
                    entries.push((key, value));
                }
                Ok(OrderedTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Where a declared dependency comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySource {
    Registry { specifier: String },
    Local { path: PathBuf },
}

/// One entry of `[dependencies]`, with its key expanded to an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDecl {
    pub key: String,
    pub identity: PackageIdentity,
    pub source: DependencySource,
}

/// One entry of `[overrides]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideDecl {
    pub key: String,
    pub identity: PackageIdentity,
    pub version: semver::Version,
}

impl Manifest {
    /// Locate and load the manifest in `dir`, preferring `Weft.toml`.
    pub fn load(dir: &Path) -> WeftResult<Self> {
        let toml_path = dir.join(MANIFEST_FILE);
        if toml_path.is_file() {
            return Self::from_path(&toml_path);
        }
        let json_path = dir.join(MANIFEST_JSON_FILE);
        if json_path.is_file() {
            return Self::from_path(&json_path);
        }
        Err(WeftError::Manifest {
            message: format!("no {MANIFEST_FILE} found in {}", dir.display()),
        })
    }

    /// Whether `dir` contains a manifest in either format.
    pub fn exists_in(dir: &Path) -> bool {
        dir.join(MANIFEST_FILE).is_file() || dir.join(MANIFEST_JSON_FILE).is_file()
    }

    /// Load a manifest file; `.json` files are parsed as JSON, everything else as TOML.
    pub fn from_path(path: &Path) -> WeftResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| WeftError::Manifest {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_str(&content)
        }
    }

    /// Parse and validate a TOML manifest.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> WeftResult<Self> {
        let manifest: Self = toml::from_str(content).map_err(|e| WeftError::Manifest {
            message: format!("Failed to parse {MANIFEST_FILE}: {e}"),
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse and validate a JSON manifest.
    pub fn from_json_str(content: &str) -> WeftResult<Self> {
        let manifest: Self = serde_json::from_str(content).map_err(|e| WeftError::Manifest {
            message: format!("Failed to parse {MANIFEST_JSON_FILE}: {e}"),
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> WeftResult<()> {
        for (field, value) in [
            ("target", &self.target),
            ("organization", &self.organization),
            ("name", &self.name),
        ] {
            if value.trim().is_empty() {
                return Err(WeftError::Manifest {
                    message: format!("`{field}` must not be empty"),
                });
            }
        }
        semver::Version::parse(&self.version).map_err(|e| WeftError::Manifest {
            message: format!("`version = \"{}\"` is not a valid version: {e}", self.version),
        })?;
        if self.include_mode == IncludeMode::Flat && self.entrypoints.is_empty() {
            return Err(WeftError::Manifest {
                message: "`entrypoints` is required when `include_mode = \"flat\"`".to_string(),
            });
        }
        Ok(())
    }

    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(&self.target, &self.organization, &self.name)
    }

    /// The mode actually used to assemble headers. Packages always build flat so
    /// their own published `weft/include` tree is never overwritten.
    pub fn effective_include_mode(&self) -> IncludeMode {
        match self.project_type {
            ProjectType::Package => IncludeMode::Flat,
            _ => self.include_mode,
        }
    }

    /// `[dependencies]` in declaration order, with local paths resolved
    /// against `manifest_dir`.
    pub fn dependency_decls(&self, manifest_dir: &Path) -> WeftResult<Vec<DependencyDecl>> {
        self.dependencies
            .iter()
            .map(|(key, value)| {
                let (org, name) = parse_identity_key(key, &self.organization)?;
                let source = if is_local_path(value) {
                    DependencySource::Local {
                        path: resolve_local_path(value, manifest_dir),
                    }
                } else {
                    DependencySource::Registry {
                        specifier: value.trim().to_string(),
                    }
                };
                Ok(DependencyDecl {
                    key: key.to_string(),
                    identity: PackageIdentity::new(&self.target, &org, &name),
                    source,
                })
            })
            .collect()
    }

    /// `[overrides]` in declaration order. Only exact versions are accepted.
    pub fn override_decls(&self) -> WeftResult<Vec<OverrideDecl>> {
        self.overrides
            .iter()
            .map(|(key, value)| {
                let (org, name) = parse_identity_key(key, &self.organization)?;
                let identity = PackageIdentity::new(&self.target, &org, &name);
                if is_local_path(value) {
                    return Err(WeftError::LocalPathMismatch {
                        identity: identity.to_string(),
                        first: "an override".to_string(),
                        second: format!("local path {value}"),
                    });
                }
                let version =
                    semver::Version::parse(value.trim()).map_err(|e| WeftError::Manifest {
                        message: format!(
                            "override `{key} = \"{value}\"` must be an exact version: {e}"
                        ),
                    })?;
                Ok(OverrideDecl {
                    key: key.to_string(),
                    identity,
                    version,
                })
            })
            .collect()
    }
}

/// Whether a dependency value names a directory rather than a version range.
pub fn is_local_path(value: &str) -> bool {
    let value = value.trim();
    ["./", "../", "/", "~", "file://"]
        .iter()
        .any(|prefix| value.starts_with(prefix))
}

/// Turn a local dependency value into a path, relative to `base_dir` unless absolute.
pub fn resolve_local_path(value: &str, base_dir: &Path) -> PathBuf {
    let value = value.trim();
    let value = value.strip_prefix("file://").unwrap_or(value);
    if value == "~" {
        return weft_util::fs::home_dir();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return weft_util::fs::home_dir().join(rest);
    }
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
