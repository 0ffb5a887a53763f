//! Semantic versions and version specifiers.
//!
//! Supported specifier forms:
//! - exact pins: `1.2.3`, `=1.2.3`
//! - caret: `^1.2.3`, `^0.2`, `^1` (next breaking change is the left-most non-zero component)
//! - tilde: `~1.2.3`, `~1.2` (patch-level freedom), `~1` (minor-level freedom)
//! - wildcards: `*`, `x`, `1.x`, `1.2.x`, `1.2.*`
//! - ANDed comparators: `>=1.0.0 <2.0.0 !=1.4.0` (`>`, `>=`, `<`, `<=`, `=`, `!=`)
//!
//! `v`-prefixed versions, tags such as `latest`, and incomplete versions
//! outside caret/tilde/wildcard position are rejected.

use std::cmp::Ordering;
use std::fmt;

use weft_util::errors::{WeftError, WeftResult};

/// A SemVer 2.0 version. Build metadata is discarded on parse so it never
/// affects ordering or equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemanticVersion(semver::Version);

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Parse a full `MAJOR.MINOR.PATCH[-PRE][+BUILD]` version.
    pub fn parse(text: &str) -> WeftResult<Self> {
        let text = text.trim();
        reject_v_prefix(text, text)?;
        let mut version = semver::Version::parse(text).map_err(|e| WeftError::InvalidSpecifier {
            specifier: text.to_string(),
            reason: format!("not a MAJOR.MINOR.PATCH version ({e})"),
        })?;
        version.build = semver::BuildMetadata::EMPTY;
        Ok(Self(version))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// The same version with its pre-release identifiers removed.
    pub fn base(&self) -> SemanticVersion {
        Self::new(self.0.major, self.0.minor, self.0.patch)
    }

    fn with_pre(major: u64, minor: u64, patch: u64, pre: semver::Prerelease) -> Self {
        let mut version = semver::Version::new(major, minor, patch);
        version.pre = pre;
        Self(version)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<semver::Version> for SemanticVersion {
    fn from(mut version: semver::Version) -> Self {
        version.build = semver::BuildMetadata::EMPTY;
        Self(version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Eq => "=",
            Op::Ne => "!=",
        }
    }
}

/// One predicate of a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: SemanticVersion,
    /// Written by the user, as opposed to derived from `^`, `~` or a wildcard.
    pub explicit: bool,
}

impl Comparator {
    fn derived(op: Op, version: SemanticVersion) -> Self {
        Self {
            op,
            version,
            explicit: false,
        }
    }

    pub fn test(&self, version: &SemanticVersion) -> bool {
        let ord = version.cmp(&self.version);
        match self.op {
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Eq => ord == Ordering::Equal,
            Op::Ne => ord != Ordering::Equal,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecifierKind {
    ExactPin(SemanticVersion),
    /// All comparators must hold.
    Comparators(Vec<Comparator>),
}

/// A parsed version specifier. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpecifier {
    raw: String,
    kind: SpecifierKind,
    opts_into_prerelease: bool,
}

impl VersionSpecifier {
    pub fn parse(raw: &str) -> WeftResult<Self> {
        let text = raw.trim();
        let tokens = tokenize(text);
        let kind = match tokens.as_slice() {
            [] => return Err(invalid(raw, "empty specifier")),
            [single] => parse_single(single, raw)?,
            many => {
                let mut comparators = Vec::new();
                for token in many {
                    match split_operator(token) {
                        Some((op, rest)) => comparators.push(Comparator {
                            op,
                            version: parse_full(rest, raw)?,
                            explicit: true,
                        }),
                        None => {
                            return Err(invalid(
                                raw,
                                &format!("`{token}` needs an operator when combining comparators"),
                            ))
                        }
                    }
                }
                SpecifierKind::Comparators(comparators)
            }
        };

        let opts_into_prerelease = match &kind {
            SpecifierKind::ExactPin(v) => v.is_prerelease(),
            SpecifierKind::Comparators(cs) => cs.iter().any(|c| c.version.is_prerelease()),
        };

        Ok(Self {
            raw: text.to_string(),
            kind,
            opts_into_prerelease,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> &SpecifierKind {
        &self.kind
    }

    pub fn opts_into_prerelease(&self) -> bool {
        self.opts_into_prerelease
    }

    pub fn exact_pin(&self) -> Option<&SemanticVersion> {
        match &self.kind {
            SpecifierKind::ExactPin(v) => Some(v),
            SpecifierKind::Comparators(_) => None,
        }
    }

    pub fn is_exact_pin_of(&self, version: &SemanticVersion) -> bool {
        self.exact_pin() == Some(version)
    }

    /// Inclusive lower bounds the user wrote as `>=X.Y.Z`.
    pub fn explicit_lower_bounds(&self) -> impl Iterator<Item = &SemanticVersion> {
        let comparators: &[Comparator] = match &self.kind {
            SpecifierKind::Comparators(cs) => cs,
            SpecifierKind::ExactPin(_) => &[],
        };
        comparators
            .iter()
            .filter(|c| c.explicit && c.op == Op::Ge)
            .map(|c| &c.version)
    }

    /// Match with strict pre-release scoping (no published stable versions known).
    pub fn matches(&self, version: &SemanticVersion) -> bool {
        self.matches_in(version, &[])
    }

    /// Match `version`, given the stable versions published for the same package.
    ///
    /// A pre-release only matches when the specifier opts in and the
    /// pre-release shares its base with a pre-release boundary, or that
    /// boundary's stable base is already in `published`.
    pub fn matches_in(&self, version: &SemanticVersion, published: &[SemanticVersion]) -> bool {
        let comparators = match &self.kind {
            SpecifierKind::ExactPin(pin) => return pin == version,
            SpecifierKind::Comparators(cs) => cs,
        };
        if !comparators.iter().all(|c| c.test(version)) {
            return false;
        }
        if !version.is_prerelease() {
            return true;
        }
        if !self.opts_into_prerelease {
            return false;
        }
        let base = version.base();
        comparators
            .iter()
            .filter(|c| c.version.is_prerelease())
            .map(|c| c.version.base())
            .any(|boundary| boundary == base || published.contains(&boundary))
    }
}

impl fmt::Display for VersionSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split on whitespace, gluing a bare operator to the version after it
/// (`>= 1.0.0` reads as `>=1.0.0`).
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending: Option<String> = None;
    for word in text.split_whitespace() {
        let word = match pending.take() {
            Some(op) => format!("{op}{word}"),
            None => word.to_string(),
        };
        if matches!(word.as_str(), ">" | ">=" | "<" | "<=" | "=" | "!=" | "^" | "~") {
            pending = Some(word);
        } else {
            tokens.push(word);
        }
    }
    if let Some(op) = pending {
        tokens.push(op);
    }
    tokens
}

fn split_operator(token: &str) -> Option<(Op, &str)> {
    for (prefix, op) in [
        (">=", Op::Ge),
        ("<=", Op::Le),
        ("!=", Op::Ne),
        (">", Op::Gt),
        ("<", Op::Lt),
        ("=", Op::Eq),
    ] {
        if let Some(rest) = token.strip_prefix(prefix) {
            return Some((op, rest));
        }
    }
    None
}

fn parse_single(token: &str, raw: &str) -> WeftResult<SpecifierKind> {
    if let Some(rest) = token.strip_prefix('^') {
        return caret(&parse_partial(rest, raw)?, raw);
    }
    if let Some(rest) = token.strip_prefix('~') {
        return tilde(&parse_partial(rest, raw)?, raw);
    }
    if let Some((op, rest)) = split_operator(token) {
        let version = parse_full(rest, raw)?;
        if op == Op::Eq {
            return Ok(SpecifierKind::ExactPin(version));
        }
        return Ok(SpecifierKind::Comparators(vec![Comparator {
            op,
            version,
            explicit: true,
        }]));
    }

    let partial = parse_partial(token, raw)?;
    if partial.wildcard {
        return wildcard(&partial, raw);
    }
    match partial.full() {
        Some(version) => Ok(SpecifierKind::ExactPin(version)),
        None => Err(invalid(raw, "incomplete version; use MAJOR.MINOR.PATCH, ^, ~ or a wildcard")),
    }
}

/// A version with possibly missing or wildcard trailing components.
#[derive(Debug)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: semver::Prerelease,
    /// An explicit `x`/`X`/`*` component was written.
    wildcard: bool,
}

impl Partial {
    fn full(&self) -> Option<SemanticVersion> {
        match (self.major, self.minor, self.patch) {
            (Some(major), Some(minor), Some(patch)) => Some(SemanticVersion::with_pre(
                major,
                minor,
                patch,
                self.pre.clone(),
            )),
            _ => None,
        }
    }
}

fn parse_partial(text: &str, raw: &str) -> WeftResult<Partial> {
    reject_v_prefix(text, raw)?;
    let text = text.split_once('+').map_or(text, |(v, _)| v);
    let (core, pre) = match text.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (text, None),
    };

    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(invalid(raw, "expected at most MAJOR.MINOR.PATCH"));
    }

    let mut numbers: [Option<u64>; 3] = [None, None, None];
    let mut wildcard = false;
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        if matches!(*part, "x" | "X" | "*") {
            wildcard = true;
            continue;
        }
        if wildcard {
            return Err(invalid(raw, "wildcards may only appear in trailing position"));
        }
        *slot = Some(parse_component(part, raw)?);
    }

    let pre = match pre {
        None => semver::Prerelease::EMPTY,
        Some(_) if wildcard || parts.len() < 3 => {
            return Err(invalid(raw, "pre-release tags need a full MAJOR.MINOR.PATCH version"))
        }
        Some(pre) => semver::Prerelease::new(pre)
            .map_err(|e| invalid(raw, &format!("bad pre-release `{pre}` ({e})")))?,
    };

    Ok(Partial {
        major: numbers[0],
        minor: numbers[1],
        patch: numbers[2],
        pre,
        wildcard,
    })
}

fn parse_component(part: &str, raw: &str) -> WeftResult<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(raw, &format!("`{part}` is not a version number")));
    }
    if part.len() > 1 && part.starts_with('0') {
        return Err(invalid(raw, &format!("`{part}` has a leading zero")));
    }
    part.parse()
        .map_err(|_| invalid(raw, &format!("`{part}` is too large")))
}

fn parse_full(text: &str, raw: &str) -> WeftResult<SemanticVersion> {
    reject_v_prefix(text, raw)?;
    let partial = parse_partial(text, raw)?;
    if partial.wildcard {
        return Err(invalid(raw, "wildcards are not allowed after an operator"));
    }
    partial
        .full()
        .ok_or_else(|| invalid(raw, "comparators need a full MAJOR.MINOR.PATCH version"))
}

fn reject_v_prefix(text: &str, raw: &str) -> WeftResult<()> {
    if text.starts_with('v') || text.starts_with('V') {
        return Err(invalid(raw, "`v`-prefixed versions are not supported"));
    }
    Ok(())
}

fn bump(n: u64, raw: &str) -> WeftResult<u64> {
    n.checked_add(1)
        .ok_or_else(|| invalid(raw, "version component overflow"))
}

fn range(lower: SemanticVersion, upper: SemanticVersion) -> SpecifierKind {
    SpecifierKind::Comparators(vec![
        Comparator::derived(Op::Ge, lower),
        Comparator::derived(Op::Lt, upper),
    ])
}

fn any_stable() -> SpecifierKind {
    SpecifierKind::Comparators(vec![Comparator::derived(
        Op::Ge,
        SemanticVersion::new(0, 0, 0),
    )])
}

fn caret(p: &Partial, raw: &str) -> WeftResult<SpecifierKind> {
    let major = p.major.ok_or_else(|| invalid(raw, "`^` needs a major version"))?;
    let lower = SemanticVersion::with_pre(
        major,
        p.minor.unwrap_or(0),
        p.patch.unwrap_or(0),
        p.pre.clone(),
    );
    let upper = match (major, p.minor, p.patch) {
        (0, Some(0), Some(patch)) => SemanticVersion::new(0, 0, bump(patch, raw)?),
        (0, Some(minor), _) => SemanticVersion::new(0, bump(minor, raw)?, 0),
        (major, _, _) => SemanticVersion::new(bump(major, raw)?, 0, 0),
    };
    Ok(range(lower, upper))
}

fn tilde(p: &Partial, raw: &str) -> WeftResult<SpecifierKind> {
    let major = p.major.ok_or_else(|| invalid(raw, "`~` needs a major version"))?;
    let lower = SemanticVersion::with_pre(
        major,
        p.minor.unwrap_or(0),
        p.patch.unwrap_or(0),
        p.pre.clone(),
    );
    let upper = match p.minor {
        Some(minor) => SemanticVersion::new(major, bump(minor, raw)?, 0),
        None => SemanticVersion::new(bump(major, raw)?, 0, 0),
    };
    Ok(range(lower, upper))
}

fn wildcard(p: &Partial, raw: &str) -> WeftResult<SpecifierKind> {
    Ok(match (p.major, p.minor) {
        (None, _) => any_stable(),
        (Some(major), None) => range(
            SemanticVersion::new(major, 0, 0),
            SemanticVersion::new(bump(major, raw)?, 0, 0),
        ),
        (Some(major), Some(minor)) => range(
            SemanticVersion::new(major, minor, 0),
            SemanticVersion::new(major, bump(minor, raw)?, 0),
        ),
    })
}

fn invalid(raw: &str, reason: &str) -> WeftError {
    WeftError::InvalidSpecifier {
        specifier: raw.trim().to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        SemanticVersion::parse(s).unwrap()
    }

    fn spec(s: &str) -> VersionSpecifier {
        VersionSpecifier::parse(s).unwrap()
    }

    #[test]
    fn prerelease_ordering() {
        assert!(v("1.0.0-alpha") < v("1.0.0-alpha.1"));
        assert!(v("1.0.0-alpha.1") < v("1.0.0-alpha.beta"));
        assert!(v("1.0.0-beta.2") < v("1.0.0-beta.11"));
        assert!(v("1.0.0-rc.1") < v("1.0.0"));
    }

    #[test]
    fn build_metadata_is_ignored() {
        assert_eq!(v("1.2.3+build.7"), v("1.2.3"));
    }

    #[test]
    fn exact_forms() {
        assert_eq!(spec("1.2.3").exact_pin(), Some(&v("1.2.3")));
        assert_eq!(spec("=1.2.3").exact_pin(), Some(&v("1.2.3")));
        assert_eq!(spec(" = 1.2.3 ").exact_pin(), Some(&v("1.2.3")));
    }

    #[test]
    fn rejected_forms() {
        for bad in [
            "", "v1.2.3", "^v1.0.0", ">=V1.0.0", "latest", "1.2", "1", ">=1.0", "1.x.3",
            "x.1.0", "1.2.3.4", "^1.2-beta", "01.2.3", "1.2.3 2.0.0", ">=1.x",
        ] {
            assert!(
                matches!(
                    VersionSpecifier::parse(bad),
                    Err(WeftError::InvalidSpecifier { .. })
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn operator_tokens_merge_with_versions() {
        let s = spec(">= 1.0.0 < 2.0.0");
        assert!(s.matches(&v("1.5.0")));
        assert!(!s.matches(&v("2.0.0")));
    }

    #[test]
    fn caret_partial_forms() {
        assert!(spec("^1.2").matches(&v("1.9.0")));
        assert!(!spec("^1.2").matches(&v("2.0.0")));
        assert!(spec("^0.2").matches(&v("0.2.9")));
        assert!(!spec("^0.2").matches(&v("0.3.0")));
        assert!(spec("^1").matches(&v("1.0.0")));
    }

    #[test]
    fn wildcard_forms() {
        assert!(spec("1.x").matches(&v("1.99.0")));
        assert!(!spec("1.x").matches(&v("2.0.0")));
        assert!(spec("1.2.x").matches(&v("1.2.7")));
        assert!(!spec("1.2.*").matches(&v("1.3.0")));
        assert!(spec("x.x.x").matches(&v("42.0.0")));
    }

    #[test]
    fn bare_star_means_any_stable() {
        let any = spec("*");
        assert!(any.matches(&v("0.0.1")));
        assert!(any.matches(&v("10.2.3")));
        assert!(!any.matches(&v("1.0.0-beta")));
        assert!(!any.opts_into_prerelease());
    }

    #[test]
    fn not_equal_excludes() {
        let s = spec(">=1.0.0 !=1.4.0");
        assert!(s.matches(&v("1.3.0")));
        assert!(!s.matches(&v("1.4.0")));
    }

    #[test]
    fn prerelease_needs_opt_in() {
        assert!(!spec("^1.0.0").matches(&v("1.1.0-beta")));
        assert!(spec("=1.1.0-beta").matches(&v("1.1.0-beta")));
        assert!(spec("1.1.0-beta").opts_into_prerelease());
    }

    #[test]
    fn prerelease_scoped_to_boundary_base() {
        let s = spec(">=2.1.1-alpha.1");
        assert!(s.opts_into_prerelease());
        assert!(s.matches(&v("2.1.1-alpha.2")));
        assert!(s.matches(&v("2.1.1")));
        assert!(s.matches(&v("3.0.0")));
        assert!(!s.matches(&v("2.2.0-beta")));
        assert!(!s.matches(&v("2.1.1-alpha.0")));
    }

    #[test]
    fn scoping_lifts_once_stable_base_is_published() {
        let s = spec(">=2.0.0-alpha");
        assert!(!s.matches(&v("3.0.0-rc.1")));
        assert!(s.matches_in(&v("3.0.0-rc.1"), &[v("2.0.0")]));
    }

    #[test]
    fn explicit_lower_bounds_skip_desugared_ones() {
        assert_eq!(
            spec(">=1.0.0 <2.0.0").explicit_lower_bounds().collect::<Vec<_>>(),
            vec![&v("1.0.0")]
        );
        assert_eq!(spec("^1.0.0").explicit_lower_bounds().count(), 0);
        assert_eq!(spec("1.0.0").explicit_lower_bounds().count(), 0);
    }
}
