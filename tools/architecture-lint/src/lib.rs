//! Architecture lint for the `story-sync` crate.
//!
//! Every file under `story-sync/src` is assigned a [`Zone`]. The lint parses
//! each file, resolves the paths it names, and checks three rules:
//!
//! - dependency direction: a zone may only name the zones
//!   [`Zone::may_depend_on`] allows; `test_support` is reachable from test
//!   code alone
//! - crate ownership: storage, HTTP, CLI, and process-setup crates belong
//!   to the zone that owns that concern ([`Zone::forbidden_crates`])
//! - port placement: traits with async methods are ports and live under
//!   `domain::ports`
//!
//! Run with `cargo run -p architecture-lint [path/to/story-sync]`.

use std::fmt;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};

mod scan;
mod walk;
mod zone;

pub use zone::Zone;

use scan::{Reference, Target};

/// Name the linted crate is imported under from its binary and tests.
pub const CRATE_NAME: &str = "story_sync";

/// Which rule a [`Violation`] broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rule {
    /// A zone named a module it must not depend on.
    Dependency,
    /// A zone named an external crate owned by another zone.
    CrateOwnership,
    /// An async trait was declared outside `domain::ports`.
    PortPlacement,
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Violation {
    /// File path relative to `story-sync/src`.
    pub file: Utf8PathBuf,
    /// Rule that was broken.
    pub rule: Rule,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.message)
    }
}

/// A Rust source file to be linted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintSource {
    /// Path relative to `story-sync/src`.
    pub file: Utf8PathBuf,
    /// Rust source text.
    pub contents: String,
}

/// Failure modes returned by the architecture lint.
#[derive(Debug)]
pub enum ArchitectureLintError {
    /// Reading the source tree failed.
    Io { path: Utf8PathBuf, source: io::Error },
    /// A directory entry name is not UTF-8.
    NonUtf8Name { parent: Utf8PathBuf, name: String },
    /// A file does not parse as Rust.
    Parse { file: Utf8PathBuf, message: String },
    /// A file sits outside every known zone.
    UnknownZone { file: Utf8PathBuf },
    /// One or more rules were broken.
    Violations(Vec<Violation>),
}

impl ArchitectureLintError {
    pub(crate) fn io(path: &Utf8Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for ArchitectureLintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {path}: {source}"),
            Self::NonUtf8Name { parent, name } => {
                write!(f, "non-UTF-8 entry `{name}` under {parent}")
            }
            Self::Parse { file, message } => write!(f, "cannot parse {file}: {message}"),
            Self::UnknownZone { file } => write!(
                f,
                "{file} is outside domain, inbound, outbound, composition, and test support"
            ),
            Self::Violations(violations) => {
                writeln!(f, "{} architecture violation(s):", violations.len())?;
                for violation in violations {
                    writeln!(f, "  {violation}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ArchitectureLintError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Lint the crate rooted at `crate_dir`; returns the number of files checked.
pub fn lint_crate_sources(crate_dir: &Utf8Path) -> Result<usize, ArchitectureLintError> {
    let sources = walk::collect_sources(&crate_dir.join("src"))?;
    lint_sources(&sources)?;
    Ok(sources.len())
}

/// Lint in-memory sources. Paths are relative to `src/`.
pub fn lint_sources(sources: &[LintSource]) -> Result<(), ArchitectureLintError> {
    let mut violations = Vec::new();
    for source in sources {
        let zone = Zone::of_file(&source.file).ok_or_else(|| ArchitectureLintError::UnknownZone {
            file: source.file.clone(),
        })?;
        let parsed =
            syn::parse_file(&source.contents).map_err(|err| ArchitectureLintError::Parse {
                file: source.file.clone(),
                message: err.to_string(),
            })?;
        let scan = scan::scan_file(&source.file, &parsed);
        violations.extend(check_file(&source.file, zone, &scan));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        violations.sort();
        violations.dedup();
        Err(ArchitectureLintError::Violations(violations))
    }
}

fn check_file(file: &Utf8Path, zone: Zone, scan: &scan::FileScan) -> Vec<Violation> {
    let violation = |rule, message| Violation {
        file: file.to_path_buf(),
        rule,
        message,
    };
    let mut found: Vec<Violation> = scan
        .references
        .iter()
        .filter_map(|reference| {
            let (rule, message) = check_reference(zone, reference)?;
            Some(violation(rule, message))
        })
        .collect();

    if zone != Zone::Ports {
        found.extend(scan.async_traits.iter().map(|name| {
            violation(
                Rule::PortPlacement,
                format!("async trait `{name}` must be declared under domain::ports"),
            )
        }));
    }
    found
}

fn check_reference(zone: Zone, reference: &Reference) -> Option<(Rule, String)> {
    match &reference.target {
        Target::Internal(segments) => {
            let target = Zone::of_module(segments)?;
            let allowed = zone.may_depend_on(target)
                || (reference.in_test && target == Zone::TestSupport);
            if allowed {
                return None;
            }
            let message = if target == Zone::TestSupport {
                format!("{zone} may use test support only from #[cfg(test)] code")
            } else {
                format!("{zone} must not depend on {target} (crate::{})", segments.join("::"))
            };
            Some((Rule::Dependency, message))
        }
        Target::External(root) => zone
            .forbidden_crates()
            .contains(&root.as_str())
            .then(|| (Rule::CrateOwnership, format!("{zone} must not use the `{root}` crate"))),
    }
}
