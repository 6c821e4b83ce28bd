//! Zones of the `story-sync` source tree and the edges allowed between them.

use std::fmt;

use camino::{Utf8Component, Utf8Path};

/// Part of the crate a source file or module path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Zone {
    /// `domain/**` outside `domain/ports`.
    Domain,
    /// `domain/ports/**`: the traits adapters implement.
    Ports,
    /// `inbound/**`: the command-line surface.
    Inbound,
    /// `outbound/**`: SQLite, in-memory, and HTTP adapters.
    Outbound,
    /// `lib.rs`, `main.rs`, `bootstrap`, and `config`.
    Composition,
    /// `test_support`: doubles shared by unit and integration tests.
    TestSupport,
}

impl Zone {
    /// Zone of a file given its path relative to `src/`.
    pub fn of_file(relative: &Utf8Path) -> Option<Self> {
        let parts: Vec<&str> = relative
            .components()
            .filter_map(|component| match component {
                Utf8Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect();
        match parts.as_slice() {
            ["domain", "ports" | "ports.rs", ..] => Some(Self::Ports),
            ["domain", _, ..] => Some(Self::Domain),
            ["inbound", _, ..] => Some(Self::Inbound),
            ["outbound", _, ..] => Some(Self::Outbound),
            ["lib.rs" | "main.rs" | "bootstrap.rs" | "config.rs"] => Some(Self::Composition),
            ["bootstrap" | "config", _, ..] => Some(Self::Composition),
            ["test_support.rs"] | ["test_support", _, ..] => Some(Self::TestSupport),
            _ => None,
        }
    }

    /// Zone owning a module path already resolved against the crate root.
    pub fn of_module(segments: &[String]) -> Option<Self> {
        let first = segments.first()?.as_str();
        let second = segments.get(1).map(String::as_str);
        match (first, second) {
            ("domain", Some("ports")) => Some(Self::Ports),
            ("domain", _) => Some(Self::Domain),
            ("inbound", _) => Some(Self::Inbound),
            ("outbound", _) => Some(Self::Outbound),
            ("bootstrap" | "config", _) => Some(Self::Composition),
            ("test_support", _) => Some(Self::TestSupport),
            _ => None,
        }
    }

    /// Whether production code in `self` may refer to `target`.
    ///
    /// Test code may additionally reach [`Zone::TestSupport`].
    pub fn may_depend_on(self, target: Self) -> bool {
        use Zone::{Composition, Domain, Inbound, Outbound, Ports, TestSupport};
        if self == target {
            return true;
        }
        matches!(
            (self, target),
            (Domain, Ports)
                | (Ports, Domain)
                | (Inbound, Domain | Ports | Composition)
                | (Outbound, Domain | Ports)
                | (Composition, Domain | Ports | Inbound | Outbound)
                | (TestSupport, Domain | Ports)
        )
    }

    /// External crates production and test code in this zone must not name.
    pub fn forbidden_crates(self) -> &'static [&'static str] {
        match self {
            Self::Domain | Self::Ports => &[
                "cap_std",
                "clap",
                "color_eyre",
                "diesel",
                "diesel_async",
                "diesel_migrations",
                "libsqlite3_sys",
                "ortho_config",
                "reqwest",
                "tracing_subscriber",
            ],
            Self::Inbound => &[
                "color_eyre",
                "diesel",
                "diesel_async",
                "diesel_migrations",
                "libsqlite3_sys",
                "reqwest",
                "tracing_subscriber",
            ],
            Self::Outbound => &[
                "cap_std",
                "clap",
                "color_eyre",
                "ortho_config",
                "tracing_subscriber",
            ],
            Self::Composition | Self::TestSupport => &[],
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Domain => "domain",
            Self::Ports => "domain ports",
            Self::Inbound => "inbound adapters",
            Self::Outbound => "outbound adapters",
            Self::Composition => "composition root",
            Self::TestSupport => "test support",
        })
    }
}
