//! Import classification
//!
//! Decides whether an import identifier names a standard-library module, a
//! known third-party distribution, or something the tables do not cover.
//!
//! Lookup order is fixed: stdlib, then the alias table, then unknown. When
//! the caller supplies the project's [`LocalModules`], sibling files shadow
//! third-party names (but not stdlib modules).

use crate::project::LocalModules;
use crate::tables;
use serde::{Deserialize, Serialize};

/// Result of classifying a single import identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "package", rename_all = "snake_case")]
pub enum ImportClass {
    /// Python standard library
    Stdlib,
    /// Known third-party distribution (canonical installable name)
    ThirdParty(String),
    /// Not in any table
    Unknown,
}

impl ImportClass {
    /// Canonical package name used for manifest lookups
    ///
    /// Unknown identifiers are assumed to be their own package name.
    #[must_use]
    pub fn canonical_name<'a>(&'a self, identifier: &'a str) -> Option<&'a str> {
        match self {
            Self::Stdlib => None,
            Self::ThirdParty(package) => Some(package),
            Self::Unknown => Some(identifier),
        }
    }

    /// True for standard-library modules
    #[inline]
    #[must_use]
    pub fn is_stdlib(&self) -> bool {
        matches!(self, Self::Stdlib)
    }
}

/// Classification with project context applied
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// Python standard library
    Stdlib,
    /// Provided by a delivered sibling file
    Local,
    /// Known third-party distribution
    ThirdParty(String),
    /// Not in any table and not delivered; assumed to be a local module
    Unknown,
}

/// Stateless classifier over the static tables
///
/// Cheap to copy; the tables are shared read-only statics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportClassifier;

impl ImportClassifier {
    /// Create classifier
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Version of the alias table in use
    #[inline]
    #[must_use]
    pub fn table_version(&self) -> u32 {
        tables::ALIAS_TABLE_VERSION
    }

    /// Classify an identifier without project context
    #[must_use]
    pub fn classify(&self, identifier: &str) -> ImportClass {
        let root = root_segment(identifier);
        if tables::is_stdlib(root) {
            ImportClass::Stdlib
        } else if let Some(package) = tables::alias_for(root) {
            ImportClass::ThirdParty(package.to_string())
        } else {
            ImportClass::Unknown
        }
    }

    /// Classify an identifier against the delivered project
    #[must_use]
    pub fn resolve(&self, identifier: &str, local: &LocalModules) -> Resolution {
        let root = root_segment(identifier);
        match self.classify(root) {
            ImportClass::Stdlib => Resolution::Stdlib,
            _ if local.contains(root) => Resolution::Local,
            ImportClass::ThirdParty(package) => Resolution::ThirdParty(package),
            ImportClass::Unknown => Resolution::Unknown,
        }
    }
}

/// Top-level module segment of a dotted identifier
#[inline]
#[must_use]
pub fn root_segment(identifier: &str) -> &str {
    identifier
        .trim()
        .trim_start_matches('.')
        .split('.')
        .next()
        .unwrap_or_default()
}
