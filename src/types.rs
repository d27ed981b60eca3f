//! Domain types for appseek.
//!
//! Newtypes and records shared by the indexer, the cache and the
//! search path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Storage identifier for an indexed application.
///
/// Assigned by the storage layer on first insert and stable across
/// re-indexing of the same dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub i64);

impl AppId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.0;
        write!(f, "app:{id}")
    }
}

impl From<i64> for AppId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Where an application record was discovered.
///
/// Declaration order is the indexing priority: when two sources yield
/// the same dedup key, the earlier variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppSource {
    /// Start-menu / desktop shortcut.
    Shortcut,
    /// Packaged or store-managed application.
    Packaged,
    /// Uninstall / registry entry.
    Registry,
    /// Found by walking program directories.
    Filesystem,
}

impl AppSource {
    /// All sources in indexing priority order.
    pub const ALL: [Self; 4] = [Self::Shortcut, Self::Packaged, Self::Registry, Self::Filesystem];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shortcut => "shortcut",
            Self::Packaged => "packaged",
            Self::Registry => "registry",
            Self::Filesystem => "filesystem",
        }
    }

    /// Lower is scanned first.
    #[must_use]
    pub const fn priority(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for AppSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shortcut" => Ok(Self::Shortcut),
            "packaged" => Ok(Self::Packaged),
            "registry" => Ok(Self::Registry),
            "filesystem" => Ok(Self::Filesystem),
            other => Err(format!("Unknown app source: {other}")),
        }
    }
}

/// How a query matched a candidate name.
///
/// Ordered by desirability: `Exact` is the greatest, `None` the least.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    None,
    Fuzzy,
    Substring,
    Prefix,
    Exact,
}

impl MatchKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fuzzy => "fuzzy",
            Self::Substring => "substring",
            Self::Prefix => "prefix",
            Self::Exact => "exact",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A launchable application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// `None` until the record has been stored.
    pub id: Option<AppId>,
    /// Display name.
    pub name: String,
    /// Executable path or platform launch token.
    pub executable: String,
    pub arguments: Option<String>,
    pub working_directory: Option<String>,
    pub icon: Option<String>,
    pub source: AppSource,
    pub package_family: Option<String>,
    /// Stamped by the indexer when the record enters a batch.
    pub last_indexed: Option<DateTime<Utc>>,
}

impl ApplicationRecord {
    /// Creates an unstored record with only the required fields set.
    pub fn new(name: impl Into<String>, executable: impl Into<String>, source: AppSource) -> Self {
        Self {
            id: None,
            name: name.into(),
            executable: executable.into(),
            arguments: None,
            working_directory: None,
            icon: None,
            source,
            package_family: None,
            last_indexed: None,
        }
    }

    #[must_use]
    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }

    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn with_package_family(mut self, family: impl Into<String>) -> Self {
        self.package_family = Some(family.into());
        self
    }

    /// Identity used to merge records across sources and runs.
    #[must_use]
    pub fn dedup_key(&self) -> DedupKey {
        match self.source {
            AppSource::Packaged => DedupKey::Packaged {
                name: self.name.clone(),
            },
            AppSource::Shortcut | AppSource::Registry | AppSource::Filesystem => DedupKey::Path {
                executable: self.executable.clone(),
                arguments: self.arguments.clone().filter(|a| !a.is_empty()),
            },
        }
    }
}

/// Dedup identity of an application.
///
/// Path-based sources merge on the executable/arguments pair. Packaged
/// apps merge on their name, since their launch token is not a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Path {
        executable: String,
        arguments: Option<String>,
    },
    Packaged {
        name: String,
    },
}

impl DedupKey {
    /// Flat string form used as the storage uniqueness column.
    ///
    /// `\u{1f}` (unit separator) never appears in paths or arguments.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Path {
                executable,
                arguments,
            } => format!(
                "path\u{1f}{executable}\u{1f}{}",
                arguments.as_deref().unwrap_or("")
            ),
            Self::Packaged { name } => format!("packaged\u{1f}{name}"),
        }
    }
}

/// An application plus its search tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub app: ApplicationRecord,
    /// Lowercase, deduplicated tokens from the name and executable stem.
    pub tokens: BTreeSet<String>,
}

impl IndexedEntry {
    #[must_use]
    pub fn new(app: ApplicationRecord, tokens: BTreeSet<String>) -> Self {
        Self { app, tokens }
    }

    /// True if any token starts with `prefix` (already lowercased).
    #[must_use]
    pub fn has_token_prefix(&self, prefix: &str) -> bool {
        self.tokens.iter().any(|t| t.starts_with(prefix))
    }
}

// Compile-time assertions for thread safety.
// These ensure Send+Sync remain implemented and catch regressions.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<AppId>();
    assert_send_sync::<ApplicationRecord>();
    assert_send_sync::<IndexedEntry>();
    assert_send_sync::<DedupKey>();
};
