pub mod resolver;
pub mod store;

pub use resolver::{Classification, TrustResolver};
pub use store::{JsonTrustFile, TrustBackend, TrustStore};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GatehouseError;

/// A persisted trust decision for one path. Absence of a record means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    /// The folder and everything beneath it is trusted.
    TrustFolder,
    /// The folder's parent, and so all of its siblings, is trusted.
    TrustParent,
    /// The folder is explicitly untrusted.
    DoNotTrust,
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrustLevel::TrustFolder => write!(f, "TRUST_FOLDER"),
            TrustLevel::TrustParent => write!(f, "TRUST_PARENT"),
            TrustLevel::DoNotTrust => write!(f, "DO_NOT_TRUST"),
        }
    }
}

impl std::str::FromStr for TrustLevel {
    type Err = GatehouseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "trust_folder" => Ok(TrustLevel::TrustFolder),
            "trust_parent" => Ok(TrustLevel::TrustParent),
            "do_not_trust" => Ok(TrustLevel::DoNotTrust),
            _ => Err(GatehouseError::InvalidTrustLevel {
                value: s.to_string(),
            }),
        }
    }
}

/// Derived trust state of a path. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustClassification {
    Trusted,
    Untrusted,
    Unknown,
}

impl std::fmt::Display for TrustClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrustClassification::Trusted => write!(f, "trusted"),
            TrustClassification::Untrusted => write!(f, "untrusted"),
            TrustClassification::Unknown => write!(f, "unknown"),
        }
    }
}

/// On-disk shape: normalized path string -> level.
pub type TrustMap = BTreeMap<String, TrustLevel>;

/// A point-in-time view of the trust store, ready for lookups.
#[derive(Debug, Clone, Default)]
pub struct TrustRules {
    levels: BTreeMap<PathBuf, TrustLevel>,
}

impl From<&TrustMap> for TrustRules {
    fn from(map: &TrustMap) -> Self {
        Self {
            levels: map
                .iter()
                .map(|(path, level)| (PathBuf::from(path), *level))
                .collect(),
        }
    }
}

impl TrustRules {
    /// The level recorded for exactly this path, if any.
    pub fn level_of(&self, path: &Path) -> Option<TrustLevel> {
        self.levels.get(path).copied()
    }

    /// Classify a normalized path.
    ///
    /// An explicit record on the path itself decides. Otherwise an ancestor
    /// `DO_NOT_TRUST` wins over any ancestor trust. Otherwise the path is
    /// trusted when it lies under a `TRUST_FOLDER` record or under the parent of
    /// a `TRUST_PARENT` record.
    pub fn classify(&self, path: &Path) -> TrustClassification {
        if let Some(level) = self.level_of(path) {
            return match level {
                TrustLevel::DoNotTrust => TrustClassification::Untrusted,
                TrustLevel::TrustFolder | TrustLevel::TrustParent => TrustClassification::Trusted,
            };
        }

        let distrusted = self
            .levels
            .iter()
            .any(|(rule, level)| *level == TrustLevel::DoNotTrust && path.starts_with(rule));
        if distrusted {
            return TrustClassification::Untrusted;
        }

        let trusted = self.levels.iter().any(|(rule, level)| match level {
            TrustLevel::TrustFolder => path.starts_with(rule),
            TrustLevel::TrustParent => rule.parent().is_some_and(|p| path.starts_with(p)),
            TrustLevel::DoNotTrust => false,
        });
        if trusted {
            TrustClassification::Trusted
        } else {
            TrustClassification::Unknown
        }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, TrustLevel)> {
        self.levels.iter().map(|(p, l)| (p.as_path(), *l))
    }
}
