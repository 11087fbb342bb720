use std::path::PathBuf;

use serde::Serialize;

use crate::trust::{TrustClassification, TrustStore};
use crate::workspace::paths::dedup_preserving_order;

/// Result of classifying a batch of paths. The three buckets partition the
/// deduplicated input and keep its order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub trusted: Vec<PathBuf>,
    pub untrusted: Vec<PathBuf>,
    pub unknown: Vec<PathBuf>,
    /// Set once when the trust store could not be read.
    pub warning: Option<String>,
}

impl Classification {
    fn push(&mut self, path: PathBuf, class: TrustClassification) {
        match class {
            TrustClassification::Trusted => self.trusted.push(path),
            TrustClassification::Untrusted => self.untrusted.push(path),
            TrustClassification::Unknown => self.unknown.push(path),
        }
    }
}

/// Sorts candidate directories into trusted, untrusted and unknown.
#[derive(Clone)]
pub struct TrustResolver {
    store: TrustStore,
}

impl TrustResolver {
    pub fn new(store: TrustStore) -> Self {
        Self { store }
    }

    /// Classify `paths` (already normalized). Never fails.
    ///
    /// Gating only applies inside a trusted workspace; with gating off or an
    /// untrusted workspace every path is trusted outright.
    pub fn classify(
        &self,
        paths: &[PathBuf],
        gating_enabled: bool,
        workspace_trusted: bool,
    ) -> Classification {
        let paths = dedup_preserving_order(paths.to_vec());
        let mut out = Classification::default();

        if !gating_enabled || !workspace_trusted {
            out.trusted = paths;
            return out;
        }

        let rules = match self.store.load_rules() {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!("trust store unreadable, treating all paths as unknown: {}", e);
                out.unknown = paths;
                out.warning = Some(format!(
                    "Could not read trusted folders ({}); all directories need confirmation.",
                    e
                ));
                return out;
            }
        };

        for path in paths {
            let class = rules.classify(&path);
            tracing::debug!("trust: {} is {}", path.display(), class);
            out.push(path, class);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::TrustLevel;
    use std::path::Path;
    use tempfile::TempDir;

    fn resolver(tmp: &TempDir) -> (TrustResolver, TrustStore) {
        let store = TrustStore::open(tmp.path().join("trusted_folders.json"));
        (TrustResolver::new(store.clone()), store)
    }

    #[test]
    fn test_gating_disabled_trusts_everything() {
        let tmp = TempDir::new().unwrap();
        let (resolver, store) = resolver(&tmp);
        store.set(Path::new("/bad"), TrustLevel::DoNotTrust).unwrap();

        let input = vec![PathBuf::from("/bad"), PathBuf::from("/new")];
        let c = resolver.classify(&input, false, true);
        assert_eq!(c.trusted, input);
        assert!(c.untrusted.is_empty() && c.unknown.is_empty());

        let c = resolver.classify(&input, true, false);
        assert_eq!(c.trusted, input);
    }

    #[test]
    fn test_dedups_before_classifying() {
        let tmp = TempDir::new().unwrap();
        let (resolver, _store) = resolver(&tmp);
        let input = vec![
            PathBuf::from("/u"),
            PathBuf::from("/v"),
            PathBuf::from("/u"),
        ];
        let c = resolver.classify(&input, true, true);
        assert_eq!(c.unknown, vec![PathBuf::from("/u"), PathBuf::from("/v")]);
    }

    #[test]
    fn test_unreadable_store_is_all_unknown_with_one_warning() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("trusted_folders.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let resolver = TrustResolver::new(TrustStore::open(path));

        let input = vec![PathBuf::from("/a"), PathBuf::from("/b")];
        let c = resolver.classify(&input, true, true);
        assert_eq!(c.unknown, input);
        assert!(c.trusted.is_empty() && c.untrusted.is_empty());
        assert!(c.warning.is_some());
    }
}
