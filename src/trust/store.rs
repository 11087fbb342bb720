use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{GatehouseError, Result};
use crate::trust::{TrustClassification, TrustLevel, TrustMap, TrustRules};

/// Persistence for the trust map. Every call reads or writes the backing
/// medium; nothing is cached between calls.
pub trait TrustBackend: Send + Sync {
    fn load(&self) -> Result<TrustMap>;

    fn save(&self, map: &TrustMap) -> Result<()>;

    /// Load, apply `edit`, save. Backends that can lock should override this
    /// so concurrent processes don't interleave a read-modify-write.
    fn update(&self, edit: &mut dyn FnMut(&mut TrustMap)) -> Result<()> {
        let mut map = self.load()?;
        edit(&mut map);
        self.save(&map)
    }
}

/// `trusted_folders.json`: a JSON object of normalized path -> level.
pub struct JsonTrustFile {
    path: PathBuf,
}

impl JsonTrustFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Result<TrustMap> {
        if !path.exists() {
            return Ok(TrustMap::new());
        }
        let contents = fs::read_to_string(path).map_err(|e| GatehouseError::Storage {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        if contents.trim().is_empty() {
            return Ok(TrustMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| GatehouseError::Storage {
            reason: format!("corrupt trust file {}: {}", path.display(), e),
        })
    }

    fn write(path: &Path, map: &TrustMap) -> Result<()> {
        let json = serde_json::to_string_pretty(map)?;
        let tmp_path = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        set_file_permissions_0600(&tmp_path);
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

impl TrustBackend for JsonTrustFile {
    fn load(&self) -> Result<TrustMap> {
        Self::read(&self.path)
    }

    fn save(&self, map: &TrustMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let _lock = FileLock::acquire(&self.path)?;
        Self::write(&self.path, map)
    }

    fn update(&self, edit: &mut dyn FnMut(&mut TrustMap)) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let _lock = FileLock::acquire(&self.path)?;
        let mut map = Self::read(&self.path)?;
        edit(&mut map);
        Self::write(&self.path, &map)
    }
}

/// Lookup and update of persisted trust levels.
#[derive(Clone)]
pub struct TrustStore {
    backend: Arc<dyn TrustBackend>,
}

impl TrustStore {
    pub fn new(backend: Arc<dyn TrustBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by a JSON file at `path`.
    pub fn open(path: PathBuf) -> Self {
        Self::new(Arc::new(JsonTrustFile::new(path)))
    }

    /// Fresh snapshot of all rules.
    pub fn load_rules(&self) -> Result<TrustRules> {
        let map = self.backend.load()?;
        Ok(TrustRules::from(&map))
    }

    /// Record `level` for `path`. Last writer wins.
    pub fn set(&self, path: &Path, level: TrustLevel) -> Result<()> {
        let key = path_key(path)?;
        self.backend.update(&mut |map| {
            map.insert(key.clone(), level);
        })?;
        tracing::info!("trust: {} -> {}", path.display(), level);
        Ok(())
    }

    /// Remove any record for `path`. Returns whether one existed.
    pub fn unset(&self, path: &Path) -> Result<bool> {
        let key = path_key(path)?;
        let mut removed = false;
        self.backend.update(&mut |map| {
            removed = map.remove(&key).is_some();
        })?;
        if removed {
            tracing::info!("trust: {} -> unset", path.display());
        }
        Ok(removed)
    }

    /// Whether the workspace rooted at `root` is trusted: `Some(true)` or
    /// `Some(false)` when the store decides, `None` when it has no opinion or
    /// cannot be read.
    pub fn is_workspace_trusted(&self, root: &Path) -> Option<bool> {
        match self.load_rules() {
            Ok(rules) => match rules.classify(root) {
                TrustClassification::Trusted => Some(true),
                TrustClassification::Untrusted => Some(false),
                TrustClassification::Unknown => None,
            },
            Err(e) => {
                tracing::warn!("trust store unreadable, workspace trust undetermined: {}", e);
                None
            }
        }
    }
}

fn path_key(path: &Path) -> Result<String> {
    path.to_str()
        .map(String::from)
        .ok_or_else(|| GatehouseError::Storage {
            reason: format!("path is not valid UTF-8: {}", path.display()),
        })
}

/// Set file permissions to 0600 (owner read/write only).
#[cfg(unix)]
fn set_file_permissions_0600(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(0o600);
    let _ = fs::set_permissions(path, perms);
}

#[cfg(not(unix))]
fn set_file_permissions_0600(_path: &Path) {}

/// Advisory file lock using flock(2) on a .lock file.
struct FileLock {
    _file: fs::File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        flock_exclusive(&file)?;
        Ok(Self { _file: file })
    }
}

// Dropping the FileLock closes the file, which releases the lock.

#[cfg(unix)]
fn flock_exclusive(file: &fs::File) -> Result<()> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    let ret = unsafe { libc::flock(fd, libc::LOCK_EX) };
    if ret != 0 {
        return Err(GatehouseError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn flock_exclusive(_file: &fs::File) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_and_reload() {
        let tmp = TempDir::new().unwrap();
        let store = TrustStore::open(tmp.path().join("cfg/trusted_folders.json"));

        store.set(Path::new("/work/app"), TrustLevel::TrustFolder).unwrap();
        store.set(Path::new("/work/tmp"), TrustLevel::DoNotTrust).unwrap();
        store.set(Path::new("/work/app"), TrustLevel::TrustParent).unwrap();

        let rules = store.load_rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules.level_of(Path::new("/work/app")),
            Some(TrustLevel::TrustParent)
        );
    }

    #[test]
    fn test_unset() {
        let tmp = TempDir::new().unwrap();
        let store = TrustStore::open(tmp.path().join("trusted_folders.json"));
        store.set(Path::new("/x"), TrustLevel::TrustFolder).unwrap();

        assert!(store.unset(Path::new("/x")).unwrap());
        assert!(!store.unset(Path::new("/x")).unwrap());
        assert!(store.load_rules().unwrap().is_empty());
    }

    #[test]
    fn test_missing_and_empty_files_are_empty_maps() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("trusted_folders.json");
        let file = JsonTrustFile::new(path.clone());
        assert!(file.load().unwrap().is_empty());

        fs::write(&path, "   \n").unwrap();
        assert!(file.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("trusted_folders.json");
        fs::write(&path, "{ not json").unwrap();

        let store = TrustStore::open(path);
        assert!(matches!(
            store.load_rules(),
            Err(GatehouseError::Storage { .. })
        ));
        assert_eq!(store.is_workspace_trusted(Path::new("/any")), None);
    }

    #[test]
    fn test_on_disk_format() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("trusted_folders.json");
        let store = TrustStore::open(path.clone());
        store.set(Path::new("/repo"), TrustLevel::TrustFolder).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["/repo"], "TRUST_FOLDER");
    }

    #[test]
    fn test_is_workspace_trusted() {
        let tmp = TempDir::new().unwrap();
        let store = TrustStore::open(tmp.path().join("trusted_folders.json"));
        assert_eq!(store.is_workspace_trusted(Path::new("/repo")), None);

        store.set(Path::new("/repo"), TrustLevel::TrustFolder).unwrap();
        assert_eq!(store.is_workspace_trusted(Path::new("/repo/sub")), Some(true));

        store.set(Path::new("/bad"), TrustLevel::DoNotTrust).unwrap();
        assert_eq!(store.is_workspace_trusted(Path::new("/bad")), Some(false));
    }
}
