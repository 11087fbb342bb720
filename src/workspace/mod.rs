pub mod paths;

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{GatehouseError, Result};

/// Callback invoked with the full directory snapshot after every change.
pub type DirectoryListener = dyn Fn(&[PathBuf]) + Send + Sync;

/// Handle returned by [`WorkspaceContext::on_directories_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Default)]
struct DirectorySet {
    order: Vec<PathBuf>,
    members: HashSet<PathBuf>,
}

impl DirectorySet {
    fn insert(&mut self, path: PathBuf) -> bool {
        if !self.members.insert(path.clone()) {
            return false;
        }
        self.order.push(path);
        true
    }
}

/// The set of directories the assistant may operate over in this session.
///
/// All mutation goes through [`add_directory`](Self::add_directory) or
/// [`set_directories`](Self::set_directories). Both hold the writer funnel for
/// the mutation and the listener dispatch that follows it, so every listener
/// sees change N before any listener sees change N+1. Listeners must not
/// mutate the workspace themselves.
pub struct WorkspaceContext {
    dirs: RwLock<DirectorySet>,
    listeners: Mutex<Vec<(ListenerId, Arc<DirectoryListener>)>>,
    writer: Mutex<()>,
    next_listener: AtomicU64,
}

impl Default for WorkspaceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkspaceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceContext")
            .field("directories", &self.directories())
            .finish()
    }
}

impl WorkspaceContext {
    pub fn new() -> Self {
        Self {
            dirs: RwLock::new(DirectorySet::default()),
            listeners: Mutex::new(Vec::new()),
            writer: Mutex::new(()),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Create a workspace seeded with `initial` directories, validating each.
    pub fn with_directories<I>(initial: I) -> Result<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let ctx = Self::new();
        for dir in initial {
            validate_directory(&dir)?;
            let mut guard = ctx.dirs.write().unwrap_or_else(|e| e.into_inner());
            guard.insert(dir);
        }
        Ok(ctx)
    }

    /// Snapshot of the current directories in insertion order.
    pub fn directories(&self) -> Vec<PathBuf> {
        let guard = self.dirs.read().unwrap_or_else(|e| e.into_inner());
        guard.order.clone()
    }

    pub fn contains(&self, path: &Path) -> bool {
        let guard = self.dirs.read().unwrap_or_else(|e| e.into_inner());
        guard.members.contains(path)
    }

    /// True if `path` is a workspace directory or lies beneath one.
    pub fn is_path_within_workspace(&self, path: &Path) -> bool {
        let guard = self.dirs.read().unwrap_or_else(|e| e.into_inner());
        guard.order.iter().any(|dir| path.starts_with(dir))
    }

    /// Validate and append a directory, then notify listeners.
    pub fn add_directory(&self, path: &Path) -> Result<()> {
        let _funnel = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        validate_directory(path)?;
        {
            let mut guard = self.dirs.write().unwrap_or_else(|e| e.into_inner());
            if !guard.insert(path.to_path_buf()) {
                return Err(GatehouseError::AlreadyInWorkspace {
                    path: path.to_path_buf(),
                });
            }
        }
        tracing::debug!("workspace: added {}", path.display());

        self.notify(&self.directories());
        Ok(())
    }

    /// Replace the whole directory set. Every entry is validated first; on any
    /// failure the workspace is left unchanged. Duplicates collapse silently.
    pub fn set_directories(&self, paths: &[PathBuf]) -> Result<()> {
        let _funnel = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        let mut next = DirectorySet::default();
        for path in paths {
            validate_directory(path)?;
            next.insert(path.clone());
        }
        let snapshot = next.order.clone();
        {
            let mut guard = self.dirs.write().unwrap_or_else(|e| e.into_inner());
            *guard = next;
        }

        self.notify(&snapshot);
        Ok(())
    }

    /// Register a listener that runs after every successful change.
    pub fn on_directories_changed<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&[PathBuf]) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let mut guard = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let listener: Arc<DirectoryListener> = Arc::new(listener);
        guard.push((id, listener));
        id
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut guard = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let before = guard.len();
        guard.retain(|(lid, _)| *lid != id);
        guard.len() != before
    }

    fn notify(&self, snapshot: &[PathBuf]) {
        // Clone out of the lock so a listener may register further listeners.
        let listeners: Vec<Arc<DirectoryListener>> = {
            let guard = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            guard.iter().map(|(_, l)| l.clone()).collect()
        };
        for listener in listeners {
            listener(snapshot);
        }
    }
}

/// Check that `path` exists, is a directory, and can be listed.
pub fn validate_directory(path: &Path) -> Result<()> {
    let meta = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => GatehouseError::DirectoryNotFound {
            path: path.to_path_buf(),
        },
        _ => GatehouseError::Inaccessible {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })?;
    if !meta.is_dir() {
        return Err(GatehouseError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    fs::read_dir(path).map_err(|e| GatehouseError::Inaccessible {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(())
}
