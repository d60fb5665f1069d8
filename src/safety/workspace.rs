/// Per-invocation ephemeral workspaces.
///
/// Every invocation gets a fresh directory named by a random UUID under the
/// sandbox root. The directory is exclusively owned by one executor run and
/// removed on every exit path: explicitly by the executor, and by `Drop` as a
/// backstop when a panic unwinds past it.
use crate::config::types::{InvokeError, Result};
use crate::safety::safe_cleanup;
use chrono::{DateTime, Utc};
use std::fs;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Workspace for one invocation's generated sources, binaries and scratch files
#[derive(Debug)]
pub struct Workspace {
    run_id: String,
    run_dir: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Create a new, uniquely named workspace under `base_dir`
    pub fn create(base_dir: &Path) -> Result<Self> {
        let run_id = Uuid::new_v4().to_string();
        let run_dir = base_dir.join(&run_id);

        // create() rather than create_all(): an existing directory is a collision.
        fs::DirBuilder::new()
            .mode(0o700)
            .create(&run_dir)
            .map_err(|e| {
                InvokeError::Workspace(format!(
                    "Failed to create workspace directory {}: {}",
                    run_dir.display(),
                    e
                ))
            })?;

        log::debug!("Created workspace {}", run_dir.display());
        Ok(Self {
            run_id,
            run_dir,
            removed: false,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.run_dir
    }

    /// Path of a file inside the workspace
    pub fn path(&self, name: &str) -> PathBuf {
        self.run_dir.join(name)
    }

    /// Write a file (creating parent directories inside the workspace)
    pub fn write_file(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                InvokeError::Workspace(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        fs::write(&path, content).map_err(|e| {
            InvokeError::Workspace(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(path)
    }

    /// Remove the workspace tree (idempotent)
    pub fn cleanup(&mut self) -> Result<()> {
        if self.removed {
            return Ok(());
        }
        safe_cleanup::remove_tree_secure(&self.run_dir)?;
        self.removed = true;
        log::debug!("Removed workspace {}", self.run_dir.display());
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            log::warn!(
                "Failed to remove workspace {}: {}",
                self.run_dir.display(),
                e
            );
        }
    }
}

/// Owns the sandbox root all workspaces are created under
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl WorkspaceManager {
    /// Create the sandbox root if it does not exist yet
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir).map_err(|e| {
            InvokeError::Workspace(format!(
                "Failed to create sandbox root {}: {}",
                base_dir.display(),
                e
            ))
        })?;

        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn create_workspace(&self) -> Result<Workspace> {
        Workspace::create(&self.base_dir)
    }

    /// Remove workspaces older than `max_age`.
    ///
    /// Live workspaces are always younger than the compile plus execute
    /// budgets, so anything older was left behind by a crashed replica.
    pub fn sweep_stale(&self, max_age: Duration) -> Result<usize> {
        let mut cleaned = 0;
        let now = SystemTime::now();

        let entries = fs::read_dir(&self.base_dir).map_err(|e| {
            InvokeError::Workspace(format!(
                "Failed to read sandbox root {}: {}",
                self.base_dir.display(),
                e
            ))
        })?;

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            let metadata = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("Failed to get metadata for {}: {}", path.display(), e);
                    continue;
                }
            };
            if !metadata.is_dir() {
                continue;
            }

            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let Ok(age) = now.duration_since(modified) else {
                continue;
            };

            if age >= max_age {
                let modified_at: DateTime<Utc> = modified.into();
                log::info!(
                    "Removing stale workspace {} (last modified {})",
                    path.display(),
                    modified_at.to_rfc3339()
                );
                match safe_cleanup::remove_tree_secure(&path) {
                    Ok(()) => cleaned += 1,
                    Err(e) => log::warn!("Failed to remove stale workspace {}: {}", path.display(), e),
                }
            }
        }

        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_workspace_creation() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().join("sandbox")).unwrap();

        let mut workspace = manager.create_workspace().unwrap();
        assert!(workspace.dir().is_dir());
        assert!(workspace.dir().starts_with(manager.base_dir()));

        let mode = fs::metadata(workspace.dir()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);

        workspace.cleanup().unwrap();
        assert!(!workspace.dir().exists());
        // Idempotent
        workspace.cleanup().unwrap();
    }

    #[test]
    fn test_workspace_files() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();
        let workspace = manager.create_workspace().unwrap();

        let source = workspace.write_file("src/main.rs", b"fn main() {}").unwrap();
        assert!(source.exists());
        assert_eq!(source, workspace.path("src/main.rs"));

        let dir = workspace.dir().to_path_buf();
        drop(workspace);
        assert!(!dir.exists());
    }

    #[test]
    fn test_workspace_names_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();

        let workspaces: Vec<_> = (0..32).map(|_| manager.create_workspace().unwrap()).collect();
        let dirs: HashSet<_> = workspaces.iter().map(|w| w.dir().to_path_buf()).collect();
        assert_eq!(dirs.len(), 32);
    }

    #[test]
    fn test_sweep_stale() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();

        let leftover = root.path().join("leftover");
        fs::create_dir(&leftover).unwrap();
        fs::write(leftover.join("main.c"), b"int main(){}").unwrap();
        fs::write(root.path().join("not-a-dir"), b"").unwrap();

        // A large max age keeps everything
        assert_eq!(manager.sweep_stale(Duration::from_secs(3600)).unwrap(), 0);
        assert!(leftover.exists());

        assert_eq!(manager.sweep_stale(Duration::ZERO).unwrap(), 1);
        assert!(!leftover.exists());
        assert!(root.path().join("not-a-dir").exists());
    }
}
