use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GatehouseError, Result};

/// Top-level settings, from `.gatehouse/settings.yml` or the global
/// `~/.config/gatehouse/settings.yml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub folder_trust: FolderTrustConfig,

    #[serde(default)]
    pub hooks: HooksConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Directories to add when the session starts, through the same trust
    /// flow as an interactive add.
    #[serde(default)]
    pub include_directories: Vec<String>,
}

impl Settings {
    /// Load settings from a YAML file. Returns default if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|e| GatehouseError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Project settings win; the global file is the fallback.
    pub fn load_project(project_root: &Path) -> Result<Self> {
        let project = project_root.join(".gatehouse").join("settings.yml");
        if project.exists() {
            return Self::load_from(&project);
        }
        Self::load_from(&super::dirs_global().join("settings.yml"))
    }

    /// Where the trust store lives.
    pub fn trust_file(&self) -> PathBuf {
        self.folder_trust
            .trust_file
            .clone()
            .unwrap_or_else(|| super::dirs_global().join("trusted_folders.json"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderTrustConfig {
    /// Per-directory trust gating. Default: true.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Override the trust store location.
    #[serde(default)]
    pub trust_file: Option<PathBuf>,

    /// Force the session's workspace trust. Unset derives it from the store.
    #[serde(default)]
    pub workspace_trusted: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl Default for FolderTrustConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trust_file: None,
            workspace_trusted: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Deadline for every hook call in milliseconds. Default: 60000.
    #[serde(default = "default_hook_timeout")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub before_agent: Option<HookSpec>,

    #[serde(default)]
    pub after_agent: Option<HookSpec>,
}

fn default_hook_timeout() -> u64 {
    60_000
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_hook_timeout(),
            before_agent: None,
            after_agent: None,
        }
    }
}

/// How to reach one hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HookSpec {
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default)]
        working_dir: Option<PathBuf>,
    },
    Socket {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Restrictive profiles only allow directories given at session start.
    #[serde(default)]
    pub restrictive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let s = Settings::load_from(&tmp.path().join("settings.yml")).unwrap();
        assert!(s.folder_trust.enabled);
        assert_eq!(s.hooks.timeout_ms, 60_000);
        assert!(s.hooks.before_agent.is_none());
        assert!(!s.sandbox.restrictive);
    }

    #[test]
    fn test_parse_full_settings() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(".gatehouse");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("settings.yml"),
            r#"
folder_trust:
  enabled: false
  workspace_trusted: true
hooks:
  timeout_ms: 250
  before_agent:
    type: command
    command: ./policy.sh
    args: ["--strict"]
  after_agent:
    type: socket
    path: /tmp/policy.sock
sandbox:
  restrictive: true
include_directories: ["~/lib", "../shared"]
"#,
        )
        .unwrap();

        let s = Settings::load_project(tmp.path()).unwrap();
        assert!(!s.folder_trust.enabled);
        assert_eq!(s.folder_trust.workspace_trusted, Some(true));
        assert_eq!(s.hooks.timeout_ms, 250);
        assert!(matches!(
            s.hooks.before_agent,
            Some(HookSpec::Command { ref args, .. }) if args == &vec!["--strict".to_string()]
        ));
        assert_eq!(
            s.hooks.after_agent,
            Some(HookSpec::Socket {
                path: PathBuf::from("/tmp/policy.sock")
            })
        );
        assert!(s.sandbox.restrictive);
        assert_eq!(s.include_directories.len(), 2);
    }

    #[test]
    fn test_bad_yaml_is_config_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.yml");
        std::fs::write(&path, "hooks: [unclosed").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(GatehouseError::ConfigParse { .. })
        ));
    }
}
