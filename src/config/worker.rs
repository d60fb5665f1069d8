/// Worker configuration, read once at startup
use crate::config::types::{InvokeError, Result};
use crate::kernel::rlimit::ResourceLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SANDBOX_ROOT: &str = "/tmp/sandbox";
pub const QUEUE_KEY_PREFIX: &str = "execution_queue:";
pub const RESULT_KEY_PREFIX: &str = "result:";

/// Process-wide worker settings.
///
/// Every field has a default so a JSON config file only needs the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub redis_host: String,
    pub redis_port: u16,
    /// Runtime id this replica serves, e.g. `python` or `cpp17_clang`
    pub language: Option<String>,
    pub sandbox_root: PathBuf,
    pub cpu_time_limit_secs: u64,
    pub memory_limit_mb: u64,
    pub compile_timeout_secs: u64,
    pub execute_timeout_secs: u64,
    pub poll_timeout_secs: u64,
    pub result_ttl_secs: u64,
    /// Workspaces older than this are swept at startup
    pub stale_workspace_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            language: None,
            sandbox_root: PathBuf::from(DEFAULT_SANDBOX_ROOT),
            cpu_time_limit_secs: 30,
            memory_limit_mb: 512,
            compile_timeout_secs: 30,
            execute_timeout_secs: 30,
            poll_timeout_secs: 5,
            result_ttl_secs: 600,
            stale_workspace_secs: 3600,
        }
    }
}

impl WorkerConfig {
    /// Load a JSON config file; missing fields fall back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            InvokeError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            InvokeError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }

    pub fn resource_limits(&self) -> ResourceLimits {
        ResourceLimits {
            cpu_time_secs: self.cpu_time_limit_secs,
            memory_mb: self.memory_limit_mb,
            ..ResourceLimits::default()
        }
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    pub fn execute_timeout(&self) -> Duration {
        Duration::from_secs(self.execute_timeout_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    pub fn stale_workspace_age(&self) -> Duration {
        Duration::from_secs(self.stale_workspace_secs)
    }
}

pub fn queue_key_for(language: &str) -> String {
    format!("{}{}", QUEUE_KEY_PREFIX, language)
}

pub fn result_key_for(invocation_id: &crate::config::types::InvocationId) -> String {
    format!("{}{}", RESULT_KEY_PREFIX, invocation_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::InvocationId;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = WorkerConfig::default();
        assert_eq!(config.redis_url(), "redis://localhost:6379");
        assert_eq!(config.cpu_time_limit_secs, 30);
        assert_eq!(config.memory_limit_mb, 512);
        assert_eq!(config.execute_timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_timeout(), Duration::from_secs(5));
        assert_eq!(config.result_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.json");
        std::fs::write(&path, r#"{"language": "python", "memory_limit_mb": 256}"#).unwrap();

        let config = WorkerConfig::load(&path).unwrap();
        assert_eq!(config.language.as_deref(), Some("python"));
        assert_eq!(config.memory_limit_mb, 256);
        assert_eq!(config.redis_port, 6379);
    }

    #[test]
    fn test_bad_config_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(WorkerConfig::load(&path), Err(InvokeError::Config(_))));
    }

    #[test]
    fn test_keys() {
        assert_eq!(queue_key_for("golang"), "execution_queue:golang");
        assert_eq!(result_key_for(&InvocationId::Int(42)), "result:42");
        assert_eq!(result_key_for(&InvocationId::from("x")), "result:x");
    }

    #[test]
    fn test_resource_limits_follow_config() {
        let config = WorkerConfig {
            cpu_time_limit_secs: 10,
            memory_limit_mb: 128,
            ..WorkerConfig::default()
        };
        let limits = config.resource_limits();
        assert_eq!(limits.cpu_time_secs, 10);
        assert_eq!(limits.memory_mb, 128);
        assert_eq!(limits.open_files, 256);
    }
}
