//! Shared fixtures for integration tests
#![allow(dead_code)]

use invokebox::config::types::Result;
use invokebox::exec::SandboxExecutor;
use invokebox::judge::{RuntimeAdapter, RuntimeKind};
use invokebox::kernel::rlimit::ResourceLimits;
use invokebox::safety::workspace::{Workspace, WorkspaceManager};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Treats user code as a POSIX shell script reading the event on stdin.
/// With `check_syntax`, `sh -n` plays the part of a compiler; with
/// `compile_sleep_secs`, that compiler first stalls for the given time.
pub struct ShellAdapter {
    pub check_syntax: bool,
    pub compile_sleep_secs: Option<u32>,
}

impl ShellAdapter {
    pub fn interpreted() -> Self {
        Self {
            check_syntax: false,
            compile_sleep_secs: None,
        }
    }

    pub fn compiled() -> Self {
        Self {
            check_syntax: true,
            compile_sleep_secs: None,
        }
    }

    pub fn slow_compiler(secs: u32) -> Self {
        Self {
            check_syntax: true,
            compile_sleep_secs: Some(secs),
        }
    }
}

impl RuntimeAdapter for ShellAdapter {
    fn language(&self) -> &'static str {
        "shell"
    }

    fn kind(&self) -> RuntimeKind {
        if self.check_syntax {
            RuntimeKind::Compiled
        } else {
            RuntimeKind::Interpreted
        }
    }

    fn stage(&self, code: &str, workspace: &Workspace) -> Result<()> {
        workspace.write_file("handler.sh", code.as_bytes())?;
        Ok(())
    }

    fn compile_command(&self, workspace: &Workspace) -> Option<Vec<String>> {
        let script = workspace.path("handler.sh").to_string_lossy().into_owned();
        match (self.check_syntax, self.compile_sleep_secs) {
            (false, _) => None,
            (true, None) => Some(vec!["/bin/sh".to_string(), "-n".to_string(), script]),
            (true, Some(secs)) => Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                format!("sleep {} && /bin/sh -n \"$0\"", secs),
                script,
            ]),
        }
    }

    fn run_command(&self, workspace: &Workspace, _limits: &ResourceLimits) -> Vec<String> {
        vec![
            "/bin/sh".to_string(),
            workspace.path("handler.sh").to_string_lossy().into_owned(),
        ]
    }
}

/// A sandbox root inside a temp dir, removed with it
pub struct Sandbox {
    pub dir: TempDir,
    pub root: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("sandbox");
        Self { dir, root }
    }

    pub fn executor(&self, execute_timeout: Duration) -> SandboxExecutor {
        let manager = WorkspaceManager::new(self.root.clone()).unwrap();
        // RLIMIT_NPROC counts every process of the test user, not just the
        // sandboxed ones.
        let limits = ResourceLimits {
            processes: 4096,
            ..ResourceLimits::default()
        };
        SandboxExecutor::new(manager, limits)
            .with_compile_timeout(Duration::from_secs(10))
            .with_execute_timeout(execute_timeout)
    }

    /// Number of workspaces still present under the root
    pub fn leftover_workspaces(&self) -> usize {
        std::fs::read_dir(&self.root).unwrap().count()
    }
}

/// True when `program --version` can be spawned
pub fn toolchain_available(program: &str) -> bool {
    std::process::Command::new(program)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok()
}
