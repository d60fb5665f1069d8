use crate::kernel::rlimit::ResourceLimits;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the supervisor needs to run one child process
#[derive(Clone, Debug)]
pub struct ProcessSpec {
    pub command: Vec<String>,
    pub workdir: PathBuf,
    /// Complete child environment; nothing is inherited from the worker
    pub environment: BTreeMap<String, String>,
    pub stdin_data: Option<Vec<u8>>,
    /// Ceilings applied in the child before exec; `None` leaves the
    /// toolchain unrestricted apart from the wall clock
    pub limits: Option<ResourceLimits>,
    pub wall_time_limit: Duration,
}

impl ProcessSpec {
    pub fn new(command: Vec<String>, workdir: PathBuf, wall_time_limit: Duration) -> Self {
        Self {
            command,
            workdir,
            environment: BTreeMap::new(),
            stdin_data: None,
            limits: None,
            wall_time_limit,
        }
    }

    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or("")
    }
}

/// How the child left
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessExit {
    Exited(i32),
    Signaled(i32),
    /// Killed by the supervisor after the wall-clock budget ran out
    TimedOut,
}

/// What the supervisor observed
#[derive(Clone, Debug)]
pub struct ProcessReport {
    pub exit: ProcessExit,
    pub stdout: String,
    pub stderr: String,
    pub wall_time: Duration,
    /// Capture problems (truncation, abandoned readers) worth surfacing in logs
    pub notes: Vec<String>,
}

impl ProcessReport {
    pub fn success(&self) -> bool {
        self.exit == ProcessExit::Exited(0)
    }

    pub fn timed_out(&self) -> bool {
        self.exit == ProcessExit::TimedOut
    }

    pub fn wall_time_ms(&self) -> u64 {
        self.wall_time.as_millis().min(u64::MAX as u128) as u64
    }

    /// Fallback description when a failing child wrote nothing to stderr
    pub fn exit_description(&self) -> String {
        match self.exit {
            ProcessExit::Exited(code) => format!("exit code {}", code),
            ProcessExit::Signaled(sig) => {
                let name = nix::sys::signal::Signal::try_from(sig)
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(|_| format!("signal {}", sig));
                format!("killed by {}", name)
            }
            ProcessExit::TimedOut => "timed out".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(exit: ProcessExit) -> ProcessReport {
        ProcessReport {
            exit,
            stdout: String::new(),
            stderr: String::new(),
            wall_time: Duration::from_millis(1500),
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_report_classification() {
        assert!(report(ProcessExit::Exited(0)).success());
        assert!(!report(ProcessExit::Exited(1)).success());
        assert!(report(ProcessExit::TimedOut).timed_out());
        assert_eq!(report(ProcessExit::Exited(0)).wall_time_ms(), 1500);
    }

    #[test]
    fn test_exit_description() {
        assert_eq!(report(ProcessExit::Exited(3)).exit_description(), "exit code 3");
        assert_eq!(
            report(ProcessExit::Signaled(libc::SIGKILL)).exit_description(),
            "killed by SIGKILL"
        );
    }
}
