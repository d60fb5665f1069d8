/// Sandboxed execution of one invocation: workspace, compile, run, classify
use crate::config::types::{ExecutionOutcome, Result};
use crate::config::worker::WorkerConfig;
use crate::core::supervisor::run_process;
use crate::core::types::{ProcessReport, ProcessSpec};
use crate::judge::RuntimeAdapter;
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::{Workspace, WorkspaceManager};
use crate::utils::diagnostics::{error_trace, panic_trace};
use crate::utils::env_hygiene::EnvPolicy;
use crate::utils::output::OutputLimits;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_secs(30);

const NON_ZERO_EXIT_FALLBACK: &str = "Execution failed with non-zero exit code";

/// Runs untrusted code through a runtime adapter and always yields exactly one
/// outcome
pub struct SandboxExecutor {
    workspaces: WorkspaceManager,
    limits: ResourceLimits,
    compile_timeout: Duration,
    execute_timeout: Duration,
    output_limits: OutputLimits,
    env_policy: EnvPolicy,
}

/// Result of the prepare stage
enum Prepared {
    Ready,
    Failed(ExecutionOutcome),
}

impl SandboxExecutor {
    pub fn new(workspaces: WorkspaceManager, limits: ResourceLimits) -> Self {
        Self {
            workspaces,
            limits,
            compile_timeout: DEFAULT_COMPILE_TIMEOUT,
            execute_timeout: DEFAULT_EXECUTE_TIMEOUT,
            output_limits: OutputLimits::default(),
            env_policy: EnvPolicy::default(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
        let workspaces = WorkspaceManager::new(config.sandbox_root.clone())?;
        Ok(Self::new(workspaces, config.resource_limits())
            .with_compile_timeout(config.compile_timeout())
            .with_execute_timeout(config.execute_timeout()))
    }

    pub fn with_compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = timeout;
        self
    }

    pub fn with_execute_timeout(mut self, timeout: Duration) -> Self {
        self.execute_timeout = timeout;
        self
    }

    pub fn with_output_limits(mut self, limits: OutputLimits) -> Self {
        self.output_limits = limits;
        self
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Execute `code` against `input`.
    ///
    /// Never fails and never panics: orchestration faults and panics are
    /// folded into an ERROR outcome with a diagnostic trace in `logs`. The
    /// workspace is removed before this returns on every path.
    pub fn execute(
        &self,
        adapter: &dyn RuntimeAdapter,
        code: &str,
        input: &serde_json::Value,
    ) -> ExecutionOutcome {
        let mut logs = String::new();
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_in_workspace(adapter, code, input, &mut logs)
        }));

        match attempt {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                log::error!("Sandbox fault for {}: {}", adapter.language(), e);
                logs.push_str(&error_trace(&e));
                ExecutionOutcome::error(e.to_string(), logs, 0)
            }
            Err(payload) => {
                log::error!("Sandbox panicked for {}", adapter.language());
                logs.push_str(&panic_trace(payload.as_ref()));
                ExecutionOutcome::error("Internal error during execution", logs, 0)
            }
        }
    }

    fn run_in_workspace(
        &self,
        adapter: &dyn RuntimeAdapter,
        code: &str,
        input: &serde_json::Value,
        logs: &mut String,
    ) -> Result<ExecutionOutcome> {
        let mut workspace = self.workspaces.create_workspace()?;
        let outcome = self.run_stages(adapter, code, input, &workspace, logs);

        // Drop retries on failure, so a cleanup error is only logged here.
        if let Err(e) = workspace.cleanup() {
            log::warn!("Workspace {} cleanup failed: {}", workspace.run_id(), e);
        }
        outcome
    }

    fn run_stages(
        &self,
        adapter: &dyn RuntimeAdapter,
        code: &str,
        input: &serde_json::Value,
        workspace: &Workspace,
        logs: &mut String,
    ) -> Result<ExecutionOutcome> {
        adapter.stage(code, workspace)?;

        if let Prepared::Failed(outcome) = self.prepare(adapter, workspace, logs)? {
            return Ok(outcome);
        }

        let stdin = serde_json::to_vec(input)?;
        let mut spec = ProcessSpec::new(
            adapter.run_command(workspace, &self.limits),
            workspace.dir().to_path_buf(),
            self.execute_timeout,
        );
        spec.environment = self
            .env_policy
            .build(workspace.dir(), &adapter.environment(workspace));
        spec.stdin_data = Some(stdin);
        spec.limits = Some(adapter.run_limits(self.limits));

        let report = run_process(&spec, &self.output_limits)?;
        Ok(self.classify(report, std::mem::take(logs)))
    }

    fn prepare(
        &self,
        adapter: &dyn RuntimeAdapter,
        workspace: &Workspace,
        logs: &mut String,
    ) -> Result<Prepared> {
        let command = match adapter.compile_command(workspace) {
            Some(command) => command,
            None => return Ok(Prepared::Ready),
        };

        let mut spec = ProcessSpec::new(
            command,
            workspace.dir().to_path_buf(),
            self.compile_timeout,
        );
        spec.environment = self
            .env_policy
            .build(workspace.dir(), &adapter.environment(workspace));

        let report = run_process(&spec, &self.output_limits)?;
        if report.timed_out() {
            log::info!("Compilation timed out after {:?}", self.compile_timeout);
            return Ok(Prepared::Failed(ExecutionOutcome::error(
                "Compilation timed out",
                std::mem::take(logs),
                0,
            )));
        }

        if !report.success() {
            let diagnostic = compile_diagnostic(&report);
            log::info!("Compilation failed ({})", report.exit_description());
            logs.push_str(&diagnostic);
            return Ok(Prepared::Failed(ExecutionOutcome::error(
                format!("Compilation error:\n{}", diagnostic),
                std::mem::take(logs),
                0,
            )));
        }

        logs.push_str("Compilation successful\n");
        Ok(Prepared::Ready)
    }

    fn classify(&self, report: ProcessReport, mut logs: String) -> ExecutionOutcome {
        let duration_ms = report.wall_time_ms();
        logs.push_str(&report.stderr);
        for note in &report.notes {
            if !logs.is_empty() && !logs.ends_with('\n') {
                logs.push('\n');
            }
            logs.push_str(note);
            logs.push('\n');
        }

        if report.timed_out() {
            return ExecutionOutcome::timeout(
                format!(
                    "Execution timed out after {} seconds",
                    format_budget(self.execute_timeout)
                ),
                logs,
                duration_ms,
            );
        }

        if !report.success() {
            let stderr = report.stderr.trim();
            let message = if stderr.is_empty() {
                logs.push_str(&format!("[sandbox] process {}\n", report.exit_description()));
                NON_ZERO_EXIT_FALLBACK.to_string()
            } else {
                stderr.to_string()
            };
            return ExecutionOutcome::error(message, logs, duration_ms);
        }

        ExecutionOutcome::success(report.stdout.trim().to_string(), logs, duration_ms)
    }
}

/// Toolchains differ in which stream carries their diagnostics
fn compile_diagnostic(report: &ProcessReport) -> String {
    let mut diagnostic = report.stderr.clone();
    if diagnostic.trim().is_empty() {
        diagnostic = report.stdout.clone();
    }
    if diagnostic.trim().is_empty() {
        diagnostic = format!("compiler {}\n", report.exit_description());
    }
    diagnostic
}

fn format_budget(budget: Duration) -> String {
    if budget.subsec_nanos() == 0 {
        budget.as_secs().to_string()
    } else {
        format!("{:.1}", budget.as_secs_f64())
    }
}
