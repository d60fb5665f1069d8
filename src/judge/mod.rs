//! Runtime adapters.
//!
//! The executor stays language-agnostic. Adapters define how user code is laid
//! out in the workspace, how it is compiled (if at all) and how the resulting
//! artifact is started.
//!
//! Compiled adapters splice user code into a fixed harness template at a
//! single insertion point; interpreted adapters write a fixed runner script
//! next to the user's file. In both cases user code runs with the full
//! privilege of the spawned process. Containment comes from the resource
//! ceilings and the process-group kill, not from any language-level sandbox.

pub mod harness;
pub mod languages;
pub mod registry;

use crate::config::types::Result;
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::Workspace;

/// Compile/execute model of a runtime
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeKind {
    Compiled,
    Interpreted,
}

impl RuntimeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeKind::Compiled => "compiled",
            RuntimeKind::Interpreted => "interpreted",
        }
    }
}

/// Adapter contract for one language runtime
pub trait RuntimeAdapter: Send + Sync {
    /// Runtime id, also the suffix of the queue this runtime consumes
    fn language(&self) -> &'static str;

    fn kind(&self) -> RuntimeKind;

    /// Write harness and user code into the workspace
    fn stage(&self, code: &str, workspace: &Workspace) -> Result<()>;

    /// Toolchain invocation for the prepare stage; `None` for interpreters
    fn compile_command(&self, workspace: &Workspace) -> Option<Vec<String>>;

    /// Command that starts the artifact. `limits` are the configured
    /// ceilings, for runtimes that size their own heap from them.
    fn run_command(&self, workspace: &Workspace, limits: &ResourceLimits) -> Vec<String>;

    /// Extra environment for both stages
    fn environment(&self, _workspace: &Workspace) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Ceilings for the run stage, derived from the configured ones
    fn run_limits(&self, configured: ResourceLimits) -> ResourceLimits {
        configured
    }
}

pub(crate) fn path_arg(workspace: &Workspace, name: &str) -> String {
    workspace.path(name).to_string_lossy().into_owned()
}
