//! invokebox: queue-driven sandboxed function execution
//!
//! Each worker replica serves one language runtime. It pulls invocation
//! requests from `execution_queue:<language>`, runs the user's
//! `handler(event)` in a throwaway workspace under OS resource ceilings, and
//! stores exactly one result record at `result:<invocationId>`.
//!
//! # Architecture
//!
//! ## Dispatch ([`dispatch`])
//! - [`dispatch::worker`]: the dequeue, execute, persist loop
//! - [`dispatch::broker`]: queue and result-store seams (Redis, in-memory)
//! - [`dispatch::request`]: queue item parsing
//!
//! ## Execution ([`exec`])
//! - [`exec::executor`]: workspace, compile, run and classify; never fails
//!
//! ## Runtime adapters ([`judge`])
//! - [`judge::registry`]: runtime ids and aliases
//! - [`judge::harness`]: single-insertion-point harness templates
//! - [`judge::languages`]: one adapter per toolchain
//!
//! ## Process core ([`core`])
//! - [`core::supervisor`]: spawn, feed stdin, wall-clock kill
//! - [`core::types`]: process specs and reports
//!
//! ## Kernel primitives ([`kernel`])
//! - [`kernel::rlimit`]: per-child resource ceilings
//! - [`kernel::signal`]: shutdown signals and process-group termination
//!
//! ## Safety ([`safety`])
//! - [`safety::workspace`]: per-invocation directories and stale sweeps
//! - [`safety::safe_cleanup`]: removal that never follows symlinks
//!
//! ## Configuration ([`config`]), observability ([`observability`]) and
//! utilities ([`utils`])

// Kernel Primitives
pub mod kernel;

// Process core
pub mod core;

// Runtime adapters
pub mod judge;

// Execution
pub mod exec;

// Queue dispatch
pub mod dispatch;

// Safety & Cleanup
pub mod safety;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// CLI entrypoint wiring shared by both binaries.
pub mod cli;

pub use config::types::*;
