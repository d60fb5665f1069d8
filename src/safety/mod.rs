//! Safety and cleanup
//!
//! Per-invocation workspaces and symlink-safe removal.

pub mod safe_cleanup;
pub mod workspace;
