use crate::config::types::Result;
use crate::judge::{path_arg, RuntimeAdapter, RuntimeKind};
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::Workspace;

pub const RUNNER_FILE: &str = "main.js";
pub const USER_FILE: &str = "handler.js";

/// V8 reserves a large virtual range at startup
const V8_ADDRESS_SPACE_FLOOR_MB: u64 = 4096;

/// Evaluates the user's file in a fresh vm context whose console writes to
/// stderr, then awaits `handler(event)` and prints the JSON result.
pub const RUNNER: &str = r#"'use strict';
const fs = require('fs');
const util = require('util');
const vm = require('vm');

const MAX_EVENT_BYTES = 1048576;

function readStdin() {
  const chunks = [];
  const chunk = Buffer.alloc(65536);
  let total = 0;
  while (total < MAX_EVENT_BYTES) {
    let n;
    try {
      n = fs.readSync(0, chunk, 0, Math.min(chunk.length, MAX_EVENT_BYTES - total), null);
    } catch (e) {
      if (e.code === 'EAGAIN') continue;
      if (e.code === 'EOF') break;
      throw e;
    }
    if (n === 0) break;
    chunks.push(Buffer.from(chunk.subarray(0, n)));
    total += n;
  }
  return Buffer.concat(chunks).toString('utf8');
}

function fail(err) {
  process.stderr.write((err && err.stack ? err.stack : String(err)) + '\n');
  process.exitCode = 1;
}

function emit(result) {
  const text = JSON.stringify(result);
  process.stdout.write((text === undefined ? 'null' : text) + '\n');
}

function main() {
  let event;
  try {
    event = JSON.parse(readStdin());
  } catch (e) {
    process.stderr.write('Error: Failed to parse input JSON: ' + e.message + '\n');
    process.exitCode = 1;
    return;
  }

  const path = process.argv[2];
  const source = fs.readFileSync(path, 'utf8');
  const log = (...args) => process.stderr.write(util.format(...args) + '\n');
  const sandboxConsole = { log, info: log, warn: log, error: log, debug: log };
  const sandboxModule = { exports: {} };
  const context = vm.createContext({
    console: sandboxConsole,
    module: sandboxModule,
    exports: sandboxModule.exports,
    event,
    Buffer,
    setTimeout,
    clearTimeout,
    setImmediate,
  });

  try {
    vm.runInContext(source, context, { filename: path });
    let handler = context.handler;
    if (typeof handler !== 'function' && sandboxModule.exports) {
      handler = sandboxModule.exports.handler;
    }
    if (typeof handler !== 'function') {
      process.stderr.write("No 'handler(event)' function defined in code.\n");
      process.exitCode = 1;
      return;
    }
    Promise.resolve(handler(event)).then(emit, fail);
  } catch (e) {
    fail(e);
  }
}

main();
"#;

/// Node.js
#[derive(Debug, Clone, Default)]
pub struct JavaScriptAdapter;

impl RuntimeAdapter for JavaScriptAdapter {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Interpreted
    }

    fn stage(&self, code: &str, workspace: &Workspace) -> Result<()> {
        workspace.write_file(RUNNER_FILE, RUNNER.as_bytes())?;
        workspace.write_file(USER_FILE, code.as_bytes())?;
        Ok(())
    }

    fn compile_command(&self, _workspace: &Workspace) -> Option<Vec<String>> {
        None
    }

    fn run_command(&self, workspace: &Workspace, limits: &ResourceLimits) -> Vec<String> {
        vec![
            "node".to_string(),
            format!("--max-old-space-size={}", limits.memory_mb),
            path_arg(workspace, RUNNER_FILE),
            path_arg(workspace, USER_FILE),
        ]
    }

    fn run_limits(&self, configured: ResourceLimits) -> ResourceLimits {
        configured.with_address_space_floor(V8_ADDRESS_SPACE_FLOOR_MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_heap_flag_and_address_space_floor() {
        let root = TempDir::new().unwrap();
        let workspace = Workspace::create(root.path()).unwrap();
        let limits = ResourceLimits {
            memory_mb: 128,
            ..ResourceLimits::default()
        };

        let cmd = JavaScriptAdapter.run_command(&workspace, &limits);
        assert_eq!(cmd[0], "node");
        assert_eq!(cmd[1], "--max-old-space-size=128");
        assert!(cmd[3].ends_with(USER_FILE));

        assert_eq!(JavaScriptAdapter.run_limits(limits).memory_mb, V8_ADDRESS_SPACE_FLOOR_MB);
        let large = ResourceLimits {
            memory_mb: 8192,
            ..ResourceLimits::default()
        };
        assert_eq!(JavaScriptAdapter.run_limits(large).memory_mb, 8192);
    }

    #[test]
    fn test_runner_redirects_console() {
        assert!(RUNNER.contains("1048576"));
        assert!(RUNNER.contains("process.stderr.write(util.format"));
    }
}
