use crate::config::types::Result;
use crate::judge::{path_arg, RuntimeAdapter, RuntimeKind};
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::Workspace;

pub const RUNNER_FILE: &str = "main.py";
pub const USER_FILE: &str = "handler.py";

/// Loads the user's file, calls `handler(event)` and prints the JSON result.
/// Anything user code prints goes to stderr so stdout carries only the result.
pub const RUNNER: &str = r#"import contextlib
import json
import sys
import traceback

MAX_EVENT_BYTES = 1048576


def main():
    path = sys.argv[1]
    raw = sys.stdin.buffer.read(MAX_EVENT_BYTES)
    try:
        event = json.loads(raw.decode("utf-8"))
    except ValueError as exc:
        print("Error: Failed to parse input JSON: %s" % exc, file=sys.stderr)
        return 1

    with open(path, "r", encoding="utf-8") as fh:
        source = fh.read()

    namespace = {"__name__": "__handler__", "event": event}
    try:
        with contextlib.redirect_stdout(sys.stderr):
            exec(compile(source, path, "exec"), namespace)
            handler = namespace.get("handler")
            if not callable(handler):
                print("No 'handler(event)' function defined in code.", file=sys.stderr)
                return 1
            result = handler(event)
        output = json.dumps(result, ensure_ascii=False)
    except SystemExit as exc:
        print("Error: handler exited (code %r) before returning a result" % (exc.code,),
              file=sys.stderr)
        return 1
    except BaseException:
        traceback.print_exc()
        return 1

    sys.stdout.write(output)
    sys.stdout.write("\n")
    sys.stdout.flush()
    return 0


if __name__ == "__main__":
    sys.exit(main())
"#;

/// CPython and PyPy share the runner; only the interpreter differs
#[derive(Debug, Clone)]
pub struct PythonAdapter {
    language: &'static str,
    interpreter: &'static str,
}

impl PythonAdapter {
    pub fn cpython() -> Self {
        Self {
            language: "python",
            interpreter: "python3",
        }
    }

    pub fn pypy() -> Self {
        Self {
            language: "pypy3",
            interpreter: "pypy3",
        }
    }
}

impl RuntimeAdapter for PythonAdapter {
    fn language(&self) -> &'static str {
        self.language
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

    fn run_command(&self, workspace: &Workspace, _limits: &ResourceLimits) -> Vec<String> {
        vec![
            self.interpreter.to_string(),
            "-B".to_string(),
            path_arg(workspace, RUNNER_FILE),
            path_arg(workspace, USER_FILE),
        ]
    }

    fn environment(&self, _workspace: &Workspace) -> Vec<(String, String)> {
        vec![
            ("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string()),
            ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
            ("PYTHONUNBUFFERED".to_string(), "1".to_string()),
        ]
    }
}
