use crate::config::types::Result;
use crate::judge::{path_arg, RuntimeAdapter, RuntimeKind};
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::Workspace;

pub const RUNNER_FILE: &str = "main.rb";
pub const USER_FILE: &str = "handler.rb";

pub const RUNNER: &str = r##"require 'json'

MAX_EVENT_BYTES = 1048576

def run(path)
  raw = $stdin.read(MAX_EVENT_BYTES) || ''
  begin
    event = JSON.parse(raw, quirks_mode: true)
  rescue JSON::ParserError => e
    warn "Error: Failed to parse input JSON: #{e.message}"
    return 1
  end

  source = File.read(path)
  sandbox = Object.new
  original_stdout = $stdout
  result = nil
  begin
    $stdout = $stderr
    sandbox.instance_eval(source, path)
    unless sandbox.respond_to?(:handler, true)
      warn "No 'handler(event)' method defined in code."
      return 1
    end
    result = sandbox.send(:handler, event)
  rescue SystemExit => e
    warn "Error: handler exited (status #{e.status}) before returning a result"
    return 1
  rescue ScriptError, StandardError => e
    warn "#{e.class}: #{e.message}"
    warn e.backtrace.join("\n") if e.backtrace
    return 1
  ensure
    $stdout = original_stdout
  end

  $stdout.write(JSON.generate(result))
  $stdout.write("\n")
  $stdout.flush
  0
end

exit(run(ARGV[0]))
"##;

/// Ruby with the bundled json library
#[derive(Debug, Clone, Default)]
pub struct RubyAdapter;

impl RuntimeAdapter for RubyAdapter {
    fn language(&self) -> &'static str {
        "ruby"
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
            "ruby".to_string(),
            path_arg(workspace, RUNNER_FILE),
            path_arg(workspace, USER_FILE),
        ]
    }
}
