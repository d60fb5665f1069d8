use crate::config::types::Result;
use crate::judge::harness::HarnessTemplate;
use crate::judge::{path_arg, RuntimeAdapter, RuntimeKind};
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::Workspace;

/// Go with encoding/json. User code defines
/// `func handler(event map[string]interface{}) interface{}`.
#[derive(Debug, Clone, Default)]
pub struct GoAdapter;

// User code sits directly after the import block so it may add imports of
// its own.
pub const HARNESS: HarnessTemplate = HarnessTemplate::new(
    "main.go",
    r#"package main

import (
	"encoding/json"
	"fmt"
	"io"
	"os"
)

{{USER_CODE}}

const maxEventBytes = 1048576

func main() {
	data, err := io.ReadAll(io.LimitReader(os.Stdin, maxEventBytes))
	if err != nil {
		fmt.Fprintf(os.Stderr, "Error reading input: %v\n", err)
		os.Exit(1)
	}

	var event map[string]interface{}
	if err := json.Unmarshal(data, &event); err != nil {
		fmt.Fprintf(os.Stderr, "Error: Failed to parse input JSON: %v\n", err)
		os.Exit(1)
	}

	result := handler(event)

	output, err := json.Marshal(result)
	if err != nil {
		fmt.Fprintf(os.Stderr, "Error encoding output: %v\n", err)
		os.Exit(1)
	}
	fmt.Println(string(output))
}
"#,
);

impl RuntimeAdapter for GoAdapter {
    fn language(&self) -> &'static str {
        "golang"
    }

    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Compiled
    }

    fn stage(&self, code: &str, workspace: &Workspace) -> Result<()> {
        workspace.write_file(HARNESS.file_name, HARNESS.render(code).as_bytes())?;
        Ok(())
    }

    fn compile_command(&self, workspace: &Workspace) -> Option<Vec<String>> {
        Some(vec![
            "go".to_string(),
            "build".to_string(),
            "-o".to_string(),
            path_arg(workspace, "main"),
            path_arg(workspace, HARNESS.file_name),
        ])
    }

    fn run_command(&self, workspace: &Workspace, _limits: &ResourceLimits) -> Vec<String> {
        vec![path_arg(workspace, "main")]
    }

    fn environment(&self, _workspace: &Workspace) -> Vec<(String, String)> {
        vec![
            ("GOCACHE".to_string(), "/tmp/gocache".to_string()),
            ("GOPATH".to_string(), "/tmp/gopath".to_string()),
            ("GO111MODULE".to_string(), "off".to_string()),
            (
                "PATH".to_string(),
                "/usr/local/go/bin:/usr/local/bin:/usr/bin:/bin".to_string(),
            ),
        ]
    }
}
