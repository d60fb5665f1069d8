use crate::config::types::Result;
use crate::judge::harness::HarnessTemplate;
use crate::judge::{path_arg, RuntimeAdapter, RuntimeKind};
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::Workspace;

/// Rust with serde_json, built as a tiny cargo project.
/// User code defines `fn handler(event: Value) -> Value`.
#[derive(Debug, Clone, Default)]
pub struct RustAdapter;

pub const MANIFEST: &str = r#"[package]
name = "handler"
version = "0.1.0"
edition = "2021"

[dependencies]
serde_json = "1"

[profile.release]
opt-level = 2
"#;

pub const HARNESS: HarnessTemplate = HarnessTemplate::new(
    "src/main.rs",
    r##"#![allow(unused_imports)]
use serde_json::{json, Value};
use std::io::Read;

const MAX_EVENT_BYTES: u64 = 1048576;

{{USER_CODE}}

fn main() {
    let mut input = String::new();
    if let Err(e) = std::io::stdin().take(MAX_EVENT_BYTES).read_to_string(&mut input) {
        eprintln!("Error reading input: {}", e);
        std::process::exit(1);
    }

    let event: Value = match serde_json::from_str(&input) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error: Failed to parse input JSON: {}", e);
            std::process::exit(1);
        }
    };

    let result = handler(event);

    match serde_json::to_string(&result) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error encoding output: {}", e);
            std::process::exit(1);
        }
    }
}
"##,
);

impl RuntimeAdapter for RustAdapter {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Compiled
    }

    fn stage(&self, code: &str, workspace: &Workspace) -> Result<()> {
        workspace.write_file("Cargo.toml", MANIFEST.as_bytes())?;
        workspace.write_file(HARNESS.file_name, HARNESS.render(code).as_bytes())?;
        Ok(())
    }

    fn compile_command(&self, workspace: &Workspace) -> Option<Vec<String>> {
        Some(vec![
            "cargo".to_string(),
            "build".to_string(),
            "--release".to_string(),
            "--offline".to_string(),
            "--quiet".to_string(),
            "--manifest-path".to_string(),
            path_arg(workspace, "Cargo.toml"),
        ])
    }

    fn run_command(&self, workspace: &Workspace, _limits: &ResourceLimits) -> Vec<String> {
        vec![path_arg(workspace, "target/release/handler")]
    }

    fn environment(&self, workspace: &Workspace) -> Vec<(String, String)> {
        vec![
            ("CARGO_HOME".to_string(), "/usr/local/cargo".to_string()),
            ("RUSTUP_HOME".to_string(), "/usr/local/rustup".to_string()),
            ("CARGO_TARGET_DIR".to_string(), path_arg(workspace, "target")),
            (
                "PATH".to_string(),
                "/usr/local/cargo/bin:/usr/local/bin:/usr/bin:/bin".to_string(),
            ),
        ]
    }
}
