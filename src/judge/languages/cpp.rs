use crate::config::types::Result;
use crate::judge::harness::HarnessTemplate;
use crate::judge::{path_arg, RuntimeAdapter, RuntimeKind};
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::Workspace;

/// C++17 (clang) with nlohmann/json. User code defines
/// `json handler(const json& event)`.
#[derive(Debug, Clone, Default)]
pub struct CppAdapter;

pub const HARNESS: HarnessTemplate = HarnessTemplate::new(
    "main.cpp",
    r#"#include <cstddef>
#include <exception>
#include <iostream>
#include <string>
#include <nlohmann/json.hpp>

using json = nlohmann::json;

static const std::size_t MAX_EVENT_BYTES = 1048576;

json handler(const json& event);

{{USER_CODE}}

int main() {
    std::string input(MAX_EVENT_BYTES, '\0');
    std::cin.read(&input[0], static_cast<std::streamsize>(MAX_EVENT_BYTES));
    input.resize(static_cast<std::size_t>(std::cin.gcount()));

    json event;
    try {
        event = json::parse(input);
    } catch (const std::exception& e) {
        std::cerr << "Error: Failed to parse input JSON: " << e.what() << std::endl;
        return 1;
    }

    try {
        json result = handler(event);
        std::cout << result.dump() << std::endl;
    } catch (const std::exception& e) {
        std::cerr << "Error: " << e.what() << std::endl;
        return 1;
    }
    return 0;
}
"#,
);

impl RuntimeAdapter for CppAdapter {
    fn language(&self) -> &'static str {
        "cpp17_clang"
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
            "clang++".to_string(),
            "-std=c++17".to_string(),
            "-O2".to_string(),
            "-o".to_string(),
            path_arg(workspace, "main"),
            path_arg(workspace, HARNESS.file_name),
            "-I/usr/include".to_string(),
            "-I/usr/local/include".to_string(),
        ])
    }

    fn run_command(&self, workspace: &Workspace, _limits: &ResourceLimits) -> Vec<String> {
        vec![path_arg(workspace, "main")]
    }
}
