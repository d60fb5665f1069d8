use crate::config::types::Result;
use crate::judge::harness::HarnessTemplate;
use crate::judge::{path_arg, RuntimeAdapter, RuntimeKind};
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::Workspace;

/// Swift with Foundation's JSONSerialization. User code defines
/// `func handler(event: [String: Any]) -> Any`.
#[derive(Debug, Clone, Default)]
pub struct SwiftAdapter;

// Top-level code in main.swift: user declarations first, then the entry
// sequence. JSONSerialization traps on values it cannot encode, so the result
// is checked before writing.
pub const HARNESS: HarnessTemplate = HarnessTemplate::new(
    "main.swift",
    r#"import Foundation

{{USER_CODE}}

let maxEventBytes = 1048576

func isEncodable(_ value: Any) -> Bool {
    if JSONSerialization.isValidJSONObject(value) {
        return true
    }
    return value is String || value is NSNumber || value is NSNull
        || value is Int || value is Double || value is Bool
}

let rawEvent = FileHandle.standardInput.readData(ofLength: maxEventBytes)
guard let parsedEvent = try? JSONSerialization.jsonObject(with: rawEvent, options: [.fragmentsAllowed]),
      let event = parsedEvent as? [String: Any] else {
    fputs("Error: Failed to parse input JSON\n", stderr)
    exit(1)
}

let result = handler(event: event)

guard isEncodable(result),
      let encoded = try? JSONSerialization.data(withJSONObject: result, options: [.fragmentsAllowed]),
      let text = String(data: encoded, encoding: .utf8) else {
    fputs("Error: handler result is not JSON-serializable\n", stderr)
    exit(1)
}
print(text)
"#,
);

impl RuntimeAdapter for SwiftAdapter {
    fn language(&self) -> &'static str {
        "swift"
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
            "swiftc".to_string(),
            "-O".to_string(),
            "-module-cache-path".to_string(),
            path_arg(workspace, "module-cache"),
            "-o".to_string(),
            path_arg(workspace, "main"),
            path_arg(workspace, HARNESS.file_name),
        ])
    }

    fn run_command(&self, workspace: &Workspace, _limits: &ResourceLimits) -> Vec<String> {
        vec![path_arg(workspace, "main")]
    }

    fn environment(&self, _workspace: &Workspace) -> Vec<(String, String)> {
        vec![(
            "PATH".to_string(),
            "/usr/share/swift/usr/bin:/usr/local/bin:/usr/bin:/bin".to_string(),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_compiles_into_workspace() {
        let root = TempDir::new().unwrap();
        let workspace = Workspace::create(root.path()).unwrap();
        let adapter = SwiftAdapter;

        let compile = adapter.compile_command(&workspace).unwrap();
        assert_eq!(compile[0], "swiftc");
        let cache = compile
            .iter()
            .position(|arg| arg == "-module-cache-path")
            .map(|i| compile[i + 1].clone())
            .unwrap();
        assert!(std::path::Path::new(&cache).starts_with(workspace.dir()));
        assert_eq!(
            adapter.run_command(&workspace, &ResourceLimits::default()),
            vec![path_arg(&workspace, "main")]
        );
    }

    #[test]
    fn test_event_read_from_stdin() {
        let source = HARNESS.source();
        assert!(source.contains("FileHandle.standardInput.readData(ofLength: maxEventBytes)"));
        assert!(source.contains("handler(event: event)"));
    }
}
