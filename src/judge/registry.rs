use crate::config::types::{InvokeError, Result};
use crate::judge::languages::{
    c::CAdapter, cpp::CppAdapter, csharp::CSharpAdapter, go::GoAdapter, java::JavaAdapter,
    javascript::JavaScriptAdapter, kotlin::KotlinAdapter, python::PythonAdapter,
    ruby::RubyAdapter, rust::RustAdapter, swift::SwiftAdapter,
};
use crate::judge::RuntimeAdapter;

/// Canonical runtime ids, one per queue
const SUPPORTED: &[&str] = &[
    "c99",
    "cpp17_clang",
    "golang",
    "rust",
    "java11",
    "java17",
    "java21",
    "kotlin",
    "csharp",
    "swift",
    "python",
    "pypy3",
    "javascript",
    "ruby",
];

pub fn supported_languages() -> Vec<&'static str> {
    SUPPORTED.to_vec()
}

/// Resolve a runtime id or alias to its adapter
pub fn adapter_for(language: &str) -> Result<Box<dyn RuntimeAdapter>> {
    match language.trim().to_ascii_lowercase().as_str() {
        "c99" | "c" => Ok(Box::new(CAdapter)),
        "cpp17_clang" | "cpp" | "c++" => Ok(Box::new(CppAdapter)),
        "golang" | "go" => Ok(Box::new(GoAdapter)),
        "rust" | "rs" => Ok(Box::new(RustAdapter)),
        "java11" => Ok(Box::new(JavaAdapter::new("java11"))),
        "java17" | "java" => Ok(Box::new(JavaAdapter::new("java17"))),
        "java21" => Ok(Box::new(JavaAdapter::new("java21"))),
        "kotlin" | "kt" => Ok(Box::new(KotlinAdapter::new())),
        "csharp" | "cs" | "c#" | "dotnet" => Ok(Box::new(CSharpAdapter::new())),
        "swift" => Ok(Box::new(SwiftAdapter)),
        "python" | "py" | "python3" => Ok(Box::new(PythonAdapter::cpython())),
        "pypy3" | "pypy" => Ok(Box::new(PythonAdapter::pypy())),
        "javascript" | "js" | "node" => Ok(Box::new(JavaScriptAdapter)),
        "ruby" | "rb" => Ok(Box::new(RubyAdapter)),
        _ => Err(InvokeError::UnsupportedLanguage(language.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::harness::MAX_EVENT_BYTES;
    use crate::judge::languages::{c, cpp, csharp, go, java, kotlin, rust, swift};
    use crate::judge::RuntimeKind;
    use crate::kernel::rlimit::ResourceLimits;
    use crate::safety::workspace::Workspace;
    use tempfile::TempDir;

    #[test]
    fn test_every_supported_id_resolves_to_itself() {
        for id in supported_languages() {
            let adapter = adapter_for(id).unwrap();
            assert_eq!(adapter.language(), id);
        }
    }

    #[test]
    fn test_aliases_map_to_canonical_ids() {
        assert_eq!(adapter_for("py").unwrap().language(), "python");
        assert_eq!(adapter_for("JS").unwrap().language(), "javascript");
        assert_eq!(adapter_for("go").unwrap().language(), "golang");
        assert_eq!(adapter_for("java").unwrap().language(), "java17");
        assert_eq!(adapter_for("cpp").unwrap().language(), "cpp17_clang");
        assert_eq!(adapter_for("kt").unwrap().language(), "kotlin");
        assert_eq!(adapter_for("C#").unwrap().language(), "csharp");
    }

    #[test]
    fn test_unknown_language_rejected() {
        match adapter_for("cobol") {
            Err(InvokeError::UnsupportedLanguage(name)) => assert_eq!(name, "cobol"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("cobol should not resolve"),
        }
    }

    #[test]
    fn test_harness_templates_have_one_insertion_point() {
        let templates = [
            c::HARNESS,
            cpp::HARNESS,
            go::HARNESS,
            rust::HARNESS,
            java::HARNESS,
            kotlin::HARNESS,
            csharp::HARNESS,
            swift::HARNESS,
        ];
        for template in templates {
            assert_eq!(template.insertion_points(), 1, "{}", template.file_name);
            assert!(
                template.source().contains(&MAX_EVENT_BYTES.to_string()),
                "{} does not bound the event size",
                template.file_name
            );
        }
    }

    #[test]
    fn test_compiled_and_interpreted_shapes() {
        let root = TempDir::new().unwrap();
        let workspace = Workspace::create(root.path()).unwrap();

        for id in supported_languages() {
            let adapter = adapter_for(id).unwrap();
            let compile = adapter.compile_command(&workspace);
            match adapter.kind() {
                RuntimeKind::Compiled => assert!(compile.is_some(), "{} should compile", id),
                RuntimeKind::Interpreted => assert!(compile.is_none(), "{} should not compile", id),
            }
            let run = adapter.run_command(&workspace, &ResourceLimits::default());
            assert!(!run.is_empty());
        }
    }

    #[test]
    fn test_stage_splices_user_code() {
        let root = TempDir::new().unwrap();
        let workspace = Workspace::create(root.path()).unwrap();
        let adapter = adapter_for("c99").unwrap();

        adapter
            .stage("cJSON* handler(cJSON* event) { return event; }", &workspace)
            .unwrap();
        let source = std::fs::read_to_string(workspace.path("main.c")).unwrap();
        assert!(source.contains("cJSON* handler(cJSON* event) { return event; }"));
        assert!(!source.contains("{{USER_CODE}}"));
        assert!(source.find("handler(cJSON* event) {").unwrap() < source.find("int main").unwrap());
    }

    #[test]
    fn test_rust_adapter_stages_cargo_project() {
        let root = TempDir::new().unwrap();
        let workspace = Workspace::create(root.path()).unwrap();
        let adapter = adapter_for("rust").unwrap();

        adapter
            .stage("fn handler(event: Value) -> Value { event }", &workspace)
            .unwrap();
        assert!(workspace.path("Cargo.toml").exists());
        assert!(workspace.path("src/main.rs").exists());
        let env = adapter.environment(&workspace);
        assert!(env.iter().any(|(k, _)| k == "CARGO_TARGET_DIR"));
    }
}
