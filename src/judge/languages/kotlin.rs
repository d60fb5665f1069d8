use crate::config::types::Result;
use crate::judge::harness::HarnessTemplate;
use crate::judge::languages::java::{gson_jar_from_env, jvm_command, JVM_ADDRESS_SPACE_FLOOR_MB};
use crate::judge::{path_arg, RuntimeAdapter, RuntimeKind};
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::Workspace;

const JAR_FILE: &str = "program.jar";

/// Kotlin on the JVM with Gson. User code defines
/// `object Handler { fun handle(event: Map<String, Any?>): Any? }`.
#[derive(Debug, Clone)]
pub struct KotlinAdapter {
    gson_jar: String,
}

impl KotlinAdapter {
    pub fn new() -> Self {
        Self::with_gson_jar(gson_jar_from_env())
    }

    pub fn with_gson_jar(gson_jar: impl Into<String>) -> Self {
        Self {
            gson_jar: gson_jar.into(),
        }
    }
}

impl Default for KotlinAdapter {
    fn default() -> Self {
        Self::new()
    }
}

pub const HARNESS: HarnessTemplate = HarnessTemplate::new(
    "Main.kt",
    r#"import com.google.gson.GsonBuilder
import com.google.gson.reflect.TypeToken
import kotlin.system.exitProcess

{{USER_CODE}}

const val MAX_EVENT_BYTES = 1048576

fun main() {
    val out = System.out
    System.setOut(System.err)
    val gson = GsonBuilder().serializeNulls().create()

    val event: Map<String, Any?> = try {
        val raw = String(System.`in`.readNBytes(MAX_EVENT_BYTES), Charsets.UTF_8)
        gson.fromJson(raw, object : TypeToken<Map<String, Any?>>() {}.type)
    } catch (e: Exception) {
        System.err.println("Error: Failed to parse input JSON: ${e.message}")
        exitProcess(1)
    }

    val result = try {
        Handler.handle(event)
    } catch (t: Throwable) {
        t.printStackTrace()
        exitProcess(1)
    }

    out.println(gson.toJson(result))
    out.flush()
}
"#,
);

impl RuntimeAdapter for KotlinAdapter {
    fn language(&self) -> &'static str {
        "kotlin"
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
            "kotlinc".to_string(),
            "-cp".to_string(),
            self.gson_jar.clone(),
            "-include-runtime".to_string(),
            "-nowarn".to_string(),
            "-d".to_string(),
            path_arg(workspace, JAR_FILE),
            path_arg(workspace, HARNESS.file_name),
        ])
    }

    fn run_command(&self, workspace: &Workspace, limits: &ResourceLimits) -> Vec<String> {
        let mut cmd = jvm_command(limits.memory_mb);
        cmd.extend([
            "-cp".to_string(),
            format!("{}:{}", path_arg(workspace, JAR_FILE), self.gson_jar),
            "MainKt".to_string(),
        ]);
        cmd
    }

    fn run_limits(&self, configured: ResourceLimits) -> ResourceLimits {
        configured.with_address_space_floor(JVM_ADDRESS_SPACE_FLOOR_MB)
    }
}
