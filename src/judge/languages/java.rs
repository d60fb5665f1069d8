use crate::config::types::Result;
use crate::judge::harness::HarnessTemplate;
use crate::judge::{path_arg, RuntimeAdapter, RuntimeKind};
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::Workspace;

pub const DEFAULT_GSON_JAR: &str = "/opt/invokebox/lib/gson.jar";
pub const GSON_JAR_ENV: &str = "INVOKEBOX_GSON_JAR";

/// Virtual reservation the JVM needs regardless of heap size
pub(crate) const JVM_ADDRESS_SPACE_FLOOR_MB: u64 = 2048;

/// Gson location from the environment, or the packaged default
pub(crate) fn gson_jar_from_env() -> String {
    std::env::var(GSON_JAR_ENV).unwrap_or_else(|_| DEFAULT_GSON_JAR.to_string())
}

/// `java` plus the heap and metaspace options shared by JVM runtimes
pub(crate) fn jvm_command(memory_mb: u64) -> Vec<String> {
    vec![
        "java".to_string(),
        format!("-Xmx{}m", memory_mb),
        "-Xss1m".to_string(),
        "-XX:+UseSerialGC".to_string(),
        "-XX:ReservedCodeCacheSize=64m".to_string(),
        "-XX:CompressedClassSpaceSize=64m".to_string(),
    ]
}

/// Java with Gson. User code is placed inside `public class Main` and defines
/// `static Object handler(Map<String, Object> event)`.
#[derive(Debug, Clone)]
pub struct JavaAdapter {
    language: &'static str,
    gson_jar: String,
}

impl JavaAdapter {
    pub fn new(language: &'static str) -> Self {
        Self::with_gson_jar(language, gson_jar_from_env())
    }

    pub fn with_gson_jar(language: &'static str, gson_jar: impl Into<String>) -> Self {
        Self {
            language,
            gson_jar: gson_jar.into(),
        }
    }

    fn classpath(&self, workspace: &Workspace) -> String {
        format!("{}:{}", workspace.dir().display(), self.gson_jar)
    }
}

pub const HARNESS: HarnessTemplate = HarnessTemplate::new(
    "Main.java",
    r#"import com.google.gson.Gson;
import com.google.gson.GsonBuilder;
import com.google.gson.reflect.TypeToken;
import java.io.ByteArrayOutputStream;
import java.io.IOException;
import java.io.InputStream;
import java.io.PrintStream;
import java.nio.charset.StandardCharsets;
import java.util.*;

public class Main {
    private static final int MAX_EVENT_BYTES = 1048576;

{{USER_CODE}}

    private static String readEvent(InputStream in) throws IOException {
        ByteArrayOutputStream buffer = new ByteArrayOutputStream();
        byte[] chunk = new byte[8192];
        int total = 0;
        int n;
        while (total < MAX_EVENT_BYTES
                && (n = in.read(chunk, 0, Math.min(chunk.length, MAX_EVENT_BYTES - total))) != -1) {
            buffer.write(chunk, 0, n);
            total += n;
        }
        return new String(buffer.toByteArray(), StandardCharsets.UTF_8);
    }

    public static void main(String[] args) {
        PrintStream out = System.out;
        System.setOut(System.err);
        Gson gson = new GsonBuilder().serializeNulls().create();

        Map<String, Object> event;
        try {
            event = gson.fromJson(readEvent(System.in), new TypeToken<Map<String, Object>>() {}.getType());
        } catch (Exception e) {
            System.err.println("Error: Failed to parse input JSON: " + e.getMessage());
            System.exit(1);
            return;
        }

        Object result;
        try {
            result = handler(event);
        } catch (Throwable t) {
            t.printStackTrace();
            System.exit(1);
            return;
        }

        out.println(gson.toJson(result));
        out.flush();
    }
}
"#,
);

impl RuntimeAdapter for JavaAdapter {
    fn language(&self) -> &'static str {
        self.language
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
            "javac".to_string(),
            "-encoding".to_string(),
            "UTF-8".to_string(),
            "-cp".to_string(),
            self.gson_jar.clone(),
            "-d".to_string(),
            workspace.dir().to_string_lossy().into_owned(),
            path_arg(workspace, HARNESS.file_name),
        ])
    }

    fn run_command(&self, workspace: &Workspace, limits: &ResourceLimits) -> Vec<String> {
        let mut cmd = jvm_command(limits.memory_mb);
        cmd.extend(["-cp".to_string(), self.classpath(workspace), "Main".to_string()]);
        cmd
    }

    fn run_limits(&self, configured: ResourceLimits) -> ResourceLimits {
        configured.with_address_space_floor(JVM_ADDRESS_SPACE_FLOOR_MB)
    }
}
