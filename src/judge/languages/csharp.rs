use crate::config::types::Result;
use crate::judge::harness::HarnessTemplate;
use crate::judge::{path_arg, RuntimeAdapter, RuntimeKind};
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::Workspace;

pub const DEFAULT_TARGET_FRAMEWORK: &str = "net8.0";
pub const TARGET_FRAMEWORK_ENV: &str = "INVOKEBOX_DOTNET_TARGET";

const PROJECT_FILE: &str = "Handler.csproj";
const OUTPUT_DIR: &str = "bin";

/// CoreCLR reserves executable and GC ranges well beyond the managed heap
const CLR_ADDRESS_SPACE_FLOOR_MB: u64 = 4096;

/// C# on .NET with System.Text.Json. User code defines
/// `static class Handler { public static object? Run(JsonElement evt) }`.
#[derive(Debug, Clone)]
pub struct CSharpAdapter {
    target_framework: String,
}

impl CSharpAdapter {
    pub fn new() -> Self {
        let target = std::env::var(TARGET_FRAMEWORK_ENV)
            .unwrap_or_else(|_| DEFAULT_TARGET_FRAMEWORK.to_string());
        Self::with_target_framework(target)
    }

    pub fn with_target_framework(target_framework: impl Into<String>) -> Self {
        Self {
            target_framework: target_framework.into(),
        }
    }

    fn project(&self) -> String {
        format!(
            r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <OutputType>Exe</OutputType>
    <TargetFramework>{}</TargetFramework>
    <AssemblyName>Handler</AssemblyName>
    <Nullable>enable</Nullable>
    <InvariantGlobalization>true</InvariantGlobalization>
    <TreatWarningsAsErrors>false</TreatWarningsAsErrors>
  </PropertyGroup>
</Project>
"#,
            self.target_framework
        )
    }
}

impl Default for CSharpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

pub const HARNESS: HarnessTemplate = HarnessTemplate::new(
    "Program.cs",
    r#"using System;
using System.Collections.Generic;
using System.IO;
using System.Linq;
using System.Text.Json;

{{USER_CODE}}

static class InvokeboxEntry
{
    const int MaxEventBytes = 1048576;

    static int Main()
    {
        var stdin = Console.OpenStandardInput();
        var buffer = new byte[MaxEventBytes];
        int total = 0;
        int read;
        while (total < buffer.Length && (read = stdin.Read(buffer, total, buffer.Length - total)) > 0)
        {
            total += read;
        }

        JsonElement evt;
        try
        {
            using var document = JsonDocument.Parse(new ReadOnlyMemory<byte>(buffer, 0, total));
            evt = document.RootElement.Clone();
        }
        catch (JsonException e)
        {
            Console.Error.WriteLine($"Error: Failed to parse input JSON: {e.Message}");
            return 1;
        }

        var stdout = Console.Out;
        Console.SetOut(Console.Error);
        object? result;
        try
        {
            result = Handler.Run(evt);
        }
        catch (Exception e)
        {
            Console.Error.WriteLine(e.ToString());
            return 1;
        }
        finally
        {
            Console.SetOut(stdout);
        }

        stdout.WriteLine(JsonSerializer.Serialize(result));
        stdout.Flush();
        return 0;
    }
}
"#,
);

impl RuntimeAdapter for CSharpAdapter {
    fn language(&self) -> &'static str {
        "csharp"
    }

    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Compiled
    }

    fn stage(&self, code: &str, workspace: &Workspace) -> Result<()> {
        workspace.write_file(PROJECT_FILE, self.project().as_bytes())?;
        workspace.write_file(HARNESS.file_name, HARNESS.render(code).as_bytes())?;
        Ok(())
    }

    fn compile_command(&self, workspace: &Workspace) -> Option<Vec<String>> {
        Some(vec![
            "dotnet".to_string(),
            "build".to_string(),
            path_arg(workspace, PROJECT_FILE),
            "-c".to_string(),
            "Release".to_string(),
            "-o".to_string(),
            path_arg(workspace, OUTPUT_DIR),
            "--nologo".to_string(),
            // No build servers outliving the compile stage.
            "-nodeReuse:false".to_string(),
            "-p:UseSharedCompilation=false".to_string(),
        ])
    }

    fn run_command(&self, workspace: &Workspace, limits: &ResourceLimits) -> Vec<String> {
        let heap_bytes = limits.memory_mb.saturating_mul(1024 * 1024);
        vec![
            "env".to_string(),
            format!("DOTNET_GCHeapHardLimit={:#x}", heap_bytes),
            "dotnet".to_string(),
            workspace
                .path(OUTPUT_DIR)
                .join("Handler.dll")
                .to_string_lossy()
                .into_owned(),
        ]
    }

    fn environment(&self, _workspace: &Workspace) -> Vec<(String, String)> {
        vec![
            ("DOTNET_CLI_TELEMETRY_OPTOUT".to_string(), "1".to_string()),
            ("DOTNET_NOLOGO".to_string(), "1".to_string()),
            ("DOTNET_SKIP_FIRST_TIME_EXPERIENCE".to_string(), "1".to_string()),
            ("NUGET_PACKAGES".to_string(), "/tmp/nuget-packages".to_string()),
            (
                "PATH".to_string(),
                "/usr/share/dotnet:/usr/lib/dotnet:/usr/local/bin:/usr/bin:/bin".to_string(),
            ),
        ]
    }

    fn run_limits(&self, configured: ResourceLimits) -> ResourceLimits {
        configured.with_address_space_floor(CLR_ADDRESS_SPACE_FLOOR_MB)
    }
}
