use crate::config::types::Result;
use crate::judge::harness::HarnessTemplate;
use crate::judge::{path_arg, RuntimeAdapter, RuntimeKind};
use crate::kernel::rlimit::ResourceLimits;
use crate::safety::workspace::Workspace;

/// C99 with cJSON. User code defines `cJSON* handler(cJSON* event)`.
#[derive(Debug, Clone, Default)]
pub struct CAdapter;

pub const HARNESS: HarnessTemplate = HarnessTemplate::new(
    "main.c",
    r#"#include <stdio.h>
#include <stdlib.h>
#include <string.h>
#include <cjson/cJSON.h>

#define MAX_EVENT_BYTES 1048576

cJSON* handler(cJSON* event);

{{USER_CODE}}

int main(void) {
    static char buffer[MAX_EVENT_BYTES + 1];
    size_t len = fread(buffer, 1, MAX_EVENT_BYTES, stdin);
    buffer[len] = '\0';

    cJSON* event = cJSON_Parse(buffer);
    if (event == NULL) {
        fprintf(stderr, "Error: Failed to parse input JSON\n");
        return 1;
    }

    cJSON* result = handler(event);
    if (result == NULL) {
        fprintf(stderr, "Error: handler returned NULL\n");
        cJSON_Delete(event);
        return 1;
    }

    char* output = cJSON_PrintUnformatted(result);
    if (output == NULL) {
        fprintf(stderr, "Error: Failed to serialize handler result\n");
        return 1;
    }
    printf("%s\n", output);

    free(output);
    if (result != event) {
        cJSON_Delete(result);
    }
    cJSON_Delete(event);
    return 0;
}
"#,
);

impl RuntimeAdapter for CAdapter {
    fn language(&self) -> &'static str {
        "c99"
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
            "gcc".to_string(),
            "-std=c99".to_string(),
            "-O2".to_string(),
            "-o".to_string(),
            path_arg(workspace, "main"),
            path_arg(workspace, HARNESS.file_name),
            "-I/usr/include".to_string(),
            "-I/usr/local/include".to_string(),
            "-L/usr/lib".to_string(),
            "-L/usr/local/lib".to_string(),
            "-lcjson".to_string(),
        ])
    }

    fn run_command(&self, workspace: &Workspace, _limits: &ResourceLimits) -> Vec<String> {
        vec![path_arg(workspace, "main")]
    }
}
