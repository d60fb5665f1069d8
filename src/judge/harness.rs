//! Harness templates with a single user-code insertion point.
//!
//! Rendering splits the template once at the marker, so marker text that
//! appears inside user code is left alone.

pub const USER_CODE_MARKER: &str = "{{USER_CODE}}";

/// Upper bound on the event payload every harness reads from stdin
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// A fixed source template for one runtime
#[derive(Debug, Clone, Copy)]
pub struct HarnessTemplate {
    pub file_name: &'static str,
    source: &'static str,
}

impl HarnessTemplate {
    pub const fn new(file_name: &'static str, source: &'static str) -> Self {
        Self { file_name, source }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    pub fn insertion_points(&self) -> usize {
        self.source.matches(USER_CODE_MARKER).count()
    }

    /// Splice user code into the template
    pub fn render(&self, user_code: &str) -> String {
        match self.source.split_once(USER_CODE_MARKER) {
            Some((head, tail)) => {
                let mut out = String::with_capacity(head.len() + user_code.len() + tail.len());
                out.push_str(head);
                out.push_str(user_code);
                out.push_str(tail);
                out
            }
            None => self.source.to_string(),
        }
    }
}
