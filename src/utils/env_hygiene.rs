/// Environment hygiene for sandboxed children.
///
/// Children never inherit the worker's environment (which holds queue
/// credentials and host paths). They get a small deterministic set plus
/// whatever the runtime adapter asks for.
use std::collections::BTreeMap;
use std::path::Path;

/// Loader variables that are never forwarded, even if an adapter asks
const BLOCKED_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "LD_AUDIT",
    "LD_BIND_NOW",
    "LD_DEBUG",
    "LD_PROFILE",
    "LD_USE_LOAD_BIAS",
    "LD_DYNAMIC_WEAK",
];

/// Environment sanitization policy
#[derive(Debug, Clone)]
pub struct EnvPolicy {
    pub path: String,
    pub locale: String,
}

impl Default for EnvPolicy {
    fn default() -> Self {
        EnvPolicy {
            path: "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".to_string(),
            locale: "C.UTF-8".to_string(),
        }
    }
}

impl EnvPolicy {
    /// Build the complete child environment for a workspace.
    ///
    /// `HOME` and the temp variables point into the workspace so anything a
    /// program drops there is removed with it.
    pub fn build(&self, workdir: &Path, extra: &[(String, String)]) -> BTreeMap<String, String> {
        let workdir = workdir.to_string_lossy().into_owned();
        let mut env = BTreeMap::new();
        env.insert("PATH".to_string(), self.path.clone());
        env.insert("HOME".to_string(), workdir.clone());
        env.insert("LANG".to_string(), self.locale.clone());
        env.insert("LC_ALL".to_string(), self.locale.clone());
        env.insert("TMPDIR".to_string(), workdir.clone());
        env.insert("TEMP".to_string(), workdir.clone());
        env.insert("TMP".to_string(), workdir);

        for (key, value) in extra {
            if BLOCKED_VARS.contains(&key.as_str()) {
                log::warn!("Refusing to forward loader variable {} to sandbox", key);
                continue;
            }
            env.insert(key.clone(), value.clone());
        }
        env
    }
}
