/// Resource ceilings for sandboxed children.
///
/// Ceilings are applied inside the freshly forked child, after fork and before
/// exec, so they bind the user program from its first instruction and never
/// touch the worker process itself. Everything on the apply path must stay
/// async-signal-safe: no allocation, no locks, no `log` calls.
use nix::sys::resource::{setrlimit, Resource};

const MIB: u64 = 1024 * 1024;

/// Independently configurable OS ceilings for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// RLIMIT_CPU soft ceiling; SIGXCPU is delivered here
    pub cpu_time_secs: u64,
    /// Extra seconds between the soft and hard CPU ceilings (SIGKILL)
    pub cpu_grace_secs: u64,
    /// RLIMIT_AS, soft = hard
    pub memory_mb: u64,
    /// RLIMIT_NOFILE
    pub open_files: u64,
    /// RLIMIT_NPROC
    pub processes: u64,
    /// RLIMIT_FSIZE in bytes
    pub file_size_bytes: u64,
    /// RLIMIT_CORE in bytes
    pub core_bytes: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_time_secs: 30,
            cpu_grace_secs: 5,
            memory_mb: 512,
            open_files: 256,
            processes: 50,
            file_size_bytes: 10 * MIB,
            core_bytes: 0,
        }
    }
}

/// One resolved `setrlimit` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ceiling {
    pub name: &'static str,
    pub resource: Resource,
    pub soft: u64,
    pub hard: u64,
}

impl ResourceLimits {
    pub fn memory_bytes(&self) -> u64 {
        self.memory_mb.saturating_mul(MIB)
    }

    /// Raise the address-space ceiling to at least `floor_mb`.
    ///
    /// Used by runtimes that reserve large virtual ranges up front (V8, JVM);
    /// those adapters bound their managed heap with the runtime's own flags.
    pub fn with_address_space_floor(mut self, floor_mb: u64) -> Self {
        self.memory_mb = self.memory_mb.max(floor_mb);
        self
    }

    pub fn ceilings(&self) -> [Ceiling; 6] {
        [
            Ceiling {
                name: "RLIMIT_CPU",
                resource: Resource::RLIMIT_CPU,
                soft: self.cpu_time_secs,
                hard: self.cpu_time_secs.saturating_add(self.cpu_grace_secs),
            },
            Ceiling {
                name: "RLIMIT_AS",
                resource: Resource::RLIMIT_AS,
                soft: self.memory_bytes(),
                hard: self.memory_bytes(),
            },
            Ceiling {
                name: "RLIMIT_NOFILE",
                resource: Resource::RLIMIT_NOFILE,
                soft: self.open_files,
                hard: self.open_files,
            },
            Ceiling {
                name: "RLIMIT_NPROC",
                resource: Resource::RLIMIT_NPROC,
                soft: self.processes,
                hard: self.processes,
            },
            Ceiling {
                name: "RLIMIT_FSIZE",
                resource: Resource::RLIMIT_FSIZE,
                soft: self.file_size_bytes,
                hard: self.file_size_bytes,
            },
            Ceiling {
                name: "RLIMIT_CORE",
                resource: Resource::RLIMIT_CORE,
                soft: self.core_bytes,
                hard: self.core_bytes,
            },
        ]
    }

    /// Apply every ceiling to the calling process.
    ///
    /// A ceiling that cannot be set is reported on stderr and skipped; the
    /// rest are still applied. Returns the number of ceilings that failed.
    /// Must only be called in a child between fork and exec.
    pub fn apply_in_child(&self) -> usize {
        let mut failed = 0;
        for ceiling in self.ceilings() {
            if setrlimit(ceiling.resource, ceiling.soft, ceiling.hard).is_err() {
                warn_raw(ceiling.name);
                failed += 1;
            }
        }
        failed
    }
}

/// Write a fixed warning to fd 2 without allocating
fn warn_raw(name: &'static str) {
    const PREFIX: &[u8] = b"[limiter] warning: could not set ";
    const SUFFIX: &[u8] = b", continuing\n";
    // SAFETY: write(2) is async-signal-safe and every buffer is 'static.
    unsafe {
        libc::write(2, PREFIX.as_ptr().cast(), PREFIX.len());
        libc::write(2, name.as_ptr().cast(), name.len());
        libc::write(2, SUFFIX.as_ptr().cast(), SUFFIX.len());
    }
}
