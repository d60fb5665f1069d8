/// Spawns one child, feeds it stdin, drains its output and enforces the
/// wall-clock budget.
///
/// The child becomes the leader of its own process group so that a timeout
/// (or a normal exit leaving background processes behind) can be cleaned up
/// with a single `killpg`. Untrusted code is never asked to stop; it is
/// killed.
use crate::config::types::{InvokeError, Result};
use crate::core::types::{ProcessExit, ProcessReport, ProcessSpec};
use crate::kernel::signal::{kill_process_group, terminate_process_group};
use crate::utils::output::{OutputCollector, OutputLimits};
use std::io::Write;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Run a child process to completion or until its wall-clock budget expires.
///
/// Errors are orchestration faults only (spawn or wait failures); anything
/// the child itself does is reported through [`ProcessReport`].
pub fn run_process(spec: &ProcessSpec, output_limits: &OutputLimits) -> Result<ProcessReport> {
    if spec.command.is_empty() {
        return Err(InvokeError::Config("Empty command provided".to_string()));
    }

    let mut cmd = Command::new(&spec.command[0]);
    cmd.args(&spec.command[1..])
        .current_dir(&spec.workdir)
        .env_clear()
        .envs(&spec.environment)
        .stdin(if spec.stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    let limits = spec.limits;
    // SAFETY: the hook runs between fork and exec and only issues
    // async-signal-safe syscalls (prctl, setrlimit, write).
    unsafe {
        cmd.pre_exec(move || {
            #[cfg(target_os = "linux")]
            {
                // Never outlive a crashed worker.
                let _ = nix::sys::prctl::set_pdeathsig(nix::sys::signal::Signal::SIGKILL);
            }
            nix::sys::stat::umask(nix::sys::stat::Mode::from_bits_truncate(0o077));
            if let Some(limits) = limits {
                limits.apply_in_child();
            }
            Ok(())
        });
    }

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|e| {
        InvokeError::Process(format!("Failed to start {}: {}", spec.program(), e))
    })?;
    let pid = child.id();
    log::debug!("Spawned {} as pid {}", spec.program(), pid);

    let pending = OutputCollector::new(output_limits.clone())
        .start(child.stdout.take(), child.stderr.take());

    if let (Some(data), Some(mut stdin)) = (spec.stdin_data.clone(), child.stdin.take()) {
        // A child that never reads stdin must not stall the supervisor.
        thread::spawn(move || {
            if let Err(e) = stdin.write_all(&data) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    log::debug!("Failed to write child stdin: {}", e);
                }
            }
        });
    }

    let exit = loop {
        match leader_exited(pid) {
            Ok(true) => {
                // The unreaped leader still pins the pgid, so the group kill
                // cannot reach a recycled group.
                kill_process_group(pid);
                let status = child.wait().map_err(|e| {
                    InvokeError::Process(format!("Failed to reap {}: {}", spec.program(), e))
                })?;
                break match (status.code(), status.signal()) {
                    (Some(code), _) => ProcessExit::Exited(code),
                    (None, Some(sig)) => ProcessExit::Signaled(sig),
                    (None, None) => ProcessExit::Exited(-1),
                };
            }
            Ok(false) => {
                if start.elapsed() >= spec.wall_time_limit {
                    log::debug!("pid {} exceeded {:?}, terminating group", pid, spec.wall_time_limit);
                    terminate_process_group(pid);
                    // The child may have left its group; it is killed by pid regardless.
                    let _ = child.kill();
                    let _ = child.wait();
                    break ProcessExit::TimedOut;
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill_process_group(pid);
                let _ = child.kill();
                let _ = child.wait();
                return Err(InvokeError::Process(format!(
                    "Process monitoring error for {}: {}",
                    spec.program(),
                    e
                )));
            }
        }
    };
    let wall_time = start.elapsed();

    let output = pending.finish();
    Ok(ProcessReport {
        exit,
        stdout: output.stdout.lossy(),
        stderr: output.stderr.lossy(),
        wall_time,
        notes: output.integrity_notes(),
    })
}

/// Whether the child has exited, without reaping it.
fn leader_exited(pid: u32) -> std::io::Result<bool> {
    // SAFETY: siginfo_t is plain data and waitid only writes into it.
    let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
    let rc = unsafe {
        libc::waitid(
            libc::P_PID,
            pid as libc::id_t,
            &mut info,
            libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // With WNOHANG, si_pid stays zero while the child is still running.
    Ok(unsafe { info.si_pid() } != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::rlimit::ResourceLimits;

    fn sh(script: &str, wall: Duration) -> ProcessSpec {
        let mut spec = ProcessSpec::new(
            vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()],
            std::env::temp_dir(),
            wall,
        );
        spec.environment
            .insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        spec
    }

    #[test]
    fn test_captures_stdout_and_stderr() {
        let spec = sh("echo out; echo err >&2", Duration::from_secs(10));
        let report = run_process(&spec, &OutputLimits::default()).unwrap();
        assert!(report.success());
        assert_eq!(report.stdout, "out\n");
        assert_eq!(report.stderr, "err\n");
        assert!(report.notes.is_empty());
    }

    #[test]
    fn test_feeds_stdin() {
        let mut spec = sh("exec cat", Duration::from_secs(10));
        spec.stdin_data = Some(b"{\"a\":1}".to_vec());
        let report = run_process(&spec, &OutputLimits::default()).unwrap();
        assert_eq!(report.stdout, "{\"a\":1}");
    }

    #[test]
    fn test_non_zero_exit() {
        let spec = sh("exit 7", Duration::from_secs(10));
        let report = run_process(&spec, &OutputLimits::default()).unwrap();
        assert_eq!(report.exit, ProcessExit::Exited(7));
    }

    #[test]
    fn test_wall_clock_timeout_kills() {
        let spec = sh("exec sleep 30", Duration::from_millis(300));
        let start = Instant::now();
        let report = run_process(&spec, &OutputLimits::default()).unwrap();
        assert!(report.timed_out());
        assert!(report.wall_time >= Duration::from_millis(300));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_background_children_do_not_hold_pipes() {
        let spec = sh("sleep 30 & echo done", Duration::from_secs(10));
        let start = Instant::now();
        let report = run_process(&spec, &OutputLimits::default()).unwrap();
        assert!(report.success());
        assert_eq!(report.stdout, "done\n");
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    fn program_available(program: &str) -> bool {
        Command::new(program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Dead means gone from /proc or a zombie awaiting its reaper
    fn process_is_dead(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map(|rest| rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => true,
        }
    }

    #[test]
    fn test_timeout_kills_child_that_left_its_group() {
        if !program_available("python3") {
            eprintln!("skipping: python3 not available");
            return;
        }
        // Joins the supervisor's own group so the group kill misses it.
        let script = "import os, time\nos.setpgid(0, os.getpgid(os.getppid()))\ntime.sleep(30)\n";
        let mut spec = ProcessSpec::new(
            vec!["python3".to_string(), "-c".to_string(), script.to_string()],
            std::env::temp_dir(),
            Duration::from_millis(500),
        );
        spec.environment
            .insert("PATH".to_string(), "/usr/local/bin:/usr/bin:/bin".to_string());

        let start = Instant::now();
        let report = run_process(&spec, &OutputLimits::default()).unwrap();
        assert!(report.timed_out());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_stragglers_killed_after_normal_exit() {
        let spec = sh("sleep 30 & echo $!", Duration::from_secs(10));
        let report = run_process(&spec, &OutputLimits::default()).unwrap();
        assert!(report.success());
        let straggler: i32 = report.stdout.trim().parse().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !process_is_dead(straggler) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(process_is_dead(straggler));
    }

    #[test]
    fn test_environment_is_not_inherited() {
        std::env::set_var("INVOKEBOX_SECRET_FOR_TEST", "leak");
        let spec = sh("echo \"[$INVOKEBOX_SECRET_FOR_TEST]\"", Duration::from_secs(10));
        let report = run_process(&spec, &OutputLimits::default()).unwrap();
        assert_eq!(report.stdout, "[]\n");
    }

    #[test]
    fn test_limits_applied_in_child() {
        let mut spec = sh("ulimit -n; ulimit -t", Duration::from_secs(10));
        spec.limits = Some(ResourceLimits {
            cpu_time_secs: 7,
            ..ResourceLimits::default()
        });
        let report = run_process(&spec, &OutputLimits::default()).unwrap();
        assert!(report.success(), "stderr: {}", report.stderr);
        let lines: Vec<&str> = report.stdout.lines().collect();
        assert_eq!(lines, vec!["256", "7"]);
    }

    #[test]
    fn test_failed_ceiling_does_not_abort() {
        let mut spec = sh("ulimit -t", Duration::from_secs(10));
        spec.limits = Some(ResourceLimits {
            cpu_time_secs: 9,
            // Above any fs.nr_open, so setrlimit fails even for root
            open_files: 1 << 40,
            ..ResourceLimits::default()
        });
        let report = run_process(&spec, &OutputLimits::default()).unwrap();
        assert!(report.success());
        assert_eq!(report.stdout.trim(), "9");
        assert!(report.stderr.contains("could not set RLIMIT_NOFILE"));
    }

    #[test]
    fn test_missing_program_is_process_error() {
        let spec = ProcessSpec::new(
            vec!["/nonexistent/binary".to_string()],
            std::env::temp_dir(),
            Duration::from_secs(1),
        );
        let err = run_process(&spec, &OutputLimits::default()).unwrap_err();
        assert!(matches!(err, InvokeError::Process(_)));
        assert!(err.to_string().contains("/nonexistent/binary"));
    }
}
