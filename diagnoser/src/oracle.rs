use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::error::DiagnoserError;

/// Substrings LLVM and rustc both emit on an internal-compiler-error. Any
/// match on stderr takes precedence over the exit code (§4.5).
const ICE_MARKERS: [&str; 3] = [
    "please submit a bug report",
    "assertion failed",
    "unreachable executed",
];

/// Outcome of a single oracle invocation, shared by the version and pass
/// bisectors (§4.5, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleOutcome {
    Pass,
    Fail,
    /// The candidate could not be evaluated at all (missing toolchain,
    /// unsupported target) and is excluded from the search rather than
    /// counted as pass or fail.
    Skip,
    /// Internal compiler error — distinct from an ordinary `Fail` so callers
    /// can choose whether to treat it as a stronger signal.
    Ice,
}

/// Result of running one subprocess probe, before classification into an
/// [`OracleOutcome`].
#[derive(Debug)]
pub struct SubprocessResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// How often the poll loop checks whether the child has exited while waiting
/// for `timeout` to elapse.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `cmd args...` to completion or until `timeout` elapses, whichever
/// comes first. On timeout the child is killed and reaped before this
/// function returns, and `timed_out` is set — every subprocess call in the
/// diagnosis pipeline carries a wall-clock budget (§5 "every subprocess call
/// must carry a timeout"), and a bisection run makes dozens of these calls,
/// so a leaked child/thread per timeout is not acceptable.
///
/// `child` stays owned by this function the whole time — it is never moved
/// into another thread — so `kill()` is always reachable from here on the
/// timeout path. Stdout/stderr are drained on background threads only to
/// avoid deadlocking on a full pipe buffer; the exit-wait itself is a plain
/// poll loop against `try_wait`.
pub fn run_subprocess(cmd: &str, args: &[String], timeout: Duration) -> Result<SubprocessResult, DiagnoserError> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                DiagnoserError::ToolchainMissing(cmd.to_string())
            } else {
                DiagnoserError::SubprocessFailed(format!("{cmd}: {err}"))
            }
        })?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let (stdout_tx, stdout_rx) = mpsc::channel();
    let (stderr_tx, stderr_rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = stdout_pipe.take() {
            let _ = pipe.read_to_string(&mut buf);
        }
        let _ = stdout_tx.send(buf);
    });
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = stderr_pipe.take() {
            let _ = pipe.read_to_string(&mut buf);
        }
        let _ = stderr_tx.send(buf);
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    break None;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(err) => return Err(DiagnoserError::SubprocessFailed(err.to_string())),
        }
    };

    match status {
        Some(status) => Ok(SubprocessResult {
            exit_code: status.code(),
            stdout: stdout_rx.recv_timeout(timeout.max(Duration::from_secs(1))).unwrap_or_default(),
            stderr: stderr_rx.recv_timeout(timeout.max(Duration::from_secs(1))).unwrap_or_default(),
            timed_out: false,
        }),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Ok(SubprocessResult {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
            })
        }
    }
}

/// Classifies a finished probe into pass/fail/ice. Timeouts and spawn
/// failures are the caller's responsibility to turn into `Skip` where that's
/// the appropriate response (§5's "on-timeout: kill and record as `fail`,
/// with a note that it was a timeout" — callers that want that behavior
/// check `timed_out` themselves rather than relying on this classifier).
pub fn classify(result: &SubprocessResult) -> OracleOutcome {
    if ICE_MARKERS.iter().any(|marker| result.stderr.to_lowercase().contains(marker)) {
        return OracleOutcome::Ice;
    }
    match result.exit_code {
        Some(0) => OracleOutcome::Pass,
        Some(_) => OracleOutcome::Fail,
        None => OracleOutcome::Fail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_detects_ice_regardless_of_exit_code() {
        let result = SubprocessResult {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: "thread panicked: assertion failed: lhs == rhs".to_string(),
            timed_out: false,
        };
        assert_eq!(classify(&result), OracleOutcome::Ice);
    }

    #[test]
    fn classify_zero_exit_is_pass() {
        let result = SubprocessResult {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
        };
        assert_eq!(classify(&result), OracleOutcome::Pass);
    }

    #[test]
    fn classify_nonzero_exit_is_fail() {
        let result = SubprocessResult {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "error[E0308]: mismatched types".to_string(),
            timed_out: false,
        };
        assert_eq!(classify(&result), OracleOutcome::Fail);
    }

    #[test]
    fn run_subprocess_captures_stdout() {
        let result = run_subprocess("echo", &["hello".to_string()], Duration::from_secs(5)).unwrap();
        assert!(result.stdout.contains("hello"));
        assert_eq!(result.exit_code, Some(0));
    }

    #[test]
    fn run_subprocess_times_out_on_a_slow_command() {
        let result = run_subprocess("sleep", &["5".to_string()], Duration::from_millis(50)).unwrap();
        assert!(result.timed_out);
    }

    #[test]
    fn run_subprocess_kills_the_child_instead_of_waiting_it_out() {
        let start = std::time::Instant::now();
        let result = run_subprocess("sleep", &["5".to_string()], Duration::from_millis(50)).unwrap();
        assert!(result.timed_out);
        // If the child were merely abandoned rather than killed, this call
        // would take the full 5s of the sleep instead of returning shortly
        // after the 50ms timeout.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn run_subprocess_reports_missing_binary_as_toolchain_missing() {
        let err = run_subprocess("trace2pass-no-such-binary", &[], Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, DiagnoserError::ToolchainMissing(_)));
    }
}
