//! Runs external commands with a deadline, capturing combined output.

use crate::error::CommandFailure;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs `program args..` in `cwd`. Returns stdout+stderr on success.
///
/// A command still running after `timeout` is killed and reported with
/// `timed_out = true`.
pub fn run(program: &str, args: &[&str], cwd: &Path, timeout: Duration) -> Result<String, CommandFailure> {
    let command_line = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    tracing::debug!(cwd = %cwd.display(), "running `{}`", command_line);

    let failure = |status: Option<i32>, output: String, timed_out: bool| CommandFailure {
        command: command_line.clone(),
        status,
        output,
        timed_out,
    };

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| failure(None, e.to_string(), false))?;

    // Drain pipes on their own threads so a chatty child can't block on a full pipe.
    let stdout_handle = child.stdout.take().map(spawn_reader);
    let stderr_handle = child.stderr.take().map(spawn_reader);

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(e) => return Err(failure(None, e.to_string(), false)),
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };

    let mut output = join_reader(stdout_handle);
    output.push_str(&join_reader(stderr_handle));

    match status {
        None => Err(failure(None, output, true)),
        Some(status) if status.success() => Ok(output),
        Some(status) => Err(failure(status.code(), output, false)),
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_success_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = run("sh", &["-c", "echo hello; echo oops >&2"], dir.path(), Duration::from_secs(5)).unwrap();
        assert!(out.contains("hello"));
        assert!(out.contains("oops"));
    }

    #[test]
    fn test_nonzero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = run("sh", &["-c", "echo 'remote x already exists' >&2; exit 3"], dir.path(), Duration::from_secs(5))
            .unwrap_err();
        assert_eq!(err.status, Some(3));
        assert!(err.already_exists());
        assert!(!err.timed_out);
    }

    #[test]
    fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let start = Instant::now();
        let err = run("sh", &["-c", "exec sleep 5"], dir.path(), Duration::from_millis(200)).unwrap_err();
        assert!(err.timed_out);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let err = run("modsync-no-such-binary", &[], dir.path(), Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.status, None);
    }
}
