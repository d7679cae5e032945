//! Subprocess plumbing for shelling out to `git` (and `rg`) with bounded
//! timeouts and output buffers.
//!
//! Grounded on the teacher's `git::repository::{Repository, exec_git,
//! exec_git_stdin}` pattern referenced throughout `synopsis/collector.rs`
//! and `git/refs.rs` — `repo.global_args_for_exec()` prefixes every
//! invocation with the repository root, then callers push subcommand args.
//! The teacher's retrieved call sites don't show timeout/buffer enforcement
//! (their wrapper wasn't part of the retrieval pack), so that enforcement is
//! added here to satisfy spec §4.1 / §5's explicit budgets, using the same
//! "spawn, cap, degrade" idiom the teacher uses for subprocess calls to
//! `claude --print` in `synopsis/generator.rs`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// A repository rooted at `root`. All subprocess invocations are run with
/// `-C <root>` so the caller's own working directory is never disturbed.
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
}

impl Repository {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn global_args_for_exec(&self) -> Vec<String> {
        vec!["-C".to_string(), self.root.display().to_string()]
    }

    /// Run `git <args>` with a timeout and a capped output buffer. Returns
    /// `None` on any failure (missing binary, non-zero exit, timeout) —
    /// callers are expected to degrade to a conservative default, never to
    /// propagate the failure (spec §7).
    pub fn run_git(&self, args: &[&str], timeout: Duration, max_bytes: usize) -> Option<String> {
        let mut full_args = self.global_args_for_exec();
        full_args.extend(args.iter().map(|s| s.to_string()));
        run_capped("git", &full_args, timeout, max_bytes)
    }

    /// Run `rg --files` (or similar) rooted at the repository, honoring the
    /// same timeout/buffer discipline. `rg` is the only search dependency
    /// the file-listing path relies on (design notes, §9); if it's absent on
    /// `PATH` the caller degrades to an empty listing.
    pub fn run_rg(&self, args: &[&str], timeout: Duration, max_bytes: usize) -> Option<String> {
        let full_args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        run_capped_in_dir("rg", &full_args, &self.root, timeout, max_bytes)
    }
}

fn run_capped(program: &str, args: &[String], timeout: Duration, max_bytes: usize) -> Option<String> {
    run_capped_in_dir(program, args, Path::new("."), timeout, max_bytes)
}

fn run_capped_in_dir(
    program: &str,
    args: &[String],
    cwd: &Path,
    timeout: Duration,
    max_bytes: usize,
) -> Option<String> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd.spawn().ok()?;
    let stdout = child.stdout.take()?;

    let reader_handle = std::thread::spawn(move || read_capped(stdout, max_bytes));

    let status = match wait_with_timeout(&mut child, timeout) {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            // Drain the reader thread so it doesn't leak, but discard its
            // partial output — a timeout is a conservative-default case.
            let _ = reader_handle.join();
            return None;
        }
    };

    let bytes = reader_handle.join().ok()?;

    if !status.success() {
        return None;
    }

    String::from_utf8(bytes).ok()
}

/// Poll `child` until it exits or `timeout` elapses.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<std::process::ExitStatus> {
    let start = Instant::now();
    loop {
        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }
        if start.elapsed() >= timeout {
            return None;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Read at most `max_bytes` from `reader`, discarding the remainder.
fn read_capped(mut reader: impl Read, max_bytes: usize) -> Vec<u8> {
    let mut buf = vec![0u8; max_bytes.min(64 * 1024).max(1)];
    let mut out = Vec::with_capacity(max_bytes.min(1 << 20));
    loop {
        if out.len() >= max_bytes {
            break;
        }
        let to_read = buf.len().min(max_bytes - out.len());
        match reader.read(&mut buf[..to_read]) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(_) => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_git_version_succeeds() {
        let repo = Repository::at(".");
        let out = repo.run_git(&["--version"], Duration::from_secs(5), 1024);
        assert!(out.is_some());
        assert!(out.unwrap().contains("git version"));
    }

    #[test]
    fn run_git_unknown_subcommand_returns_none() {
        let repo = Repository::at(".");
        let out = repo.run_git(&["not-a-real-subcommand"], Duration::from_secs(5), 1024);
        assert!(out.is_none());
    }

    #[test]
    fn run_capped_missing_binary_returns_none() {
        let out = run_capped("definitely-not-a-real-binary-xyz", &[], Duration::from_secs(1), 1024);
        assert!(out.is_none());
    }

    #[test]
    fn read_capped_truncates_at_max_bytes() {
        let data = b"0123456789".repeat(100);
        let capped = read_capped(&data[..], 50);
        assert_eq!(capped.len(), 50);
    }
}
