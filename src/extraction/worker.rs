//! Extraction worker adapter
//!
//! Runs the external extraction engine as a child process, one per request:
//!
//! ```text
//!   <program> <args...> <artifact path>
//!        │
//!        ├── stdout ──▶ drain loop ──▶ stdout buffer
//!        ├── stderr ──▶ drain loop ──▶ stderr buffer (also logged)
//!        └── exit   ──────────────────▶ exit code
//! ```
//!
//! Both pipes are drained to EOF concurrently with `wait()`, and the result
//! is only produced once all three have completed, so callers always see the
//! full output. The adapter does not interpret the buffers.
//!
//! Children are spawned with `kill_on_drop`: if the request future is dropped
//! (client went away) the worker is killed rather than left running. A
//! per-invocation timeout kills and reaps the worker the same way.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::WorkerConfig;

const READ_CHUNK: usize = 8 * 1024;

/// Everything the worker produced, captured after it exited.
#[derive(Debug, Clone, Default)]
pub struct WorkerOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,

    /// Exit code; `None` when the worker was killed, timed out or never started
    pub exit_code: Option<i32>,

    pub timed_out: bool,
    pub duration_ms: u64,
}

impl WorkerOutput {
    /// Output for a worker that could not be launched at all.
    pub fn launch_failure(message: impl Into<String>) -> Self {
        Self {
            stderr: message.into(),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Seam between the request pipeline and whatever actually runs extraction.
#[async_trait]
pub trait ExtractionWorker: Send + Sync {
    /// Run the worker against one artifact and wait for it to finish.
    async fn run(&self, artifact_path: &Path) -> WorkerOutput;
}

/// Runs the extraction engine as a child process.
#[derive(Debug, Clone)]
pub struct ProcessWorker {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl ProcessWorker {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            max_output_bytes: 16 * 1024 * 1024,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone(), config.timeout())
            .with_max_output(config.max_output_bytes)
    }

    /// Cap on each captured stream; bytes past it are read and dropped.
    pub fn with_max_output(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }
}

#[async_trait]
impl ExtractionWorker for ProcessWorker {
    async fn run(&self, artifact_path: &Path) -> WorkerOutput {
        let start = Instant::now();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(artifact_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to launch extraction worker {:?}: {}", self.program, e);
                return WorkerOutput::launch_failure(format!(
                    "failed to launch extraction worker '{}': {}",
                    self.program, e
                ));
            }
        };
        debug!(pid = ?child.id(), path = ?artifact_path, "Extraction worker started");

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill().await;
            return WorkerOutput::launch_failure("extraction worker pipes were not captured");
        };

        let limit = self.max_output_bytes;
        let collected = tokio::time::timeout(self.timeout, async {
            tokio::join!(
                drain(stdout, limit, "stdout"),
                drain(stderr, limit, "stderr"),
                child.wait()
            )
        })
        .await;

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match collected {
            Ok((stdout, stderr, status)) => {
                let stderr = String::from_utf8_lossy(&stderr).into_owned();
                if !stderr.trim().is_empty() {
                    warn!("Extraction worker stderr: {}", stderr.trim_end());
                }
                let exit_code = match status {
                    Ok(status) => status.code(),
                    Err(e) => {
                        warn!("Failed to wait on extraction worker: {}", e);
                        None
                    }
                };
                debug!(?exit_code, duration_ms, "Extraction worker finished");

                WorkerOutput {
                    stdout,
                    stderr,
                    exit_code,
                    timed_out: false,
                    duration_ms,
                }
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Extraction worker timed out, killing"
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed-out extraction worker: {}", e);
                }

                WorkerOutput {
                    stdout: Vec::new(),
                    stderr: format!(
                        "extraction worker timed out after {}s",
                        self.timeout.as_secs_f64()
                    ),
                    exit_code: None,
                    timed_out: true,
                    duration_ms,
                }
            }
        }
    }
}

/// Read a pipe to EOF, keeping at most `limit` bytes. Read errors end the
/// stream early; whatever arrived before is kept.
async fn drain<R>(mut pipe: R, limit: usize, name: &'static str) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut discarded = 0usize;

    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(buf.len());
                let keep = n.min(room);
                buf.extend_from_slice(&chunk[..keep]);
                discarded += n - keep;
            }
            Err(e) => {
                warn!("Error reading worker {}: {}", name, e);
                break;
            }
        }
    }

    if discarded > 0 {
        warn!(stream = name, discarded, "Worker output exceeded cap and was truncated");
    }
    buf
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ProcessWorker {
        ProcessWorker::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "worker".to_string()],
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_passes_artifact_path_as_last_argument() {
        let output = sh(r#"printf '%s' "$1""#).run(Path::new("/tmp/upload.pdf")).await;

        assert!(output.success());
        assert_eq!(output.stdout_lossy(), "/tmp/upload.pdf");
    }

    #[tokio::test]
    async fn test_accumulates_incremental_output() {
        let script = r#"printf '{"a":'; sleep 0.1; printf ' 1'; sleep 0.1; printf '}'"#;
        let output = sh(script).run(Path::new("x")).await;

        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout_lossy(), r#"{"a": 1}"#);
        assert!(output.duration_ms >= 200, "duration_ms = {}", output.duration_ms);
        assert!(output.duration_ms < 10_000, "duration_ms = {}", output.duration_ms);
    }

    #[tokio::test]
    async fn test_captures_stderr_and_exit_code() {
        let output = sh("echo 'engine crashed' >&2; exit 1").run(Path::new("x")).await;

        assert!(!output.success());
        assert_eq!(output.exit_code, Some(1));
        assert!(output.stderr.contains("engine crashed"));
    }

    #[tokio::test]
    async fn test_timeout_kills_worker() {
        let worker = sh("sleep 5").with_max_output(1024);
        let worker = ProcessWorker {
            timeout: Duration::from_millis(200),
            ..worker
        };

        let start = Instant::now();
        let output = worker.run(Path::new("x")).await;

        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(output.timed_out);
        assert_eq!(output.exit_code, None);
        assert!(output.stderr.contains("timed out"));
    }

    #[tokio::test]
    async fn test_dropping_run_kills_worker() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let worker = sh(&format!("sleep 1; touch '{}'", marker.display()));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(100), worker.run(Path::new("x"))).await;
        assert!(cancelled.is_err(), "worker should still be running when cancelled");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "cancelled worker ran to completion");
    }

    #[tokio::test]
    async fn test_missing_program_is_a_launch_failure() {
        let worker = ProcessWorker::new(
            "definitely-not-a-real-extractor-binary",
            Vec::new(),
            Duration::from_secs(1),
        );
        let output = worker.run(Path::new("x")).await;

        assert!(!output.success());
        assert_eq!(output.exit_code, None);
        assert!(output.stderr.contains("failed to launch"));
    }

    #[tokio::test]
    async fn test_output_cap_truncates_without_blocking() {
        let worker = sh("head -c 100000 /dev/zero").with_max_output(1000);
        let output = worker.run(Path::new("x")).await;

        assert!(output.success());
        assert_eq!(output.stdout.len(), 1000);
    }
}
