//! Worker transport (Driven Port)
//!
//! Each evaluation call gets its own isolated worker. A worker is a
//! bidirectional line channel: one JSON request out, JSON messages back.
//! Dropping the channel discards the worker.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use super::error::EvaluationError;

/// One live worker session.
#[async_trait]
pub trait WorkerChannel: Send {
    /// Send one serialized request.
    async fn send(&mut self, payload: String) -> Result<(), EvaluationError>;

    /// Next raw message, or `None` once the worker has gone away.
    async fn recv(&mut self) -> Option<String>;
}

/// Port for starting isolated workers.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    /// Start a fresh worker.
    async fn spawn(&self) -> Result<Box<dyn WorkerChannel>, EvaluationError>;
}

/// Spawns a child process speaking newline-delimited JSON on stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessWorkerSpawner {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessWorkerSpawner {
    /// Create a spawner for a worker executable.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append command-line arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl WorkerSpawner for ProcessWorkerSpawner {
    async fn spawn(&self) -> Result<Box<dyn WorkerChannel>, EvaluationError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EvaluationError::WorkerSpawn {
                message: format!("{}: {e}", self.program.display()),
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(EvaluationError::WorkerSpawn {
                message: "worker stdio was not captured".to_string(),
            });
        };

        debug!(program = %self.program.display(), pid = ?child.id(), "Spawned evaluation worker");

        Ok(Box::new(ProcessWorker {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        }))
    }
}

struct ProcessWorker {
    // Held so the process is killed when the session is dropped.
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

#[async_trait]
impl WorkerChannel for ProcessWorker {
    async fn send(&mut self, payload: String) -> Result<(), EvaluationError> {
        self.stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|_| EvaluationError::WorkerExited)?;
        self.stdin
            .write_all(b"\n")
            .await
            .map_err(|_| EvaluationError::WorkerExited)?;
        self.stdin
            .flush()
            .await
            .map_err(|_| EvaluationError::WorkerExited)
    }

    async fn recv(&mut self) -> Option<String> {
        self.stdout.next_line().await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let spawner = ProcessWorkerSpawner::new("/nonexistent/evaluation-worker");
        let Err(err) = spawner.spawn().await else {
            panic!("spawn should fail");
        };
        assert!(matches!(err, EvaluationError::WorkerSpawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_worker_echoes_lines() {
        let spawner = ProcessWorkerSpawner::new("cat");
        let Ok(mut worker) = spawner.spawn().await else {
            panic!("cat should spawn");
        };

        let sent = worker.send(r#"{"type":"result","data":{}}"#.to_string()).await;
        assert!(sent.is_ok());
        assert_eq!(
            worker.recv().await.as_deref(),
            Some(r#"{"type":"result","data":{}}"#)
        );
    }
}
