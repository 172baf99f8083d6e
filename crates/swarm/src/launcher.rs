use std::future::Future;
use std::pin::Pin;

use bstr::{BString, ByteSlice};
use thiserror::Error;

use crate::cluster::WorkerInfo;
use crate::program::TaskDefinition;

/// Captured result of a program that ran to completion on a worker.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TaskOutput {
    /// Exit code of the program, `-1` if it was terminated by a signal.
    pub status: i32,
    pub stdout: BString,
    pub stderr: BString,
}

impl TaskOutput {
    pub fn new(status: i32, stdout: impl Into<BString>, stderr: impl Into<BString>) -> Self {
        Self {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    pub fn stderr_lossy(&self) -> String {
        self.stderr.to_str_lossy().trim().to_string()
    }
}

/// The task could not produce a [`TaskOutput`].
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum TaskFailure {
    #[error("Task could not be launched: {0}")]
    LaunchFailed(String),
    #[error("Worker was lost before the task finished")]
    WorkerLost,
}

pub type TaskOutcome = Result<TaskOutput, TaskFailure>;

pub type LaunchFuture = Pin<Box<dyn Future<Output = anyhow::Result<TaskOutput>> + Send>>;

/// Executes a task on a specific worker.
///
/// Returning an error means that the program did not run to completion (e.g. it could not be
/// spawned). A program that ran and exited with a non-zero code is still a successful launch.
pub trait Launcher: Send + Sync {
    fn launch(&self, worker: &WorkerInfo, definition: &TaskDefinition) -> LaunchFuture;
}
