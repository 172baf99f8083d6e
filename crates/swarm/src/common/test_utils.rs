//! In-process launchers used by tests of this crate and of crates that build on top of it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cluster::WorkerInfo;
use crate::launcher::{LaunchFuture, Launcher, TaskOutput};
use crate::program::TaskDefinition;

#[derive(Default)]
struct Records {
    commands: Vec<String>,
    hosts: Vec<String>,
}

/// Pretends to run every task, echoing its command line to stdout.
///
/// Tasks with an argument containing one of the configured markers exit with code `1`.
#[derive(Default, Clone)]
pub struct RecordingLauncher {
    records: Arc<Mutex<Records>>,
    delay: Option<Duration>,
    failing_markers: Vec<String>,
}

impl RecordingLauncher {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_when_contains(mut self, marker: impl Into<String>) -> Self {
        self.failing_markers.push(marker.into());
        self
    }

    /// Command lines in the order in which the tasks were started.
    pub fn launched_commands(&self) -> Vec<String> {
        self.records.lock().unwrap().commands.clone()
    }

    pub fn used_hosts(&self) -> Vec<String> {
        self.records.lock().unwrap().hosts.clone()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, worker: &WorkerInfo, definition: &TaskDefinition) -> LaunchFuture {
        let command = definition.command_line();
        {
            let mut records = self.records.lock().unwrap();
            records.commands.push(command.clone());
            records.hosts.push(worker.host.clone());
        }
        let status = if definition.args.iter().any(|arg| {
            self.failing_markers
                .iter()
                .any(|marker| arg.contains(marker.as_str()))
        }) {
            1
        } else {
            0
        };
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(TaskOutput::new(status, command, ""))
        })
    }
}

/// Every launch fails before the program starts.
pub struct FailingLauncher;

impl Launcher for FailingLauncher {
    fn launch(&self, worker: &WorkerInfo, _definition: &TaskDefinition) -> LaunchFuture {
        let host = worker.host.clone();
        Box::pin(async move { Err(anyhow::anyhow!("Cannot connect to {host}")) })
    }
}
