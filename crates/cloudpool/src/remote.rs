use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use bstr::ByteSlice;
use swarm::launcher::LaunchFuture;
use swarm::{Launcher, TaskDefinition, TaskOutput, WorkerInfo};
use tokio::process::Command;

use crate::common::utils::fs::expand_home;

/// Exit code used by OpenSSH when the connection itself fails.
const SSH_CONNECTION_ERROR_CODE: i32 = 255;

pub type RemoteFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<TaskOutput>> + Send + 'a>>;

/// Executes a shell command on a remote host and captures its result.
pub trait RemoteShell: Send + Sync {
    fn execute<'a>(&'a self, host: &'a str, command: &'a str) -> RemoteFuture<'a>;
}

/// Remote shell backed by the OpenSSH client binary.
///
/// Every call opens a new session that ends together with the command.
#[derive(Debug, Clone)]
pub struct SshClient {
    ssh_path: PathBuf,
    user: String,
    key_file: PathBuf,
}

impl SshClient {
    pub fn new(user: String, key_file: &Path) -> anyhow::Result<Self> {
        let ssh_path = get_ssh_binary()?;
        Ok(Self::with_binary(ssh_path, user, key_file))
    }

    pub fn with_binary(ssh_path: PathBuf, user: String, key_file: &Path) -> Self {
        Self {
            ssh_path,
            user,
            key_file: expand_home(key_file),
        }
    }

    fn build_args(&self, host: &str, command: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.key_file.display().to_string(),
            // Hosts of a fresh pool are never known in advance
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            format!("{}@{}", self.user, host),
            "--".to_string(),
            command.to_string(),
        ]
    }

    pub async fn run(&self, host: &str, command: &str) -> anyhow::Result<TaskOutput> {
        log::debug!("Running `{command}` at {host}");
        let mut cmd = Command::new(&self.ssh_path);
        cmd.args(self.build_args(host, command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .with_context(|| anyhow::anyhow!("Cannot start SSH command {cmd:?}"))?;
        let status = output.status.code().unwrap_or(-1);
        if status == SSH_CONNECTION_ERROR_CODE {
            anyhow::bail!(
                "SSH connection to {host} failed: {}",
                output.stderr.to_str_lossy().trim()
            );
        }
        Ok(TaskOutput::new(status, output.stdout, output.stderr))
    }
}

impl RemoteShell for SshClient {
    fn execute<'a>(&'a self, host: &'a str, command: &'a str) -> RemoteFuture<'a> {
        Box::pin(self.run(host, command))
    }
}

/// Executes cluster tasks on the host of the worker that picked them up.
pub struct SshLauncher {
    client: SshClient,
}

impl SshLauncher {
    pub fn new(client: SshClient) -> Self {
        Self { client }
    }
}

impl Launcher for SshLauncher {
    fn launch(&self, worker: &WorkerInfo, definition: &TaskDefinition) -> LaunchFuture {
        let client = self.client.clone();
        let host = worker.host.clone();
        let command = definition.command_line();
        Box::pin(async move { client.run(&host, &command).await })
    }
}

fn get_ssh_binary() -> anyhow::Result<PathBuf> {
    which::which("ssh").context("Cannot find `ssh` binary. Make sure that OpenSSH is installed.")
}
