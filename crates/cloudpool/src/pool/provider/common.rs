use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::Context;
use bstr::ByteSlice;
use serde::de::DeserializeOwned;
use tokio::process::Command;

use crate::pool::provider::ProviderResult;

pub fn get_binary(name: &str) -> anyhow::Result<PathBuf> {
    which::which(name).with_context(|| format!("Cannot find `{name}` binary in PATH"))
}

pub fn create_command(program: &Path, arguments: &[String]) -> Command {
    let mut command = Command::new(program);
    command.args(arguments);
    command.kill_on_drop(true);
    command
}

pub fn check_command_output(output: Output) -> ProviderResult<Output> {
    let status = output.status;
    if !status.success() {
        return Err(anyhow::anyhow!(
            "Exit code: {}\nStderr: {}\nStdout: {}",
            status.code().unwrap_or(-1),
            output.stderr.to_str_lossy().trim(),
            output.stdout.to_str_lossy().trim()
        ));
    }
    Ok(output)
}

/// Runs a provider command, checks its exit code and returns its standard output.
pub async fn run_command(program: &Path, arguments: &[String]) -> ProviderResult<String> {
    log::debug!(
        "Running command `{} {}`",
        program.display(),
        arguments.join(" ")
    );
    let output = create_command(program, arguments)
        .output()
        .await
        .with_context(|| format!("{} start failed", program.display()))?;
    let output = check_command_output(output)
        .with_context(|| format!("{} execution failed", program.display()))?;
    let stdout = output
        .stdout
        .to_str()
        .map_err(|e| anyhow::anyhow!("Invalid UTF-8 {} output: {:?}", program.display(), e))?;
    Ok(stdout.trim().to_string())
}

pub async fn run_json_command<T: DeserializeOwned>(
    program: &Path,
    arguments: &[String],
) -> ProviderResult<T> {
    let output = run_command(program, arguments).await?;
    serde_json::from_str(&output)
        .with_context(|| format!("Cannot parse JSON output of {}", program.display()))
}
