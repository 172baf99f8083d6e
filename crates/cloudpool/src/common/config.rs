use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::common::utils::time::{deserialize_human_duration, get_duration_from_env};

/// Environment variable that overrides the polling step of pool convergence (in milliseconds).
pub const SLEEP_STEP_ENV: &str = "CLOUDPOOL_SLEEP_STEP_MS";
/// Environment variable that overrides the polling ceiling of pool convergence (in milliseconds).
pub const SLEEP_MAX_ENV: &str = "CLOUDPOOL_SLEEP_MAX_MS";

/// Options string passed to every task: copy outputs to the reporting host, then purge them.
pub const DEFAULT_TASK_OPTIONS: &str = "-RP";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub pool: PoolConfig,
    pub nodes: NodeConfig,
    pub tasks: TaskConfig,
}

impl Config {
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read configuration file {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> crate::Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.pool.apply_env_overrides();
        Ok(config)
    }
}

/// Declared configuration of the pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Value of the membership tag attached to every instance created for this pool.
    pub name: String,
    pub region: String,
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub security_groups: Vec<String>,
    pub target_count: usize,
    /// How long to sleep between two membership checks while waiting for convergence.
    #[serde(deserialize_with = "deserialize_human_duration")]
    pub sleep_step: Duration,
    /// Maximum cumulative sleep while waiting for convergence.
    #[serde(deserialize_with = "deserialize_human_duration")]
    pub sleep_max: Duration,
}

impl PoolConfig {
    pub fn apply_env_overrides(&mut self) {
        if let Some(step) = get_duration_from_env(SLEEP_STEP_ENV) {
            self.sleep_step = step;
        }
        if let Some(max) = get_duration_from_env(SLEEP_MAX_ENV) {
            self.sleep_max = max;
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "cloudpool".to_string(),
            region: "us-east-1".to_string(),
            image_id: "ami-0dc8ed438643bfda3".to_string(),
            instance_type: "t3.large".to_string(),
            key_name: "dask-01".to_string(),
            security_groups: vec!["dask-01".to_string()],
            target_count: 3,
            sleep_step: Duration::from_secs(10),
            sleep_max: Duration::from_secs(60),
        }
    }
}

/// How to reach pool members and which software state they should be in.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub user: String,
    pub key_file: PathBuf,
    /// Repository checkout on every node, relative to the home directory of `user`.
    pub repository_dir: String,
    pub branch: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            user: "ubuntu".to_string(),
            key_file: PathBuf::from("~/.ssh/dask-01.pem"),
            repository_dir: "secure-bioinformatics-reuse".to_string(),
            branch: "rl/distributed-script-processing".to_string(),
        }
    }
}

/// Locations used to build task commands and their argument lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    /// Directory with task scripts on the worker nodes.
    pub scripts_dir: PathBuf,
    pub shell: PathBuf,
    pub recipes_dir: PathBuf,
    pub containers_dir: PathBuf,
    /// Lines-of-code listing used to select repositories for scanning.
    pub loc_file: PathBuf,
    pub options: String,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("/home/ubuntu/secure-bioinformatics-reuse/src/bash"),
            shell: PathBuf::from("/usr/bin/bash"),
            recipes_dir: PathBuf::from("/home/ubuntu/bioconda-recipes"),
            containers_dir: PathBuf::from("/home/ubuntu/containers"),
            loc_file: PathBuf::from("dat/loc.json"),
            options: DEFAULT_TASK_OPTIONS.to_string(),
        }
    }
}
