use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::tasks::TaskKind;

/// Default global cap on the number of tasks submitted in one run.
pub const DEFAULT_MAX_RUNS: usize = 9;

// Common CLI options
#[derive(Parser, Debug)]
pub struct CommonOpts {
    /// Path to a TOML file with pool, node and task configuration
    #[arg(
        long,
        value_hint = clap::ValueHint::FilePath,
        env = "CLOUDPOOL_CONFIG",
        help_heading("GLOBAL OPTIONS")
    )]
    pub config: Option<PathBuf>,

    /// Enables more detailed log output
    #[arg(long, env = "CLOUDPOOL_DEBUG", help_heading("GLOBAL OPTIONS"))]
    pub debug: bool,
}

/// Selects the kind of tasks to distribute. Exactly one has to be given.
#[derive(Parser, Debug)]
#[command(group(
    ArgGroup::new("kind")
        .required(true)
        .args(["aura_scan", "strace_conda_install", "strace_docker_build", "strace_pipeline_run"])
))]
pub struct TaskKindOpts {
    /// Run Aura scans of Python repositories
    #[arg(short = 'a', long)]
    pub aura_scan: bool,

    /// Trace conda installs of bioconda recipes
    #[arg(short = 'c', long)]
    pub strace_conda_install: bool,

    /// Trace builds of Dockerfiles
    #[arg(short = 'd', long)]
    pub strace_docker_build: bool,

    /// Trace runs of nf-core pipelines
    #[arg(short = 'p', long)]
    pub strace_pipeline_run: bool,
}

impl TaskKindOpts {
    pub fn kind(&self) -> TaskKind {
        if self.aura_scan {
            TaskKind::AuraScan
        } else if self.strace_conda_install {
            TaskKind::StraceCondaInstall
        } else if self.strace_docker_build {
            TaskKind::StraceDockerBuild
        } else {
            TaskKind::StracePipelineRun
        }
    }
}

// Root CLI options
#[derive(Parser, Debug)]
#[command(
    name = "cloudpool",
    author,
    about,
    version(crate::CLOUDPOOL_VERSION),
    help_expected(true)
)]
pub struct RootOptions {
    #[clap(flatten)]
    pub common: CommonOpts,

    #[clap(flatten)]
    pub kind: TaskKindOpts,

    /// Maximum number of tasks submitted in total
    #[arg(long, default_value_t = DEFAULT_MAX_RUNS)]
    pub max_runs: usize,

    /// Terminate the pool after all tasks have finished
    #[arg(long)]
    pub teardown: bool,
}
