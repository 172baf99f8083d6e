//! Kinds of work distributed over the pool and the argument lists they are run with.
mod listing;

use std::fmt::{Display, Formatter};
use std::path::Path;

use swarm::TaskDefinition;

use crate::common::config::TaskConfig;

pub use listing::{list_dockerfiles, list_pipelines, list_recipes, list_repositories};

/// Name of the directory (relative to the working directory of the script) with scan results.
const SCAN_HOME: &str = "scan";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TaskKind {
    /// Scans Python repositories with Aura.
    AuraScan,
    /// Traces installation of conda packages.
    StraceCondaInstall,
    /// Traces builds of Dockerfiles.
    StraceDockerBuild,
    /// Traces runs of nf-core pipelines.
    StracePipelineRun,
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::AuraScan => "aura-scan",
            TaskKind::StraceCondaInstall => "strace-conda-install",
            TaskKind::StraceDockerBuild => "strace-docker-build",
            TaskKind::StracePipelineRun => "strace-pipeline-run",
        }
    }

    /// Builds the argument list of this kind. Runs on the coordinator.
    pub async fn list_arguments(&self, config: &TaskConfig) -> crate::Result<Vec<RunArgs>> {
        let arguments = match self {
            TaskKind::AuraScan => list_repositories(&config.loc_file)?
                .into_iter()
                .map(|git_url| RunArgs::Repository { git_url })
                .collect(),
            TaskKind::StraceCondaInstall => list_recipes(&config.recipes_dir)?
                .into_iter()
                .map(|package| RunArgs::Recipe { package })
                .collect(),
            TaskKind::StraceDockerBuild => list_dockerfiles(&config.containers_dir)?
                .into_iter()
                .map(|(package, version)| RunArgs::Dockerfile { package, version })
                .collect(),
            TaskKind::StracePipelineRun => list_pipelines(&config.shell, &config.scripts_dir)
                .await?
                .into_iter()
                .map(|pipeline| RunArgs::Pipeline { pipeline })
                .collect(),
        };
        Ok(arguments)
    }
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments of a single run of some [`TaskKind`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RunArgs {
    Repository { git_url: String },
    Recipe { package: String },
    Dockerfile { package: String, version: String },
    Pipeline { pipeline: String },
}

impl RunArgs {
    /// Creates the program that is executed on a worker node.
    pub fn to_definition(&self, config: &TaskConfig) -> TaskDefinition {
        let scripts = &config.scripts_dir;
        let options = config.options.clone();
        let (kind, args) = match self {
            RunArgs::Repository { git_url } => (
                TaskKind::AuraScan,
                vec![
                    script(scripts, "aura-scan.sh"),
                    options,
                    git_url.clone(),
                    SCAN_HOME.to_string(),
                ],
            ),
            RunArgs::Recipe { package } => (
                TaskKind::StraceCondaInstall,
                vec![
                    config.shell.display().to_string(),
                    "-i".to_string(),
                    script(scripts, "strace-conda-install.sh"),
                    options,
                    package.clone(),
                ],
            ),
            RunArgs::Dockerfile { package, version } => (
                TaskKind::StraceDockerBuild,
                vec![
                    script(scripts, "strace-docker-build.sh"),
                    options,
                    config
                        .containers_dir
                        .join(package)
                        .join(version)
                        .display()
                        .to_string(),
                    package.clone(),
                    version.clone(),
                ],
            ),
            RunArgs::Pipeline { pipeline } => (
                TaskKind::StracePipelineRun,
                vec![
                    config.shell.display().to_string(),
                    "-i".to_string(),
                    script(scripts, "strace-pipeline-run.sh"),
                    options,
                    pipeline.clone(),
                ],
            ),
        };
        TaskDefinition::new(args).with_name(format!("{kind} {self}"))
    }
}

impl Display for RunArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RunArgs::Repository { git_url } => f.write_str(git_url),
            RunArgs::Recipe { package } => f.write_str(package),
            RunArgs::Dockerfile { package, version } => write!(f, "{package}-{version}"),
            RunArgs::Pipeline { pipeline } => f.write_str(pipeline),
        }
    }
}

fn script(scripts_dir: &Path, name: &str) -> String {
    scripts_dir.join(name).display().to_string()
}
