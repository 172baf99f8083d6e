//! End-to-end run: converge the pool, prepare its members, dispatch tasks and optionally tear
//! the pool down.
use std::sync::Arc;

use swarm::{Cluster, Launcher, Scheduler};

use crate::common::config::Config;
use crate::dispatch::{DispatchReport, distribute_runs as dispatch_tasks};
use crate::pool::provider::CloudProvider;
use crate::pool::provider::ec2::Ec2Handler;
use crate::pool::{Convergence, PoolManager};
use crate::prepare::{checkout_branch_commands, prepare_nodes};
use crate::remote::{RemoteShell, SshClient, SshLauncher};
use crate::tasks::{RunArgs, TaskKind};

/// External services a run talks to.
pub struct Backends {
    pub provider: Box<dyn CloudProvider>,
    pub shell: Box<dyn RemoteShell>,
    pub launcher: Arc<dyn Launcher>,
}

impl Backends {
    /// EC2 through the `aws` CLI, remote execution through `ssh`.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let provider = Ec2Handler::new(config.pool.region.clone())?;
        let ssh = SshClient::new(config.nodes.user.clone(), &config.nodes.key_file)?;
        Ok(Self {
            provider: Box::new(provider),
            shell: Box::new(ssh.clone()),
            launcher: Arc::new(SshLauncher::new(ssh)),
        })
    }
}

/// Converged and prepared pool with a cluster running over its members.
pub struct PreparedPool {
    pub manager: PoolManager,
    pub cluster: Cluster,
}

pub async fn setup_pool(config: &Config, backends: Backends) -> crate::Result<PreparedPool> {
    let Backends {
        provider,
        shell,
        launcher,
    } = backends;

    let mut manager = PoolManager::connect(config.pool.clone(), provider).await?;
    manager.maintain_pool().await?;

    let commands = checkout_branch_commands(&config.nodes.repository_dir, &config.nodes.branch);
    prepare_nodes(manager.members(), &commands, shell.as_ref()).await?;

    let cluster = Cluster::start(manager.addresses(), launcher)?;
    log::info!("Cluster started with {} worker(s)", cluster.worker_count());
    Ok(PreparedPool { manager, cluster })
}

pub async fn teardown_pool(manager: &mut PoolManager) -> crate::Result<Convergence> {
    log::info!("Terminating pool {}", manager.config().name);
    manager.terminate_pool().await
}

/// Lists the arguments of `kind`, sets up the pool and distributes the runs over it.
pub async fn distribute_runs(
    config: &Config,
    kind: TaskKind,
    max_runs: usize,
    teardown: bool,
    backends: Backends,
) -> crate::Result<DispatchReport> {
    let arguments = kind.list_arguments(&config.tasks).await?;
    log::info!("Found {} argument(s) for {kind}", arguments.len());
    run_tasks(config, &arguments, max_runs, teardown, backends).await
}

pub async fn run_tasks(
    config: &Config,
    arguments: &[RunArgs],
    max_runs: usize,
    teardown: bool,
    backends: Backends,
) -> crate::Result<DispatchReport> {
    let PreparedPool {
        mut manager,
        mut cluster,
    } = setup_pool(config, backends).await?;

    let pool_size = cluster.worker_count();
    let report = dispatch_tasks(&mut cluster, arguments, max_runs, pool_size, |args| {
        args.to_definition(&config.tasks)
    })
    .await;
    cluster.shutdown().await?;

    if teardown {
        teardown_pool(&mut manager).await?;
    }
    Ok(report)
}
