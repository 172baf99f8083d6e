use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use derive_builder::Builder;
use swarm::TaskOutput;

use crate::common::config::PoolConfig;
use crate::pool::provider::{CloudProvider, InstanceRequest, ProviderFuture};
use crate::pool::{InstanceId, InstanceState, Member};
use crate::remote::{RemoteFuture, RemoteShell};

// Pool definitions
#[derive(Builder)]
#[builder(pattern = "owned", build_fn(name = "finish"))]
pub struct TestPool {
    #[builder(default = "\"test-pool\".to_string()", setter(into))]
    name: String,
    #[builder(default = "\"t3.large\".to_string()", setter(into))]
    instance_type: String,
    #[builder(default = "1")]
    target_count: usize,
    #[builder(default = "Duration::from_millis(1)")]
    sleep_step: Duration,
    #[builder(default = "Duration::from_millis(20)")]
    sleep_max: Duration,
}

impl TestPoolBuilder {
    pub fn build(self) -> PoolConfig {
        let TestPool {
            name,
            instance_type,
            target_count,
            sleep_step,
            sleep_max,
        } = self.finish().unwrap();
        PoolConfig {
            name,
            instance_type,
            target_count,
            sleep_step,
            sleep_max,
            ..PoolConfig::default()
        }
    }
}

struct Instance {
    member: Member,
    /// Number of remaining listings during which the instance is still pending.
    startup_polls: usize,
    /// The instance stays pending until this moment.
    ready_at: Option<Instant>,
}

#[derive(Default)]
struct ProviderState {
    instances: Vec<Instance>,
    next_id: u64,
    startup_polls: usize,
    startup_delay: Option<Duration>,
    ignore_run_requests: bool,
    failure: Option<String>,
    list_calls: usize,
    run_requests: Vec<usize>,
    stop_requests: Vec<usize>,
    terminated: Vec<InstanceId>,
}

impl ProviderState {
    fn check_failure(&self) -> anyhow::Result<()> {
        match &self.failure {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(()),
        }
    }

    fn set_state(&mut self, ids: &[InstanceId], state: InstanceState) {
        for instance in self
            .instances
            .iter_mut()
            .filter(|instance| ids.contains(&instance.member.id))
        {
            instance.member.state = state.clone();
        }
    }
}

/// Cloud provider that keeps its instances in memory and records every request.
#[derive(Clone, Default)]
pub struct InMemoryProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl InMemoryProvider {
    /// New instances stay pending for the given number of listings.
    pub fn with_startup_polls(self, polls: usize) -> Self {
        self.state.lock().unwrap().startup_polls = polls;
        self
    }

    /// New instances stay pending until the given time has elapsed since their creation.
    pub fn with_startup_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().startup_delay = Some(delay);
        self
    }

    /// Provisioning requests are accepted, but no instance is ever created.
    pub fn ignore_run_requests(self) -> Self {
        self.state.lock().unwrap().ignore_run_requests = true;
        self
    }

    /// All mutating requests fail from now on.
    pub fn fail_requests(&self, message: &str) {
        self.state.lock().unwrap().failure = Some(message.to_string());
    }

    pub fn run_requests(&self) -> Vec<usize> {
        self.state.lock().unwrap().run_requests.clone()
    }

    pub fn stop_requests(&self) -> Vec<usize> {
        self.state.lock().unwrap().stop_requests.clone()
    }

    pub fn terminated_ids(&self) -> Vec<InstanceId> {
        self.state.lock().unwrap().terminated.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn all_instances(&self) -> Vec<Member> {
        self.state
            .lock()
            .unwrap()
            .instances
            .iter()
            .map(|instance| instance.member.clone())
            .collect()
    }

    pub fn instances_in_state(&self, state: InstanceState) -> Vec<InstanceId> {
        self.all_instances()
            .into_iter()
            .filter(|member| member.state == state)
            .map(|member| member.id)
            .collect()
    }
}

impl CloudProvider for InMemoryProvider {
    fn list_instances(&self) -> ProviderFuture<Vec<Member>> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.list_calls += 1;
        for instance in state.instances.iter_mut() {
            if instance.member.state == InstanceState::Pending {
                if instance.ready_at.is_some_and(|ready_at| Instant::now() < ready_at) {
                    continue;
                }
                if instance.startup_polls == 0 {
                    instance.member.state = InstanceState::Running;
                } else {
                    instance.startup_polls -= 1;
                }
            }
        }
        let members: Vec<Member> = state
            .instances
            .iter()
            .map(|instance| instance.member.clone())
            .collect();
        Box::pin(async move { Ok(members) })
    }

    fn run_instances(&self, request: &InstanceRequest) -> ProviderFuture<Vec<InstanceId>> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if let Err(error) = state.check_failure() {
            return Box::pin(async move { Err(error) });
        }
        state.run_requests.push(request.count);
        if state.ignore_run_requests {
            return Box::pin(async move { Ok(vec![]) });
        }

        let mut ids = Vec::with_capacity(request.count);
        for _ in 0..request.count {
            state.next_id += 1;
            let id = format!("i-{:04}", state.next_id);
            let member = Member {
                id: id.clone(),
                address: Some(format!("10.0.0.{}", state.next_id)),
                state: if state.startup_polls == 0 && state.startup_delay.is_none() {
                    InstanceState::Running
                } else {
                    InstanceState::Pending
                },
                image_id: request.image_id.clone(),
                instance_type: request.instance_type.clone(),
                tags: request.tags.iter().cloned().collect::<BTreeMap<_, _>>(),
            };
            state.instances.push(Instance {
                member,
                startup_polls: state.startup_polls,
                ready_at: state.startup_delay.map(|delay| Instant::now() + delay),
            });
            ids.push(id);
        }
        Box::pin(async move { Ok(ids) })
    }

    fn stop_instances(&self, ids: &[InstanceId]) -> ProviderFuture<()> {
        let mut state = self.state.lock().unwrap();
        let result = state.check_failure();
        if result.is_ok() {
            state.stop_requests.push(ids.len());
            state.set_state(ids, InstanceState::Stopped);
        }
        Box::pin(async move { result })
    }

    fn terminate_instances(&self, ids: &[InstanceId]) -> ProviderFuture<()> {
        let mut state = self.state.lock().unwrap();
        let result = state.check_failure();
        if result.is_ok() {
            state.terminated.extend(ids.iter().cloned());
            state.set_state(ids, InstanceState::Terminated);
        }
        Box::pin(async move { result })
    }
}

/// Builds a running pool member with the given address.
pub fn member(id: &str, address: &str) -> Member {
    Member {
        id: id.to_string(),
        address: Some(address.to_string()),
        state: InstanceState::Running,
        image_id: PoolConfig::default().image_id,
        instance_type: "t3.large".to_string(),
        tags: BTreeMap::new(),
    }
}

#[derive(Default)]
struct ShellState {
    executed: Vec<(String, String)>,
    failures: HashMap<String, (i32, String)>,
    unreachable: Vec<String>,
}

/// Remote shell that records executed commands instead of running them.
#[derive(Clone, Default)]
pub struct RecordingShell {
    state: Arc<Mutex<ShellState>>,
}

impl RecordingShell {
    /// Commands executed on `host` exit with the given status and standard error.
    pub fn fail_on(self, host: &str, status: i32, stderr: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(host.to_string(), (status, stderr.to_string()));
        self
    }

    /// Connections to `host` cannot be established.
    pub fn unreachable(self, host: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .unreachable
            .push(host.to_string());
        self
    }

    /// Hosts in the order in which they were contacted.
    pub fn contacted_hosts(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .executed
            .iter()
            .map(|(host, _)| host.clone())
            .collect()
    }

    pub fn executed_commands(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().executed.clone()
    }
}

impl RemoteShell for RecordingShell {
    fn execute<'a>(&'a self, host: &'a str, command: &'a str) -> RemoteFuture<'a> {
        let result = {
            let mut state = self.state.lock().unwrap();
            state
                .executed
                .push((host.to_string(), command.to_string()));
            if state.unreachable.iter().any(|h| h == host) {
                Err(anyhow::anyhow!("Cannot connect to {host}"))
            } else {
                let (status, stderr) = state.failures.get(host).cloned().unwrap_or_default();
                Ok(TaskOutput::new(status, "", stderr))
            }
        };
        Box::pin(async move { result })
    }
}
