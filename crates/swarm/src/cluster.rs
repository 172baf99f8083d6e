use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinSet;

use crate::launcher::{Launcher, TaskFailure, TaskOutcome};
use crate::program::TaskDefinition;
use crate::{TaskId, WorkerId};

/// A single worker slot of the cluster.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WorkerInfo {
    pub id: WorkerId,
    /// Address of the host that executes tasks of this worker.
    pub host: String,
}

impl Display for WorkerInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.host)
    }
}

/// Submission side of a scheduling client.
pub trait Scheduler {
    /// Enqueues a task and returns immediately with a handle that resolves once the task ends.
    fn submit(&mut self, definition: TaskDefinition) -> TaskHandle;

    /// Number of tasks that can run at the same time.
    fn worker_count(&self) -> usize;
}

/// Resolves to the outcome of a submitted task.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    receiver: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    pub fn new(id: TaskId, receiver: oneshot::Receiver<TaskOutcome>) -> Self {
        Self { id, receiver }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl Future for TaskHandle {
    type Output = (TaskId, TaskOutcome);

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        Pin::new(&mut self.receiver).poll(cx).map(|result| {
            let outcome = result.unwrap_or(Err(TaskFailure::WorkerLost));
            (id, outcome)
        })
    }
}

struct QueuedTask {
    id: TaskId,
    definition: TaskDefinition,
    response: oneshot::Sender<TaskOutcome>,
}

type TaskQueue = Arc<Mutex<mpsc::UnboundedReceiver<QueuedTask>>>;

/// Fixed set of worker slots sharing a FIFO task queue.
pub struct Cluster {
    workers: Vec<WorkerInfo>,
    sender: mpsc::UnboundedSender<QueuedTask>,
    next_task_id: u64,
    worker_loops: JoinSet<()>,
}

impl Cluster {
    /// Starts one worker loop per host. Must be called from within a tokio runtime.
    pub fn start(hosts: Vec<String>, launcher: Arc<dyn Launcher>) -> crate::Result<Self> {
        if hosts.is_empty() {
            return Err(crate::Error::NoWorkers);
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: TaskQueue = Arc::new(Mutex::new(receiver));

        let workers: Vec<WorkerInfo> = hosts
            .into_iter()
            .enumerate()
            .map(|(index, host)| WorkerInfo {
                id: WorkerId::new(index as u32),
                host,
            })
            .collect();

        let mut worker_loops = JoinSet::new();
        for worker in &workers {
            log::debug!("Starting worker {worker}");
            worker_loops.spawn(worker_loop(
                worker.clone(),
                queue.clone(),
                launcher.clone(),
            ));
        }

        Ok(Self {
            workers,
            sender,
            next_task_id: 0,
            worker_loops,
        })
    }

    pub fn workers(&self) -> &[WorkerInfo] {
        &self.workers
    }

    /// Waits until all already submitted tasks are processed and stops the workers.
    pub async fn shutdown(self) -> crate::Result<()> {
        let Cluster {
            sender,
            mut worker_loops,
            ..
        } = self;
        drop(sender);
        while let Some(result) = worker_loops.join_next().await {
            result?;
        }
        log::debug!("All workers have stopped");
        Ok(())
    }
}

impl Scheduler for Cluster {
    fn submit(&mut self, definition: TaskDefinition) -> TaskHandle {
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;
        let (response, receiver) = oneshot::channel();
        log::debug!("Submitting task {id}: {definition}");
        let task = QueuedTask {
            id,
            definition,
            response,
        };
        // If all workers are gone, the response sender is dropped together with the task and
        // the handle resolves to `WorkerLost`.
        let _ = self.sender.send(task);
        TaskHandle::new(id, receiver)
    }

    fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

async fn worker_loop(worker: WorkerInfo, queue: TaskQueue, launcher: Arc<dyn Launcher>) {
    loop {
        let task = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };
        let Some(task) = task else {
            break;
        };
        log::debug!("Task {} assigned to worker {worker}", task.id);
        let outcome = launcher
            .launch(&worker, &task.definition)
            .await
            .map_err(|error| TaskFailure::LaunchFailed(format!("{error:?}")));
        match &outcome {
            Ok(output) => log::debug!(
                "Task {} finished on worker {worker} with exit code {}",
                task.id,
                output.status
            ),
            Err(error) => log::debug!("Task {} failed on worker {worker}: {error}", task.id),
        }
        // The handle might have been dropped by the submitter, there is nobody to notify then.
        let _ = task.response.send(outcome);
    }
    log::debug!("Worker {worker} has no more tasks");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::cluster::{Cluster, Scheduler};
    use crate::launcher::TaskFailure;
    use crate::program::TaskDefinition;
    use crate::tests::{FailingLauncher, RecordingLauncher};

    fn hosts(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("10.0.0.{i}")).collect()
    }

    #[tokio::test]
    async fn start_without_workers() {
        let launcher = Arc::new(RecordingLauncher::default());
        assert!(matches!(
            Cluster::start(vec![], launcher),
            Err(crate::Error::NoWorkers)
        ));
    }

    #[tokio::test]
    async fn submit_and_wait() {
        let _ = env_logger::builder().is_test(true).try_init();
        let launcher = Arc::new(RecordingLauncher::default());
        let mut cluster = Cluster::start(hosts(2), launcher.clone()).unwrap();
        assert_eq!(cluster.worker_count(), 2);

        let handle = cluster.submit(TaskDefinition::new(["echo", "hello"]));
        let (id, outcome) = handle.await;
        assert_eq!(id.as_num(), 0);
        let output = outcome.unwrap();
        assert!(output.is_success());
        assert_eq!(output.stdout, "echo hello");

        cluster.shutdown().await.unwrap();
        assert_eq!(launcher.launched_commands(), vec!["echo hello".to_string()]);
    }

    #[tokio::test]
    async fn task_ids_are_increasing() {
        let launcher = Arc::new(RecordingLauncher::default());
        let mut cluster = Cluster::start(hosts(1), launcher).unwrap();
        let ids: Vec<u64> = (0..3)
            .map(|_| cluster.submit(TaskDefinition::new(["true"])).id().as_num())
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
        cluster.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn tasks_are_spread_over_workers() {
        let _ = env_logger::builder().is_test(true).try_init();
        let launcher =
            Arc::new(RecordingLauncher::default().with_delay(Duration::from_millis(50)));
        let mut cluster = Cluster::start(hosts(3), launcher.clone()).unwrap();
        let handles: Vec<_> = (0..3)
            .map(|i| cluster.submit(TaskDefinition::new(["task".to_string(), i.to_string()])))
            .collect();
        for handle in handles {
            assert!(handle.await.1.is_ok());
        }
        cluster.shutdown().await.unwrap();

        let mut used_hosts = launcher.used_hosts();
        used_hosts.sort();
        used_hosts.dedup();
        assert_eq!(used_hosts.len(), 3);
    }

    #[tokio::test]
    async fn workers_follow_hosts() {
        let launcher = Arc::new(RecordingLauncher::default().fail_when_contains("broken"));
        let mut cluster = Cluster::start(hosts(2), launcher).unwrap();
        let workers: Vec<_> = cluster
            .workers()
            .iter()
            .map(|worker| worker.host.clone())
            .collect();
        assert_eq!(workers, hosts(2));

        let (_, failed) = cluster
            .submit(TaskDefinition::new(["build", "--tag=broken-image"]))
            .await;
        assert_eq!(failed.unwrap().status, 1);
        let (_, succeeded) = cluster.submit(TaskDefinition::new(["build", "ok"])).await;
        assert!(succeeded.unwrap().is_success());
        cluster.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn launch_error_becomes_failure() {
        let mut cluster = Cluster::start(hosts(1), Arc::new(FailingLauncher)).unwrap();
        let (_, outcome) = cluster.submit(TaskDefinition::new(["ls"])).await;
        assert!(matches!(outcome, Err(TaskFailure::LaunchFailed(_))));
        cluster.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_finishes_queued_tasks() {
        let launcher = Arc::new(RecordingLauncher::default());
        let mut cluster = Cluster::start(hosts(1), launcher.clone()).unwrap();
        for _ in 0..5 {
            cluster.submit(TaskDefinition::new(["true"]));
        }
        cluster.shutdown().await.unwrap();
        assert_eq!(launcher.launched_commands().len(), 5);
    }
}
