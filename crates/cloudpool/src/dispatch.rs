//! Bounded rolling dispatch of tasks over a cluster.
//!
//! The dispatcher first fills a submission window with one task per pool member. After that, every
//! observed completion (regardless of whether the task succeeded) triggers at most one new
//! submission, until the global cap or the argument list is exhausted.
use std::collections::HashMap;

use futures::StreamExt;
use swarm::{
    AsCompleted, Scheduler, TaskDefinition, TaskFailure, TaskHandle, TaskId, TaskOutcome,
};

/// Hands out arguments in list order for a single dispatch run.
///
/// The cursor only moves forward, so every argument is claimed at most once.
pub struct SubmissionWindow<'a, A> {
    arguments: &'a [A],
    /// Replenishment stops once the cursor reaches this value.
    cap: usize,
    cursor: usize,
}

impl<'a, A> SubmissionWindow<'a, A> {
    pub fn new(arguments: &'a [A], max_runs: usize) -> Self {
        Self {
            arguments,
            cap: max_runs.min(arguments.len()),
            cursor: 0,
        }
    }

    /// Claims up to `slots` arguments at once. This is not limited by the cap.
    pub fn fill(&mut self, slots: usize) -> impl Iterator<Item = (usize, &'a A)> + use<'a, A> {
        let start = self.cursor;
        let end = start.saturating_add(slots).min(self.arguments.len());
        self.cursor = end;
        self.arguments[start..end]
            .iter()
            .enumerate()
            .map(move |(offset, argument)| (start + offset, argument))
    }

    /// Claims the next argument if the cap has not been reached yet.
    pub fn replenish(&mut self) -> Option<(usize, &'a A)> {
        if self.cursor >= self.cap {
            return None;
        }
        let index = self.cursor;
        self.cursor += 1;
        Some((index, &self.arguments[index]))
    }

    /// Number of arguments claimed so far.
    #[inline]
    pub fn submitted(&self) -> usize {
        self.cursor
    }
}

/// Summary of a finished dispatch run. Indices refer to the argument list.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct DispatchReport {
    /// Number of tasks submitted before the first completion was awaited.
    pub initial_window: usize,
    pub submitted: usize,
    pub succeeded: usize,
    pub nonzero_exits: Vec<(usize, i32)>,
    pub failures: Vec<(usize, TaskFailure)>,
}

impl DispatchReport {
    pub fn completed(&self) -> usize {
        self.succeeded + self.nonzero_exits.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.nonzero_exits.is_empty() && self.failures.is_empty()
    }

    fn record(&mut self, task_id: TaskId, index: usize, outcome: TaskOutcome) {
        match outcome {
            Ok(output) if output.is_success() => {
                log::info!("Task {task_id} (argument {index}) finished successfully");
                self.succeeded += 1;
            }
            Ok(output) => {
                log::warn!(
                    "Task {task_id} (argument {index}) exited with code {}: {}",
                    output.status,
                    output.stderr_lossy()
                );
                self.nonzero_exits.push((index, output.status));
            }
            Err(failure) => {
                log::error!("Task {task_id} (argument {index}) failed: {failure}");
                self.failures.push((index, failure));
            }
        }
    }
}

/// Dispatches tasks created from `arguments` and waits until all submitted tasks finish.
///
/// At most `max(min(pool_size, len), min(max_runs, len))` tasks are submitted in total.
pub async fn distribute_runs<S, A, F>(
    scheduler: &mut S,
    arguments: &[A],
    max_runs: usize,
    pool_size: usize,
    make_task: F,
) -> DispatchReport
where
    S: Scheduler,
    F: Fn(&A) -> TaskDefinition,
{
    let mut window = SubmissionWindow::new(arguments, max_runs);
    let mut indices: HashMap<TaskId, usize> = HashMap::new();
    let mut completed = AsCompleted::default();

    for (index, argument) in window.fill(pool_size) {
        completed.add(submit(scheduler, &make_task, &mut indices, index, argument));
    }
    let mut report = DispatchReport {
        initial_window: window.submitted(),
        ..Default::default()
    };
    log::info!(
        "Submitted {} task(s) to fill the pool, {} argument(s) available",
        report.initial_window,
        arguments.len()
    );

    while let Some((task_id, outcome)) = completed.next().await {
        let index = indices.remove(&task_id).unwrap_or_default();
        report.record(task_id, index, outcome);

        if let Some((index, argument)) = window.replenish() {
            completed.add(submit(scheduler, &make_task, &mut indices, index, argument));
        }
    }

    report.submitted = window.submitted();
    log::info!(
        "Dispatch finished: {} submitted, {} succeeded, {} exited with error, {} failed",
        report.submitted,
        report.succeeded,
        report.nonzero_exits.len(),
        report.failures.len()
    );
    report
}

fn submit<S: Scheduler, A>(
    scheduler: &mut S,
    make_task: &impl Fn(&A) -> TaskDefinition,
    indices: &mut HashMap<TaskId, usize>,
    index: usize,
    argument: &A,
) -> TaskHandle {
    let handle = scheduler.submit(make_task(argument));
    log::debug!("Submitted task {} for argument {index}", handle.id());
    indices.insert(handle.id(), index);
    handle
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use swarm::tests::{FailingLauncher, RecordingLauncher};
    use swarm::{Cluster, Launcher, TaskDefinition, TaskFailure};

    use crate::dispatch::{DispatchReport, SubmissionWindow, distribute_runs};

    fn arguments(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("arg-{i}")).collect()
    }

    fn hosts(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("10.0.0.{i}")).collect()
    }

    fn task(argument: &String) -> TaskDefinition {
        TaskDefinition::new(["run", argument.as_str()])
    }

    async fn dispatch(
        launcher: Arc<dyn Launcher>,
        pool_size: usize,
        max_runs: usize,
        argument_count: usize,
    ) -> DispatchReport {
        let mut cluster = Cluster::start(hosts(pool_size), launcher).unwrap();
        let report = distribute_runs(
            &mut cluster,
            &arguments(argument_count),
            max_runs,
            pool_size,
            task,
        )
        .await;
        cluster.shutdown().await.unwrap();
        report
    }

    #[test]
    fn window_fill_bound() {
        for pool_size in 0..6 {
            for length in 0..6 {
                let args = arguments(length);
                let mut window = SubmissionWindow::new(&args, 9);
                assert_eq!(window.fill(pool_size).count(), pool_size.min(length));
                assert_eq!(window.submitted(), pool_size.min(length));
            }
        }
    }

    #[test]
    fn window_is_monotonic() {
        let args = arguments(5);
        let mut window = SubmissionWindow::new(&args, 4);
        let filled: Vec<usize> = window.fill(2).map(|(index, _)| index).collect();
        assert_eq!(filled, vec![0, 1]);
        assert_eq!(window.replenish(), Some((2, &args[2])));
        assert_eq!(window.replenish(), Some((3, &args[3])));
        assert_eq!(window.replenish(), None);
        assert_eq!(window.replenish(), None);
        assert_eq!(window.submitted(), 4);
    }

    #[test]
    fn window_cap_below_fill() {
        let args = arguments(10);
        let mut window = SubmissionWindow::new(&args, 2);
        assert_eq!(window.fill(5).count(), 5);
        assert_eq!(window.replenish(), None);
    }

    #[tokio::test]
    async fn bounded_rolling_dispatch() {
        let launcher = RecordingLauncher::default().with_delay(Duration::from_millis(10));
        let report = dispatch(Arc::new(launcher.clone()), 3, 9, 20).await;

        assert_eq!(report.initial_window, 3);
        assert_eq!(report.submitted, 9);
        assert_eq!(report.succeeded, 9);
        assert!(report.is_success());

        // Arguments are consumed in order, the rest is never submitted
        let expected: Vec<String> = (0..9).map(|i| format!("run arg-{i}")).collect();
        let mut launched = launcher.launched_commands();
        assert_eq!(launched.len(), 9);
        launched.sort_by_key(|command| {
            command
                .trim_start_matches("run arg-")
                .parse::<usize>()
                .unwrap()
        });
        assert_eq!(launched, expected);
    }

    #[tokio::test]
    async fn pool_larger_than_argument_list() {
        let launcher = RecordingLauncher::default();
        let report = dispatch(Arc::new(launcher.clone()), 5, 9, 2).await;
        assert_eq!(report.initial_window, 2);
        assert_eq!(report.submitted, 2);
        assert_eq!(report.completed(), 2);
        assert_eq!(launcher.launched_commands().len(), 2);
    }

    #[tokio::test]
    async fn max_runs_below_pool_size() {
        let launcher = RecordingLauncher::default();
        let report = dispatch(Arc::new(launcher.clone()), 5, 2, 10).await;
        assert_eq!(report.initial_window, 5);
        assert_eq!(report.submitted, 5);
        assert_eq!(launcher.launched_commands().len(), 5);
    }

    #[tokio::test]
    async fn global_cap() {
        for (pool_size, max_runs, length) in [(1, 4, 3), (2, 0, 7), (3, 3, 3), (4, 6, 5)] {
            let report = dispatch(
                Arc::new(RecordingLauncher::default()),
                pool_size,
                max_runs,
                length,
            )
            .await;
            assert!(report.submitted <= pool_size.max(max_runs));
            assert!(report.submitted <= length);
            assert_eq!(
                report.submitted,
                pool_size.min(length).max(max_runs.min(length))
            );
            assert_eq!(report.completed(), report.submitted);
        }
    }

    #[tokio::test]
    async fn empty_argument_list() {
        let launcher = RecordingLauncher::default();
        let report = dispatch(Arc::new(launcher.clone()), 3, 9, 0).await;
        assert_eq!(report, DispatchReport::default());
        assert!(launcher.launched_commands().is_empty());
    }

    #[tokio::test]
    async fn nonzero_exit_does_not_stop_replenishment() {
        let launcher = RecordingLauncher::default().fail_when_contains("arg-0");
        let report = dispatch(Arc::new(launcher.clone()), 1, 4, 10).await;
        assert_eq!(report.submitted, 4);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.nonzero_exits, vec![(0, 1)]);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn launch_failures_are_reported() {
        let report = dispatch(Arc::new(FailingLauncher), 2, 4, 10).await;
        assert_eq!(report.submitted, 4);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failures.len(), 4);
        assert!(
            report
                .failures
                .iter()
                .all(|(_, failure)| matches!(failure, TaskFailure::LaunchFailed(_)))
        );
        let mut indices: Vec<usize> = report.failures.iter().map(|(index, _)| *index).collect();
        indices.sort();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }
}
