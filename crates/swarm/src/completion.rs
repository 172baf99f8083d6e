use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use futures::stream::FuturesUnordered;

use crate::TaskId;
use crate::cluster::TaskHandle;
use crate::launcher::TaskOutcome;

/// Yields outcomes of task handles in the order in which the tasks finish.
///
/// New handles can be added while the stream is being consumed; they will be observed as well.
/// The stream ends when no handle is outstanding.
#[derive(Default)]
pub struct AsCompleted {
    running: FuturesUnordered<TaskHandle>,
}

impl AsCompleted {
    pub fn new(handles: impl IntoIterator<Item = TaskHandle>) -> Self {
        Self {
            running: handles.into_iter().collect(),
        }
    }

    pub fn add(&mut self, handle: TaskHandle) {
        self.running.push(handle);
    }

    /// Number of outstanding handles.
    #[inline]
    pub fn len(&self) -> usize {
        self.running.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}

impl Stream for AsCompleted {
    type Item = (TaskId, TaskOutcome);

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.running).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.running.size_hint()
    }
}
