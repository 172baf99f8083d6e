//! Minimal cluster scheduling client.
//!
//! A [`Cluster`] owns a fixed set of worker slots. Tasks are submitted without blocking and
//! executed FIFO by the first idle worker through a [`Launcher`]. Finished tasks can be observed
//! in completion order with [`AsCompleted`], which accepts new handles while it is being drained.

pub mod common;

pub mod cluster;
pub mod completion;
pub mod launcher;
pub mod program;

pub use crate::cluster::{Cluster, Scheduler, TaskHandle, WorkerInfo};
pub use crate::completion::AsCompleted;
pub use crate::launcher::{Launcher, TaskFailure, TaskOutcome, TaskOutput};
pub use crate::program::TaskDefinition;

pub use crate::common::ids::{TaskId, WorkerId};

pub type Error = crate::common::error::SwarmError;
pub type Result<T> = std::result::Result<T, Error>;

pub mod tests {
    pub use crate::common::test_utils::*;
}
