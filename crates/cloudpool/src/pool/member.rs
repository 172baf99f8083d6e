use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Tag key that marks instances created for a pool; its value is the pool name.
pub const POOL_TAG_KEY: &str = "cloudpool:pool";

pub type InstanceId = String;

/// Lifecycle state of an instance as reported by the provider.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
    Other(String),
}

impl InstanceState {
    pub fn from_provider(state: &str) -> Self {
        match state {
            "pending" => InstanceState::Pending,
            "running" => InstanceState::Running,
            "shutting-down" => InstanceState::ShuttingDown,
            "terminated" => InstanceState::Terminated,
            "stopping" => InstanceState::Stopping,
            "stopped" => InstanceState::Stopped,
            other => InstanceState::Other(other.to_string()),
        }
    }
}

impl Display for InstanceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceState::Pending => f.write_str("pending"),
            InstanceState::Running => f.write_str("running"),
            InstanceState::ShuttingDown => f.write_str("shutting-down"),
            InstanceState::Terminated => f.write_str("terminated"),
            InstanceState::Stopping => f.write_str("stopping"),
            InstanceState::Stopped => f.write_str("stopped"),
            InstanceState::Other(state) => f.write_str(state),
        }
    }
}

/// One remote compute node known to the provider.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: InstanceId,
    /// Public network address, missing until the instance is up.
    pub address: Option<String>,
    pub state: InstanceState,
    pub image_id: String,
    pub instance_type: String,
    pub tags: BTreeMap<String, String>,
}

impl Member {
    pub fn pool_tag(&self) -> Option<&str> {
        self.tags.get(POOL_TAG_KEY).map(|s| s.as_str())
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self.state, InstanceState::Running)
    }
}

impl Display for Member {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)?;
        if let Some(address) = &self.address {
            write!(f, " ({address})")?;
        }
        Ok(())
    }
}
