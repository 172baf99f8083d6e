mod common;
pub mod ec2;

use std::future::Future;
use std::pin::Pin;

use crate::pool::member::{InstanceId, Member};

pub type ProviderResult<T> = anyhow::Result<T>;

pub type ProviderFuture<T> = Pin<Box<dyn Future<Output = ProviderResult<T>>>>;

/// Parameters of a single provisioning request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InstanceRequest {
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub security_groups: Vec<String>,
    /// Exactly this many instances are requested, not fewer.
    pub count: usize,
    pub tags: Vec<(String, String)>,
}

/// Handler that can communicate with a cloud provider (e.g. Amazon EC2).
pub trait CloudProvider {
    /// Lists all instances visible in the configured region, regardless of their state.
    fn list_instances(&self) -> ProviderFuture<Vec<Member>>;

    /// Creates all requested instances in a single request.
    fn run_instances(&self, request: &InstanceRequest) -> ProviderFuture<Vec<InstanceId>>;

    /// Stops the given instances. They stay provider-resident and can be started again.
    fn stop_instances(&self, ids: &[InstanceId]) -> ProviderFuture<()>;

    /// Irreversibly destroys the given instances.
    fn terminate_instances(&self, ids: &[InstanceId]) -> ProviderFuture<()>;
}
