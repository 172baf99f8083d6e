//! Pool management: keeps a set of cloud instances ("members") at a declared target size.
//!
//! Membership is never cached for long: every mutating operation first refreshes the member list
//! from the provider and then waits, by polling, until the provider reports the expected count.
//! The wait is best-effort. When the polling ceiling is reached, the operation returns a
//! [`Convergence::Partial`] outcome instead of an error.
mod member;
pub mod provider;

pub use member::{InstanceId, InstanceState, Member, POOL_TAG_KEY};

use crate::Error;
use crate::common::config::PoolConfig;
use crate::pool::provider::{CloudProvider, InstanceRequest};
use std::time::Duration;

/// Result of waiting for the pool to reach an expected size.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Convergence {
    Converged,
    /// The polling ceiling was reached before the membership count matched.
    Partial { expected: usize, actual: usize },
}

impl Convergence {
    #[inline]
    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged)
    }
}

pub struct PoolManager {
    config: PoolConfig,
    provider: Box<dyn CloudProvider>,
    members: Vec<Member>,
}

impl PoolManager {
    /// Creates the manager and loads the current membership.
    pub async fn connect(
        config: PoolConfig,
        provider: Box<dyn CloudProvider>,
    ) -> crate::Result<Self> {
        let mut manager = Self {
            config,
            provider,
            members: Vec::new(),
        };
        manager.refresh().await?;
        Ok(manager)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Members observed by the last refresh.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Network addresses of members observed by the last refresh.
    pub fn addresses(&self) -> Vec<String> {
        self.members
            .iter()
            .filter_map(|member| member.address.clone())
            .collect()
    }

    /// Returns true if the instance belongs to this pool.
    pub fn is_member(&self, instance: &Member) -> bool {
        instance.is_running()
            && instance.image_id == self.config.image_id
            && instance.instance_type == self.config.instance_type
            && instance.pool_tag() == Some(self.config.name.as_str())
    }

    /// Reloads the membership from the provider.
    pub async fn refresh(&mut self) -> crate::Result<&[Member]> {
        let instances = self
            .provider
            .list_instances()
            .await
            .map_err(Error::ProviderError)?;
        self.members = instances
            .into_iter()
            .filter(|instance| self.is_member(instance))
            .collect();
        Ok(&self.members)
    }

    /// Adds or removes members so that the pool reaches its target count.
    pub async fn maintain_pool(&mut self) -> crate::Result<Convergence> {
        self.refresh().await?;
        let current_count = self.members.len();
        let target_count = self.config.target_count;
        log::info!("Current count: {current_count}, target count: {target_count}");

        if current_count < target_count {
            self.add_to_pool(target_count - current_count).await?;
        } else if current_count > target_count {
            self.remove_from_pool(current_count - target_count).await?;
        }
        self.wait_for_pool(target_count).await
    }

    /// Requests `count` new members in a single provisioning request.
    pub async fn add_to_pool(&mut self, count: usize) -> crate::Result<Convergence> {
        log::info!("Add count: {count}");
        self.refresh().await?;
        if count == 0 {
            return Ok(Convergence::Converged);
        }
        let expected = self.members.len() + count;

        let request = InstanceRequest {
            image_id: self.config.image_id.clone(),
            instance_type: self.config.instance_type.clone(),
            key_name: self.config.key_name.clone(),
            security_groups: self.config.security_groups.clone(),
            count,
            tags: vec![(POOL_TAG_KEY.to_string(), self.config.name.clone())],
        };
        let ids = self
            .provider
            .run_instances(&request)
            .await
            .map_err(Error::ProviderError)?;
        log::debug!("Requested instances: {}", ids.join(", "));

        self.wait_for_pool(expected).await
    }

    /// Stops `count` members, picked in the order returned by the provider.
    ///
    /// Stopped members remain at the provider, but they are no longer running and therefore
    /// disappear from the membership.
    pub async fn remove_from_pool(&mut self, count: usize) -> crate::Result<Convergence> {
        log::info!("Remove count: {count}");
        self.refresh().await?;
        if count == 0 {
            return Ok(Convergence::Converged);
        }
        let expected = self.members.len().saturating_sub(count);

        let ids: Vec<InstanceId> = self
            .members
            .iter()
            .take(count)
            .map(|member| member.id.clone())
            .collect();
        if ids.is_empty() {
            return self.wait_for_pool(expected).await;
        }
        log::debug!("Stopping instances: {}", ids.join(", "));
        self.provider
            .stop_instances(&ids)
            .await
            .map_err(Error::ProviderError)?;

        self.wait_for_pool(expected).await
    }

    /// Irreversibly destroys every member of the pool.
    pub async fn terminate_pool(&mut self) -> crate::Result<Convergence> {
        self.refresh().await?;
        let ids: Vec<InstanceId> = self.members.iter().map(|member| member.id.clone()).collect();
        for id in ids {
            log::info!("Terminating instance: {id}");
            self.provider
                .terminate_instances(std::slice::from_ref(&id))
                .await
                .map_err(Error::ProviderError)?;
        }
        self.wait_for_pool(0).await
    }

    /// Replaces the pool with freshly provisioned members.
    pub async fn restart_pool(&mut self) -> crate::Result<Convergence> {
        self.terminate_pool().await?;
        self.maintain_pool().await
    }

    /// Polls the membership until it has exactly `count` members or until the cumulative sleep
    /// reaches the configured ceiling. Reaching the ceiling is not an error.
    pub async fn wait_for_pool(&mut self, count: usize) -> crate::Result<Convergence> {
        let step = self.config.sleep_step;
        let max = self.config.sleep_max;
        let mut slept = Duration::ZERO;

        while slept < max {
            self.refresh().await?;
            if self.members.len() == count {
                return Ok(Convergence::Converged);
            }
            log::info!("Sleeping {}", humantime::format_duration(step));
            tokio::time::sleep(step).await;
            slept += step;
            if step.is_zero() {
                // A zero step would never reach the ceiling
                break;
            }
        }

        // The pool may have converged during the last sleep
        self.refresh().await?;
        if self.members.len() == count {
            return Ok(Convergence::Converged);
        }
        let convergence = Convergence::Partial {
            expected: count,
            actual: self.members.len(),
        };
        log::warn!(
            "Pool has {} member(s) instead of {count} after waiting {}",
            self.members.len(),
            humantime::format_duration(slept)
        );
        Ok(convergence)
    }
}
