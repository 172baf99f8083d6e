pub mod common;
pub mod dispatch;
pub mod pool;
pub mod prepare;
pub mod remote;
pub mod run;
pub mod tasks;

#[cfg(test)]
pub(crate) mod tests;

pub type Error = crate::common::error::PoolError;
pub type Result<T> = std::result::Result<T, Error>;

pub const CLOUDPOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
