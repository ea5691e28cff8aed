//! destpool - lazy lifecycle manager for destination-keyed connection pools

pub mod cache;
pub mod config;
pub mod key;
pub mod manager;
pub mod registry;
pub mod select;
pub mod supervisor;

pub use config::{resolve, ConnOptions, PoolConfig, PoolOptions, PoolVariant, RawConfig};
pub use key::{DestinationKey, Host, Scheme};
pub use manager::{GetPoolOptions, ManagerError, PoolManager};
pub use registry::Registry;
pub use supervisor::{ChildSpec, InstanceDriver, PoolHandle, RestartPolicy, Supervisor};
