pub mod cloud;
pub mod config;
pub mod driver;
pub mod error;
pub mod existing;

pub use cloud::CloudComputeProvider;
pub use config::CloudProviderConfig;
pub use driver::{
    ComputeDriver, CreateNodeRequest, DriverError, FloatingIp, Network, Node, NodeImage,
    NodeSize, NodeState, SecurityGroup,
};
pub use error::{ProviderError, Result};
pub use existing::ExistingVmProvider;
