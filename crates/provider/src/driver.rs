//! Compute-driver seam.
//!
//! The slice of a cloud API the provisioning provider needs: catalog
//! listings, node lifecycle, keypairs, and the driver-dependent floating-IP
//! operations. Concrete drivers (OpenStack, EC2, a test double) live behind
//! this trait; the provider's pooling, selection and health-check logic is
//! generic over it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSize {
    pub id: String,
    pub name: String,
    pub cpus: u32,
    pub ram_mb: u32,
    pub disk_gb: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeImage {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FloatingIp {
    pub address: String,
    /// Id of the node the address is attached to, if any.
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Running,
    Terminated,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub state: NodeState,
    pub public_ips: Vec<String>,
    pub private_ips: Vec<String>,
}

/// Parameters for one create-node call. Optional selections are omitted from
/// the cloud request entirely when `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateNodeRequest {
    pub name: String,
    pub image_id: String,
    pub size_id: String,
    pub key_name: Option<String>,
    pub network_id: Option<String>,
    pub security_group_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Cloud API error: {0}")]
    Api(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Operation not supported by this driver: {0}")]
    Unsupported(&'static str),
}

#[async_trait]
pub trait ComputeDriver: Send + Sync {
    async fn list_sizes(&self) -> Result<Vec<NodeSize>, DriverError>;

    async fn list_images(&self) -> Result<Vec<NodeImage>, DriverError>;

    async fn list_networks(&self) -> Result<Vec<Network>, DriverError>;

    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>, DriverError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, DriverError>;

    async fn create_node(&self, request: &CreateNodeRequest) -> Result<Node, DriverError>;

    async fn destroy_node(&self, node_id: &str) -> Result<(), DriverError>;

    /// Generate a fresh keypair, returning `(key_name, pem_private_key)`.
    async fn create_keypair(&self, name: &str) -> Result<(String, String), DriverError>;

    async fn delete_keypair(&self, name: &str) -> Result<(), DriverError>;

    /// Drivers without floating-IP support report `Unsupported`; the
    /// provider treats that as a soft skip.
    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>, DriverError> {
        Err(DriverError::Unsupported("floating IPs"))
    }

    async fn attach_floating_ip(
        &self,
        _node_id: &str,
        _address: &str,
    ) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("floating IPs"))
    }
}
