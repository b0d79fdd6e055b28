//! Provider for benchmarks against an already existing machine.
//!
//! No cloud API involved: the machine's address and credentials come straight
//! from configuration, and teardown leaves it untouched.

use async_trait::async_trait;
use tracing::{debug, warn};

use benchsuite_core::{
    ExecutionEnvironmentRequest, ServiceProvider, Vm, VmAuth, VmSetExecutionEnvironment,
};

use crate::error::{ProviderError, Result};

pub struct ExistingVmProvider {
    vm: Vm,
}

impl ExistingVmProvider {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        auth: VmAuth,
        platform: impl Into<String>,
        working_dir: Option<String>,
    ) -> Self {
        let address = address.into();
        let id = format!("existing_vm_{}", address);
        Self {
            vm: Vm::new(id, address, username, auth, platform, working_dir),
        }
    }
}

#[async_trait]
impl ServiceProvider for ExistingVmProvider {
    type Error = ProviderError;

    async fn lease_environment(
        &self,
        request: &ExecutionEnvironmentRequest,
    ) -> Result<VmSetExecutionEnvironment> {
        if request.n_vms > 1 {
            warn!(
                requested = request.n_vms,
                "Existing-VM provider always leases its single machine"
            );
        }
        Ok(VmSetExecutionEnvironment::new(vec![self.vm.clone()])?)
    }

    async fn destroy_service(&self) -> Result<()> {
        debug!(vm = %self.vm, "Existing VM is kept; nothing to destroy");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ExistingVmProvider {
        ExistingVmProvider::new(
            "203.0.113.9",
            "root",
            VmAuth::Password("pw".to_string()),
            "centos_7",
            None,
        )
    }

    #[tokio::test]
    async fn test_leases_the_configured_machine() {
        let env = provider()
            .lease_environment(&ExecutionEnvironmentRequest::new(1))
            .await
            .unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env.primary().id, "existing_vm_203.0.113.9");
        assert_eq!(env.primary().platform, "centos_7");
    }

    #[tokio::test]
    async fn test_destroy_is_a_noop() {
        provider().destroy_service().await.unwrap();
    }
}
