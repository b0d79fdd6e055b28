use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::vm::Vm;
use crate::error::CoreError;

/// Number of machines the orchestrator wants leased for one execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionEnvironmentRequest {
    pub n_vms: usize,
}

impl ExecutionEnvironmentRequest {
    pub fn new(n_vms: usize) -> Self {
        Self { n_vms }
    }
}

/// The ordered set of VMs assigned to one execution.
///
/// Owned by the execution that requested it and released back to (or
/// destroyed by) the provider when the execution ends. Never empty while in
/// use; the constructor enforces this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmSetExecutionEnvironment {
    vms: Vec<Vm>,
}

impl VmSetExecutionEnvironment {
    pub fn new(vms: Vec<Vm>) -> Result<Self, CoreError> {
        if vms.is_empty() {
            return Err(CoreError::Validation(
                "an execution environment requires at least one VM".to_string(),
            ));
        }
        Ok(Self { vms })
    }

    pub fn vms(&self) -> &[Vm] {
        &self.vms
    }

    /// The engine drives every phase against the first VM of the set.
    pub fn primary(&self) -> &Vm {
        &self.vms[0]
    }

    pub fn len(&self) -> usize {
        self.vms.len()
    }
}

impl fmt::Display for VmSetExecutionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members: Vec<String> = self.vms.iter().map(|v| v.to_string()).collect();
        write!(f, "Execution Environment[{}]", members.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vm::VmAuth;

    fn vm(address: &str) -> Vm {
        Vm::new(
            format!("id-{}", address),
            address,
            "ubuntu",
            VmAuth::Password("pw".to_string()),
            "ubuntu",
            None,
        )
    }

    #[test]
    fn test_empty_environment_rejected() {
        assert!(VmSetExecutionEnvironment::new(vec![]).is_err());
    }

    #[test]
    fn test_primary_is_first() {
        let env =
            VmSetExecutionEnvironment::new(vec![vm("10.0.0.1"), vm("10.0.0.2")]).unwrap();
        assert_eq!(env.primary().address, "10.0.0.1");
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn test_display_lists_members() {
        let env = VmSetExecutionEnvironment::new(vec![vm("10.0.0.1")]).unwrap();
        assert_eq!(
            env.to_string(),
            "Execution Environment[VM[address: 10.0.0.1]]"
        );
    }
}
