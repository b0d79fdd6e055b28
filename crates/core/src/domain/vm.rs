use serde::{Deserialize, Serialize};
use std::fmt;

/// Login secret used by the remote shell transport.
///
/// Key material is the PEM text itself, not a path: providers hand the
/// generated key straight to the transport without touching the filesystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VmAuth {
    Key(String),
    Password(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VmSizing {
    pub cpus: u32,
    pub ram_mb: u32,
    pub disk_gb: u32,
}

/// One leased machine.
///
/// Immutable once created, except for `sizing`, which the provider records
/// once right after creation. VMs are destroyed by their provider, never by
/// the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vm {
    pub id: String,
    pub address: String,
    pub username: String,
    pub auth: VmAuth,
    /// Free-form OS tag used for script-template fallback, e.g. `ubuntu_16_04`.
    pub platform: String,
    pub working_dir: String,
    sizing: Option<VmSizing>,
}

impl Vm {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        username: impl Into<String>,
        auth: VmAuth,
        platform: impl Into<String>,
        working_dir: Option<String>,
    ) -> Self {
        let username = username.into();
        let working_dir = working_dir.unwrap_or_else(|| format!("/home/{}", username));
        Self {
            id: id.into(),
            address: address.into(),
            username,
            auth,
            platform: platform.into(),
            working_dir,
            sizing: None,
        }
    }

    pub fn set_sizing(&mut self, cpus: u32, ram_mb: u32, disk_gb: u32) {
        self.sizing = Some(VmSizing {
            cpus,
            ram_mb,
            disk_gb,
        });
    }

    pub fn sizing(&self) -> Option<VmSizing> {
        self.sizing
    }
}

impl fmt::Display for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VM[address: {}]", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vm(working_dir: Option<String>) -> Vm {
        Vm::new(
            "node-1",
            "10.0.0.5",
            "ubuntu",
            VmAuth::Password("secret".to_string()),
            "ubuntu_16_04",
            working_dir,
        )
    }

    #[test]
    fn test_working_dir_defaults_to_home() {
        let vm = test_vm(None);
        assert_eq!(vm.working_dir, "/home/ubuntu");
    }

    #[test]
    fn test_working_dir_override() {
        let vm = test_vm(Some("/srv/bench".to_string()));
        assert_eq!(vm.working_dir, "/srv/bench");
    }

    #[test]
    fn test_sizing_recorded_after_creation() {
        let mut vm = test_vm(None);
        assert!(vm.sizing().is_none());

        vm.set_sizing(4, 8192, 80);
        assert_eq!(
            vm.sizing(),
            Some(VmSizing {
                cpus: 4,
                ram_mb: 8192,
                disk_gb: 80,
            })
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(test_vm(None).to_string(), "VM[address: 10.0.0.5]");
    }
}
