use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

fn default_post_create_script() -> String {
    "echo \"Hello World!\"".to_string()
}

fn default_retry_times() -> u32 {
    20
}

fn default_retry_period_secs() -> u64 {
    30
}

/// Settings for one cloud-backed provider instance.
///
/// Loading these from a configuration file is the caller's concern; the
/// struct only validates. Everything cached at runtime (driver handle,
/// catalogs, resolved selections) lives outside this struct, on the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudProviderConfig {
    pub name: String,
    pub driver: String,
    pub access_id: String,
    pub secret_key: String,
    /// Image selected by exact id or name match against the catalog.
    pub image: String,
    /// Size selected by exact id or name match against the catalog.
    pub size: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub security_group: Option<String>,
    #[serde(default)]
    pub vm_user: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub ssh_private_key: Option<String>,
    #[serde(default = "default_post_create_script")]
    pub post_create_script: String,
    #[serde(default = "default_retry_times")]
    pub connection_retry_times: u32,
    #[serde(default = "default_retry_period_secs")]
    pub connection_retry_period: u64,
    #[serde(default)]
    pub no_floating_ip: bool,
}

impl CloudProviderConfig {
    pub fn validate(&self) -> Result<(), ProviderError> {
        let mandatory = [
            ("name", &self.name),
            ("driver", &self.driver),
            ("access_id", &self.access_id),
            ("secret_key", &self.secret_key),
            ("image", &self.image),
            ("size", &self.size),
        ];
        for (field, value) in mandatory {
            if value.is_empty() {
                return Err(ProviderError::Configuration(format!(
                    "\"{}\" parameter is mandatory in the configuration",
                    field
                )));
            }
        }
        Ok(())
    }

    /// `/home/<vm_user>` when a login user is configured, `/tmp` otherwise;
    /// an explicit `working_dir` overrides both.
    pub fn effective_working_dir(&self) -> String {
        if let Some(dir) = &self.working_dir {
            return dir.clone();
        }
        match &self.vm_user {
            Some(user) => format!("/home/{}", user),
            None => "/tmp".to_string(),
        }
    }
}
