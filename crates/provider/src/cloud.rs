//! Cloud-backed provisioning provider.
//!
//! Maintains a pool of previously created VMs and grows it on demand: a
//! lease returns the first `n` pool members, creating the deficit first. New
//! instances are resolved against cached catalogs, created with a random
//! name suffix, waited into the running state, given a public address when
//! the driver supports it, and health-checked over SSH before they may enter
//! the pool. An instance that never becomes reachable is destroyed, never
//! pooled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use benchsuite_core::{
    ExecutionEnvironmentRequest, ServiceProvider, Vm, VmAuth, VmSetExecutionEnvironment,
};
use engine::{ExecOptions, RemoteTransport};

use crate::config::CloudProviderConfig;
use crate::driver::{
    ComputeDriver, CreateNodeRequest, DriverError, Node, NodeImage, NodeSize, NodeState,
};
use crate::error::{ProviderError, Result};

const RUNNING_WAIT_PERIOD: Duration = Duration::from_secs(10);
const RUNNING_WAIT_LIMIT: Duration = Duration::from_secs(600);

/// Catalog and selection values cached per provider instance after first
/// fetch. Kept apart from the serializable configuration; `invalidate` drops
/// everything so the next creation re-resolves against the cloud.
#[derive(Default)]
struct DriverCache {
    sizes: Option<Vec<NodeSize>>,
    images: Option<Vec<NodeImage>>,
    network_id: Option<Option<String>>,
    security_group_id: Option<Option<String>>,
}

impl DriverCache {
    fn invalidate(&mut self) {
        *self = Self::default();
    }
}

struct ProviderState {
    pool: Vec<Vm>,
    cache: DriverCache,
    key_name: Option<String>,
    ssh_private_key: Option<String>,
    keypair_generated: bool,
}

pub struct CloudComputeProvider {
    config: CloudProviderConfig,
    driver: Arc<dyn ComputeDriver>,
    transport: Arc<dyn RemoteTransport>,
    state: Mutex<ProviderState>,
}

impl CloudComputeProvider {
    pub fn new(
        config: CloudProviderConfig,
        driver: Arc<dyn ComputeDriver>,
        transport: Arc<dyn RemoteTransport>,
    ) -> Result<Self> {
        config.validate()?;
        let state = ProviderState {
            pool: Vec::new(),
            cache: DriverCache::default(),
            key_name: config.key_name.clone(),
            ssh_private_key: config.ssh_private_key.clone(),
            keypair_generated: false,
        };
        Ok(Self {
            config,
            driver,
            transport,
            state: Mutex::new(state),
        })
    }

    pub async fn pool_size(&self) -> usize {
        self.state.lock().await.pool.len()
    }

    /// Drop the cached catalogs and selections; the next creation fetches
    /// fresh ones.
    pub async fn invalidate_cache(&self) {
        self.state.lock().await.cache.invalidate();
    }

    async fn lease(&self, n: usize) -> Result<VmSetExecutionEnvironment> {
        let mut state = self.state.lock().await;

        let deficit = n.saturating_sub(state.pool.len());
        if deficit > 0 {
            info!(
                requested = n,
                pooled = state.pool.len(),
                creating = deficit,
                "Pool smaller than the request, creating instances"
            );
            for _ in 0..deficit {
                let vm = self.create_vm(&mut state).await?;
                state.pool.push(vm);
            }
        }

        let leased = state.pool[..n].to_vec();
        Ok(VmSetExecutionEnvironment::new(leased)?)
    }

    async fn create_vm(&self, state: &mut ProviderState) -> Result<Vm> {
        debug!(state = "requested", "Provisioning a new instance");

        // catalogs are fetched once per provider instance
        if state.cache.sizes.is_none() {
            state.cache.sizes = Some(self.driver.list_sizes().await?);
        }
        if state.cache.images.is_none() {
            state.cache.images = Some(self.driver.list_images().await?);
        }

        let size = state
            .cache
            .sizes
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|s| s.id == self.config.size || s.name == self.config.size)
            .cloned()
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "size \"{}\" does not exist in the provider catalog",
                    self.config.size
                ))
            })?;
        let image = state
            .cache
            .images
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|i| i.id == self.config.image || i.name == self.config.image)
            .cloned()
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "image \"{}\" does not exist in the provider catalog",
                    self.config.image
                ))
            })?;

        let network_id = self.resolve_network(&mut state.cache).await;
        let security_group_id = self.resolve_security_group(&mut state.cache).await;

        if state.key_name.is_none() || state.ssh_private_key.is_none() {
            let requested = format!("benchsuite-key-{}", random_suffix());
            let (key_name, private_key) = self.driver.create_keypair(&requested).await?;
            info!(key_name = %key_name, "Generated a new keypair");
            state.key_name = Some(key_name);
            state.ssh_private_key = Some(private_key);
            state.keypair_generated = true;
        }

        let name = format!("benchsuite-{}", random_suffix());
        debug!(
            name = %name,
            image = %image.name,
            size = %size.name,
            key_name = ?state.key_name,
            network = ?network_id,
            security_group = ?security_group_id,
            state = "creating",
            "Creating node"
        );
        let node = self
            .driver
            .create_node(&CreateNodeRequest {
                name,
                image_id: image.id.clone(),
                size_id: size.id.clone(),
                key_name: state.key_name.clone(),
                network_id,
                security_group_id,
            })
            .await?;

        let node = self.wait_until_running(node).await?;
        debug!(node_id = %node.id, "New instance created");

        let node = if node.public_ips.is_empty() {
            self.try_attach_floating_ip(node).await
        } else {
            node
        };

        let address = node
            .public_ips
            .first()
            .or_else(|| node.private_ips.first())
            .cloned()
            .ok_or_else(|| ProviderError::NoAddress(node.id.clone()))?;

        let platform = match &self.config.platform {
            Some(platform) => platform.clone(),
            None => {
                let guessed = guess_platform(&image);
                warn!(platform = %guessed, "\"platform\" not specified, guessing from the image name");
                guessed
            }
        };
        let username = match &self.config.vm_user {
            Some(user) => user.clone(),
            None => {
                let guessed = guess_username(&platform);
                warn!(username = %guessed, "\"vm_user\" not specified, guessing from the platform");
                guessed
            }
        };

        let key = state.ssh_private_key.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "no private key material available for the new instance".to_string(),
            )
        })?;

        let mut vm = Vm::new(
            node.id.clone(),
            address,
            username,
            VmAuth::Key(key),
            platform,
            Some(self.config.effective_working_dir()),
        );
        vm.set_sizing(size.cpus, size.ram_mb, size.disk_gb);

        debug!(vm = %vm, state = "health_checking", "Verifying SSH reachability");
        if let Err(err) = self.health_check(&vm).await {
            error!(
                error = %err,
                node_id = %node.id,
                "Instance initialization failed, destroying it"
            );
            if let Err(destroy_err) = self.driver.destroy_node(&node.id).await {
                error!(
                    error = %destroy_err,
                    node_id = %node.id,
                    "Could not destroy the failed instance"
                );
            }
            return Err(err);
        }

        info!(vm = %vm, state = "ready", "New VM created and initialized");
        Ok(vm)
    }

    async fn wait_until_running(&self, node: Node) -> Result<Node> {
        let mut waited = Duration::ZERO;
        loop {
            let nodes = self.driver.list_nodes().await?;
            if let Some(current) = nodes.into_iter().find(|n| n.id == node.id) {
                if current.state == NodeState::Running {
                    return Ok(current);
                }
            }
            if waited >= RUNNING_WAIT_LIMIT {
                return Err(ProviderError::NodeNeverRan {
                    node_id: node.id,
                    waited_secs: waited.as_secs(),
                });
            }
            debug!(node_id = %node.id, "Instance not running yet, waiting");
            sleep(RUNNING_WAIT_PERIOD).await;
            waited += RUNNING_WAIT_PERIOD;
        }
    }

    /// Best-effort public address assignment; driver-dependent, logged and
    /// skipped when unsupported or when no free address exists.
    async fn try_attach_floating_ip(&self, mut node: Node) -> Node {
        if self.config.no_floating_ip {
            debug!("Floating IP assignment disabled by configuration");
            return node;
        }

        let ips = match self.driver.list_floating_ips().await {
            Ok(ips) => ips,
            Err(DriverError::Unsupported(what)) => {
                debug!(what, "Floating IPs not supported by this driver, skipping");
                return node;
            }
            Err(err) => {
                warn!(error = %err, "Could not list floating IPs, keeping the private address");
                return node;
            }
        };

        let free = ips.into_iter().find(|ip| ip.node_id.is_none());
        let free = match free {
            Some(ip) => ip,
            None => {
                error!("No floating public IPs available, cannot assign a public address");
                return node;
            }
        };

        match self.driver.attach_floating_ip(&node.id, &free.address).await {
            Ok(()) => {
                debug!(address = %free.address, node_id = %node.id, "Attached floating IP");
                node.public_ips.push(free.address);
            }
            Err(err) => {
                warn!(error = %err, "Floating IP attachment failed, keeping the private address");
            }
        }
        node
    }

    /// Exact id-or-name match when a network is requested, the sole existing
    /// network otherwise; absence and ambiguity are soft failures.
    async fn resolve_network(&self, cache: &mut DriverCache) -> Option<String> {
        if let Some(resolved) = &cache.network_id {
            return resolved.clone();
        }
        let candidates = match self.driver.list_networks().await {
            Ok(networks) => networks
                .into_iter()
                .map(|n| (n.id, n.name))
                .collect::<Vec<_>>(),
            Err(err) => {
                warn!(error = %err, "Could not list networks, creating the instance without one");
                Vec::new()
            }
        };
        let resolved = select_soft("network", self.config.network.as_deref(), &candidates);
        cache.network_id = Some(resolved.clone());
        resolved
    }

    async fn resolve_security_group(&self, cache: &mut DriverCache) -> Option<String> {
        if let Some(resolved) = &cache.security_group_id {
            return resolved.clone();
        }
        let candidates = match self.driver.list_security_groups().await {
            Ok(groups) => groups
                .into_iter()
                .map(|g| (g.id, g.name))
                .collect::<Vec<_>>(),
            Err(err) => {
                warn!(
                    error = %err,
                    "Could not list security groups, creating the instance without one"
                );
                Vec::new()
            }
        };
        let resolved = select_soft(
            "security group",
            self.config.security_group.as_deref(),
            &candidates,
        );
        cache.security_group_id = Some(resolved.clone());
        resolved
    }

    /// Bounded retry loop: the instance may take a while to accept SSH
    /// connections after it reports running. On exhaustion the last
    /// connection error is propagated.
    async fn health_check(&self, vm: &Vm) -> Result<()> {
        let attempts = self.config.connection_retry_times.max(1);
        let period = Duration::from_secs(self.config.connection_retry_period);
        info!(max_retries = attempts, vm = %vm, "Trying to connect to the new instance");

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .transport
                .exec(vm, &self.config.post_create_script, ExecOptions::with_pty())
                .await
            {
                Ok(_) => return Ok(()),
                Err(err) if attempt < attempts => {
                    warn!(
                        attempt,
                        max_retries = attempts,
                        error = %err,
                        "Connection failed, the instance may not be ready yet"
                    );
                    sleep(period).await;
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        "Connection failed and no retries are left"
                    );
                    return Err(ProviderError::HealthCheckExhausted {
                        attempts,
                        source: err,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl ServiceProvider for CloudComputeProvider {
    type Error = ProviderError;

    async fn lease_environment(
        &self,
        request: &ExecutionEnvironmentRequest,
    ) -> Result<VmSetExecutionEnvironment> {
        self.lease(request.n_vms).await
    }

    async fn destroy_service(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        let pooled: Vec<String> = state.pool.iter().map(|vm| vm.id.clone()).collect();
        let nodes = self.driver.list_nodes().await?;
        let to_delete: Vec<Node> = nodes
            .into_iter()
            .filter(|n| pooled.contains(&n.id))
            .collect();
        info!(count = to_delete.len(), "Nodes to delete");
        for node in to_delete {
            info!(node_id = %node.id, "Deleting node");
            self.driver.destroy_node(&node.id).await?;
        }
        state.pool.clear();

        if state.keypair_generated {
            if let Some(name) = state.key_name.take() {
                if let Err(err) = self.driver.delete_keypair(&name).await {
                    warn!(error = %err, key_name = %name, "Could not delete the generated keypair");
                }
            }
            state.ssh_private_key = None;
            state.keypair_generated = false;
        }

        Ok(())
    }
}

fn random_suffix() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..6].to_string()
}

fn select_soft(
    kind: &'static str,
    requested: Option<&str>,
    candidates: &[(String, String)],
) -> Option<String> {
    match requested {
        Some(wanted) => {
            let found = candidates
                .iter()
                .find(|(id, name)| id == wanted || name == wanted);
            if found.is_none() {
                warn!(
                    kind,
                    requested = wanted,
                    "Requested resource not found, creating the instance without it"
                );
            }
            found.map(|(id, _)| id.clone())
        }
        None => match candidates {
            [] => {
                debug!(kind, "None available, skipping");
                None
            }
            [(id, _)] => Some(id.clone()),
            _ => {
                warn!(
                    kind,
                    candidates = candidates.len(),
                    "Ambiguous selection, creating the instance without one"
                );
                None
            }
        },
    }
}

/// Best-effort platform tag from the image name when not configured.
fn guess_platform(image: &NodeImage) -> String {
    let name = image.name.to_lowercase();
    for family in ["ubuntu", "debian", "centos", "fedora", "rhel", "suse"] {
        if name.contains(family) {
            return family.to_string();
        }
    }
    "linux".to_string()
}

fn guess_username(platform: &str) -> String {
    let base = platform.split('_').next().unwrap_or(platform);
    match base {
        "ubuntu" => "ubuntu",
        "debian" => "debian",
        "centos" => "centos",
        "fedora" => "fedora",
        _ => "root",
    }
    .to_string()
}
