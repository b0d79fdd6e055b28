//! Capability contracts implemented by the concrete engine and providers.
//!
//! These are the seams of the system: the executor drives phases on a leased
//! environment, a service provider leases and tears down that environment,
//! and a benchmark ties a test definition to both. Each implementation brings
//! its own error type.

use async_trait::async_trait;

use crate::domain::environment::{ExecutionEnvironmentRequest, VmSetExecutionEnvironment};
use crate::domain::execution::{Execution, ExecutionPhase, PhaseResult};

/// Drives the remote phases of one execution.
///
/// Phases run strictly in program order: install, postinstall, run, cleanup.
#[async_trait]
pub trait TestExecutor {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run the install phase and then the post-install phase, synchronously.
    async fn install(&self) -> Result<(), Self::Error>;

    /// Run the run phase. With `async_mode` the call returns `None` right
    /// after submission and completion must be awaited separately; otherwise
    /// the captured outcome of the finished phase is returned.
    async fn run(&self, async_mode: bool) -> Result<Option<PhaseResult>, Self::Error>;

    /// Read back the captured stdout and stderr of a completed run phase.
    async fn collect_results(&self) -> Result<(String, String), Self::Error>;

    /// Read the captured elapsed seconds of a finished phase.
    async fn get_runtime(&self, phase: ExecutionPhase) -> Result<u64, Self::Error>;

    /// Run the cleanup phase when one is defined.
    async fn cleanup(&self) -> Result<(), Self::Error>;
}

/// Leases the machines executions run on and destroys them on teardown.
#[async_trait]
pub trait ServiceProvider {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn lease_environment(
        &self,
        request: &ExecutionEnvironmentRequest,
    ) -> Result<VmSetExecutionEnvironment, Self::Error>;

    async fn destroy_service(&self) -> Result<(), Self::Error>;
}

/// One runnable benchmark: knows what environment it needs and how to drive
/// its phases through an executor.
#[async_trait]
pub trait Benchmark {
    type Error: std::error::Error + Send + Sync + 'static;

    fn env_request(&self) -> ExecutionEnvironmentRequest;

    async fn prepare(&self, execution: &Execution) -> Result<(), Self::Error>;

    async fn execute(&self, execution: &Execution, async_mode: bool) -> Result<(), Self::Error>;

    async fn get_result(&self, execution: &Execution) -> Result<(String, String), Self::Error>;
}
