//! Bash-command benchmark.
//!
//! The concrete benchmark variant that drives raw script templates through
//! the remote executor: it knows nothing about what the scripts measure, only
//! that they install, run and yield raw captured output for an external
//! parser.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use benchsuite_core::{Benchmark, Execution, ExecutionEnvironmentRequest, TestExecutor};

use crate::error::{EngineError, Result};
use crate::executor::RemoteSshExecutor;
use crate::transport::RemoteTransport;

pub struct BashCommandBenchmark {
    name: String,
    workload: String,
    transport: Arc<dyn RemoteTransport>,
}

impl BashCommandBenchmark {
    pub fn new(
        name: impl Into<String>,
        workload: impl Into<String>,
        transport: Arc<dyn RemoteTransport>,
    ) -> Self {
        Self {
            name: name.into(),
            workload: workload.into(),
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workload(&self) -> &str {
        &self.workload
    }

    fn executor(&self, execution: &Execution) -> RemoteSshExecutor {
        RemoteSshExecutor::new(execution, Arc::clone(&self.transport))
    }
}

#[async_trait]
impl Benchmark for BashCommandBenchmark {
    type Error = EngineError;

    fn env_request(&self) -> ExecutionEnvironmentRequest {
        ExecutionEnvironmentRequest::new(1)
    }

    async fn prepare(&self, execution: &Execution) -> Result<()> {
        debug!(benchmark = %self.name, workload = %self.workload, "Preparing benchmark");
        self.executor(execution).install().await
    }

    async fn execute(&self, execution: &Execution, async_mode: bool) -> Result<()> {
        self.executor(execution).run(async_mode).await.map(|_| ())
    }

    async fn get_result(&self, execution: &Execution) -> Result<(String, String)> {
        self.executor(execution).collect_results().await
    }
}
