//! Remote execution engine.
//!
//! Orchestrates the install, post-install, run and cleanup phases of one
//! execution against the first VM of its environment. Every phase is
//! submitted detached through the transport, observed through the lock-file
//! protocol, and judged by the exit status captured on the remote host, so a
//! dropped SSH connection can never lose a result.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use benchsuite_core::{
    BenchmarkTestDefinition, Execution, ExecutionPhase, PhaseResult, TestExecutor, Vm,
    VmSetExecutionEnvironment,
};

use crate::artifacts::RemoteArtifactSet;
use crate::error::{EngineError, Result};
use crate::poller::CompletionPoller;
use crate::script;
use crate::state_machine::{PhaseState, PhaseStateMachine};
use crate::transport::{ExecOptions, RemoteTransport};

pub struct RemoteSshExecutor {
    id: String,
    test: Arc<BenchmarkTestDefinition>,
    env: VmSetExecutionEnvironment,
    transport: Arc<dyn RemoteTransport>,
    interpolation: HashMap<String, String>,
    states: Mutex<HashMap<ExecutionPhase, PhaseState>>,
}

impl RemoteSshExecutor {
    pub fn new(execution: &Execution, transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            id: execution.id.clone(),
            test: Arc::clone(&execution.test),
            env: execution.env.clone(),
            transport,
            interpolation: HashMap::new(),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Variables substituted for `$$name$$` placeholders in every resolved
    /// script template.
    pub fn with_interpolation(mut self, vars: HashMap<String, String>) -> Self {
        self.interpolation = vars;
        self
    }

    pub async fn phase_state(&self, phase: ExecutionPhase) -> PhaseState {
        self.states
            .lock()
            .await
            .get(&phase)
            .copied()
            .unwrap_or(PhaseState::NotRun)
    }

    fn vm(&self) -> &Vm {
        self.env.primary()
    }

    async fn transition(&self, phase: ExecutionPhase, to: PhaseState) -> Result<()> {
        let mut states = self.states.lock().await;
        let from = states.get(&phase).copied().unwrap_or(PhaseState::NotRun);
        PhaseStateMachine::validate_transition(&from, &to)?;
        debug!(
            phase = phase.as_str(),
            from = from.as_str(),
            to = to.as_str(),
            "Phase state transition"
        );
        states.insert(phase, to);
        Ok(())
    }

    async fn cat(&self, path: &str) -> Result<String> {
        let output = self
            .transport
            .exec(self.vm(), &format!("cat {}", path), ExecOptions::default())
            .await?;
        Ok(output.stdout)
    }

    async fn read_captured_number<T: std::str::FromStr>(&self, path: &str) -> Result<T> {
        let raw = self.cat(path).await?;
        raw.trim()
            .parse()
            .map_err(|_| EngineError::MalformedCapture {
                path: path.to_string(),
                raw: raw.trim().to_string(),
            })
    }

    /// Submit one phase's commands and, unless `async_mode`, wait for the
    /// remote completion signal and classify the captured exit status.
    async fn execute_phase(
        &self,
        phase: ExecutionPhase,
        command: &str,
        async_mode: bool,
    ) -> Result<Option<PhaseResult>> {
        let vm = self.vm();
        info!(
            phase = phase.as_str(),
            execution_id = %self.id,
            vm = %vm,
            "Executing phase commands"
        );
        debug!("Commands:\n{}", command);

        let artifacts = RemoteArtifactSet::new(phase, &self.id);
        let working_dir = format!("{}/{}", vm.working_dir, self.id);
        let remote_script = script::wrap_command(&artifacts, &working_dir, command);

        self.transition(phase, PhaseState::Submitted).await?;
        // detached submission; completion is observed through the lock file
        self.transport
            .exec(vm, &remote_script, ExecOptions::detached())
            .await?;

        if async_mode {
            info!(
                phase = phase.as_str(),
                "Execution launched, returning immediately"
            );
            return Ok(None);
        }

        self.transition(phase, PhaseState::Polling).await?;
        let waited =
            CompletionPoller::await_completion(self.transport.as_ref(), vm, &artifacts).await?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(runtime) = self.read_captured_number::<u64>(&artifacts.runtime).await {
                debug!(
                    waited_secs = waited.as_secs(),
                    runtime_secs = runtime,
                    "Waited vs. actual runtime"
                );
            }
        }

        let exit_status: i32 = self.read_captured_number(&artifacts.retcode).await?;
        info!(
            exit_status,
            phase = phase.as_str(),
            "Execution exited"
        );

        if exit_status != 0 {
            // diagnostics come from the capture files, not the (empty)
            // detached channel
            let stdout = self.cat(&artifacts.stdout).await?;
            let stderr = self.cat(&artifacts.stderr).await?;
            self.transition(phase, PhaseState::Finalized { success: false })
                .await?;
            return Err(EngineError::command_failed(
                command,
                exit_status,
                stdout,
                stderr,
            ));
        }

        self.transition(phase, PhaseState::Finalized { success: true })
            .await?;
        Ok(Some(PhaseResult {
            exit_status,
            stdout: String::new(),
            stderr: String::new(),
            elapsed: waited,
        }))
    }

    async fn run_optional_phase(&self, phase: ExecutionPhase) -> Result<()> {
        let platform = self.vm().platform.clone();
        match self.test.script(phase, &platform, &self.interpolation) {
            Some(command) if !command.is_empty() => {
                self.execute_phase(phase, &command, false).await.map(|_| ())
            }
            _ => {
                warn!(
                    phase = phase.as_str(),
                    platform = %platform,
                    "No commands to execute for this phase"
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl TestExecutor for RemoteSshExecutor {
    type Error = EngineError;

    async fn install(&self) -> Result<()> {
        self.run_optional_phase(ExecutionPhase::Install).await?;
        self.run_optional_phase(ExecutionPhase::PostInstall).await
    }

    async fn run(&self, async_mode: bool) -> Result<Option<PhaseResult>> {
        let platform = self.vm().platform.clone();
        match self
            .test
            .script(ExecutionPhase::Run, &platform, &self.interpolation)
        {
            Some(command) if !command.is_empty() => {
                self.execute_phase(ExecutionPhase::Run, &command, async_mode)
                    .await
            }
            _ => {
                error!(platform = %platform, "No execute commands found for this platform");
                Err(EngineError::NoExecuteScript { platform })
            }
        }
    }

    async fn collect_results(&self) -> Result<(String, String)> {
        let artifacts = RemoteArtifactSet::new(ExecutionPhase::Run, &self.id);
        let stdout = self.cat(&artifacts.stdout).await?;
        let stderr = self.cat(&artifacts.stderr).await?;
        Ok((stdout, stderr))
    }

    async fn get_runtime(&self, phase: ExecutionPhase) -> Result<u64> {
        let artifacts = RemoteArtifactSet::new(phase, &self.id);
        self.read_captured_number(&artifacts.runtime).await
    }

    async fn cleanup(&self) -> Result<()> {
        self.run_optional_phase(ExecutionPhase::Cleanup).await
    }
}
