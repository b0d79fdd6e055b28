//! Lock-file completion polling.
//!
//! A detached phase is finished exactly when its sentinel lock file is gone.
//! The poller checks for that over the transport with a staged backoff and no
//! upper bound: benchmark runs are long and unattended by design. Callers
//! needing a deadline wrap `await_completion` in `tokio::time::timeout`.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use benchsuite_core::Vm;

use crate::artifacts::RemoteArtifactSet;
use crate::error::Result;
use crate::transport::{ExecOptions, RemoteTransport};

/// Fixed wait after submission, giving the wrapper time to create the lock.
const GRACE_PERIOD: Duration = Duration::from_secs(5);

pub struct CompletionPoller;

impl CompletionPoller {
    /// Wait until the phase's lock file disappears from the remote host,
    /// returning the total time waited.
    ///
    /// Transport errors abort the wait and propagate; they are never retried
    /// here.
    pub async fn await_completion(
        transport: &dyn RemoteTransport,
        vm: &Vm,
        artifacts: &RemoteArtifactSet,
    ) -> Result<Duration> {
        let started = Instant::now();

        sleep(GRACE_PERIOD).await;

        let mut step = 0u32;
        while Self::lock_exists(transport, vm, artifacts).await? {
            step += 1;
            let sleep_time = Self::sleep_for_step(step);
            info!(
                running_for = %format_hms(started.elapsed()),
                next_sleep_secs = sleep_time.as_secs(),
                lock = %artifacts.lock,
                "Lock file still exists, waiting"
            );
            sleep(sleep_time).await;
        }

        let elapsed = started.elapsed();
        debug!(waited_secs = elapsed.as_secs(), "Lock file released");
        Ok(elapsed)
    }

    async fn lock_exists(
        transport: &dyn RemoteTransport,
        vm: &Vm,
        artifacts: &RemoteArtifactSet,
    ) -> Result<bool> {
        let check = format!("test ! -f {}", artifacts.lock);
        let output = transport.exec(vm, &check, ExecOptions::default()).await?;
        Ok(!output.success())
    }

    /// Staged backoff keyed to the number of polls performed so far: short
    /// sleeps while the run is young, five-minute sleeps once it is clearly a
    /// long one.
    pub fn sleep_for_step(step: u32) -> Duration {
        let secs = match step {
            0..=5 => 10,
            6..=19 => 30,
            20..=69 => 60,
            _ => 300,
        };
        Duration::from_secs(secs)
    }
}

fn format_hms(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", total / 3600, total % 3600 / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use benchsuite_core::{ExecutionPhase, VmAuth};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::transport::CommandOutput;

    /// Serves a scripted sequence of exit statuses for the lock check.
    struct ScriptedTransport {
        statuses: Mutex<VecDeque<i32>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(statuses: &[i32]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RemoteTransport for ScriptedTransport {
        async fn exec(
            &self,
            _vm: &Vm,
            command: &str,
            _options: ExecOptions,
        ) -> std::result::Result<CommandOutput, crate::error::TransportError> {
            self.calls.lock().unwrap().push(command.to_string());
            let exit_status = self.statuses.lock().unwrap().pop_front().unwrap_or(0);
            Ok(CommandOutput {
                exit_status,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn test_vm() -> Vm {
        Vm::new(
            "id",
            "10.0.0.9",
            "ubuntu",
            VmAuth::Password("pw".to_string()),
            "ubuntu",
            None,
        )
    }

    #[test]
    fn test_backoff_stages() {
        assert_eq!(CompletionPoller::sleep_for_step(1), Duration::from_secs(10));
        assert_eq!(CompletionPoller::sleep_for_step(5), Duration::from_secs(10));
        assert_eq!(CompletionPoller::sleep_for_step(6), Duration::from_secs(30));
        assert_eq!(CompletionPoller::sleep_for_step(19), Duration::from_secs(30));
        assert_eq!(CompletionPoller::sleep_for_step(20), Duration::from_secs(60));
        assert_eq!(CompletionPoller::sleep_for_step(69), Duration::from_secs(60));
        assert_eq!(
            CompletionPoller::sleep_for_step(70),
            Duration::from_secs(300)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_only_when_lock_already_gone() {
        let transport = ScriptedTransport::new(&[0]);
        let artifacts = RemoteArtifactSet::new(ExecutionPhase::Run, "e1");

        let waited = CompletionPoller::await_completion(&transport, &test_vm(), &artifacts)
            .await
            .unwrap();

        assert_eq!(waited, Duration::from_secs(5));
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], "test ! -f /tmp/run-e1.lock");
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_lock_released() {
        // lock exists for two checks, gone on the third
        let transport = ScriptedTransport::new(&[1, 1, 0]);
        let artifacts = RemoteArtifactSet::new(ExecutionPhase::Run, "e2");

        let waited = CompletionPoller::await_completion(&transport, &test_vm(), &artifacts)
            .await
            .unwrap();

        // grace period plus two 10s backoff sleeps
        assert_eq!(waited, Duration::from_secs(25));
        assert_eq!(transport.calls.lock().unwrap().len(), 3);
    }
}
