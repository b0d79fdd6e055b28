use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::environment::VmSetExecutionEnvironment;
use crate::domain::test_definition::BenchmarkTestDefinition;

/// One named stage of a benchmark's lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    Install,
    #[serde(rename = "postinstall")]
    PostInstall,
    Run,
    Cleanup,
}

impl ExecutionPhase {
    /// Name used in remote artifact paths (`/tmp/<phase>-<id>.<ext>`) and as
    /// the script-template key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::PostInstall => "postinstall",
            Self::Run => "run",
            Self::Cleanup => "cleanup",
        }
    }

    /// Accepts the legacy template spellings `execute` and `remove` so
    /// definitions written for older suites keep loading.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "install" => Some(Self::Install),
            "postinstall" => Some(Self::PostInstall),
            "run" | "execute" => Some(Self::Run),
            "cleanup" | "remove" => Some(Self::Cleanup),
            _ => None,
        }
    }
}

/// One submitted benchmark execution: an id assigned at submission time, the
/// test definition to run, and the leased environment to run it on.
#[derive(Debug, Clone)]
pub struct Execution {
    pub id: String,
    pub test: Arc<BenchmarkTestDefinition>,
    pub env: VmSetExecutionEnvironment,
    pub created_at: DateTime<Utc>,
}

impl Execution {
    pub fn new(test: Arc<BenchmarkTestDefinition>, env: VmSetExecutionEnvironment) -> Self {
        Self::with_id(Uuid::new_v4().simple().to_string(), test, env)
    }

    pub fn with_id(
        id: impl Into<String>,
        test: Arc<BenchmarkTestDefinition>,
        env: VmSetExecutionEnvironment,
    ) -> Self {
        Self {
            id: id.into(),
            test,
            env,
            created_at: Utc::now(),
        }
    }
}

/// Captured outcome of one phase run. Held only for the duration of
/// orchestration; nothing here is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseResult {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl PhaseResult {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        assert_eq!(ExecutionPhase::Install.as_str(), "install");
        assert_eq!(ExecutionPhase::PostInstall.as_str(), "postinstall");
        assert_eq!(ExecutionPhase::Run.as_str(), "run");
        assert_eq!(ExecutionPhase::Cleanup.as_str(), "cleanup");
    }

    #[test]
    fn test_phase_parse_roundtrip() {
        for phase in [
            ExecutionPhase::Install,
            ExecutionPhase::PostInstall,
            ExecutionPhase::Run,
            ExecutionPhase::Cleanup,
        ] {
            assert_eq!(ExecutionPhase::parse(phase.as_str()), Some(phase));
        }
    }

    #[test]
    fn test_phase_parse_legacy_aliases() {
        assert_eq!(ExecutionPhase::parse("execute"), Some(ExecutionPhase::Run));
        assert_eq!(ExecutionPhase::parse("remove"), Some(ExecutionPhase::Cleanup));
        assert_eq!(ExecutionPhase::parse("warmup"), None);
    }

    #[test]
    fn test_phase_result_success() {
        let result = PhaseResult {
            exit_status: 0,
            stdout: String::new(),
            stderr: String::new(),
            elapsed: Duration::from_secs(1),
        };
        assert!(result.success());

        let failed = PhaseResult {
            exit_status: 137,
            ..result
        };
        assert!(!failed.success());
    }
}
