use benchsuite_core::ExecutionPhase;

/// The deterministic remote file set for one `(phase, execution-id)` pair.
///
/// Everything the wrapper protocol touches lives under `/tmp` at
/// `<phase>-<execution-id>.<ext>`. Paths are unique per pair, so concurrent
/// executions can share a VM without colliding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifactSet {
    /// Inner script holding the raw phase commands.
    pub script: String,
    /// Wrapper script implementing the capture-and-signal protocol.
    pub wrapper: String,
    /// Sentinel whose existence means "phase still running".
    pub lock: String,
    pub stdout: String,
    pub stderr: String,
    pub retcode: String,
    pub runtime: String,
}

impl RemoteArtifactSet {
    pub fn new(phase: ExecutionPhase, execution_id: &str) -> Self {
        let base = format!("/tmp/{}-{}", phase.as_str(), execution_id);
        Self {
            script: format!("{}.sh", base),
            wrapper: format!("{}.wrapper.sh", base),
            lock: format!("{}.lock", base),
            stdout: format!("{}.out", base),
            stderr: format!("{}.err", base),
            retcode: format!("{}.ret", base),
            runtime: format!("{}.time", base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_the_remote_convention() {
        let artifacts = RemoteArtifactSet::new(ExecutionPhase::Run, "abc123");
        assert_eq!(artifacts.script, "/tmp/run-abc123.sh");
        assert_eq!(artifacts.wrapper, "/tmp/run-abc123.wrapper.sh");
        assert_eq!(artifacts.lock, "/tmp/run-abc123.lock");
        assert_eq!(artifacts.stdout, "/tmp/run-abc123.out");
        assert_eq!(artifacts.stderr, "/tmp/run-abc123.err");
        assert_eq!(artifacts.retcode, "/tmp/run-abc123.ret");
        assert_eq!(artifacts.runtime, "/tmp/run-abc123.time");
    }

    #[test]
    fn test_paths_unique_per_phase_and_id() {
        let a = RemoteArtifactSet::new(ExecutionPhase::Install, "e1");
        let b = RemoteArtifactSet::new(ExecutionPhase::Install, "e2");
        let c = RemoteArtifactSet::new(ExecutionPhase::Run, "e1");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
