//! Remote wrapper-script generation.
//!
//! The wrapper is the completion protocol for detached phase runs: it creates
//! the sentinel lock file as its very first action and removes it only after
//! the exit code and elapsed seconds have been persisted, so a poller that
//! observes the lock gone can trust every capture file to be final. The
//! wrapper re-exits with the captured exit code, so a synchronous invocation
//! propagates the real status too.

use crate::artifacts::RemoteArtifactSet;

/// Wrap a raw multi-line command into a single self-contained remote
/// invocation for one phase.
///
/// Callers must not invoke this for commands that are empty after blank-line
/// stripping; resolution-level emptiness is handled (and logged) by the
/// executor before any script is generated.
pub fn wrap_command(
    artifacts: &RemoteArtifactSet,
    working_dir: &str,
    raw_command: &str,
) -> String {
    // blank lines would terminate the inner heredoc early
    let command = strip_blank_lines(raw_command);

    format!(
        "cat << 'EOF' > {wrapper}\n\
         touch {lock}\n\
         mkdir -p {workdir}\n\
         cd {workdir}\n\
         cat << 'END2' > {script}\n\
         set -e\n\
         {command}\n\
         END2\n\
         SECONDS=0\n\
         bash -e  {script} 1> {out} 2> {err}\n\
         echo $? > {ret}\n\
         echo $SECONDS > {time}\n\
         rm {lock}\n\
         exit `cat {ret}`\n\
         EOF\n\
         bash {wrapper}\n",
        wrapper = artifacts.wrapper,
        lock = artifacts.lock,
        workdir = working_dir,
        script = artifacts.script,
        command = command,
        out = artifacts.stdout,
        err = artifacts.stderr,
        ret = artifacts.retcode,
        time = artifacts.runtime,
    )
}

/// Drop empty lines so arbitrary snippets survive the heredoc embedding.
pub fn strip_blank_lines(command: &str) -> String {
    command
        .lines()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchsuite_core::ExecutionPhase;

    fn wrap(command: &str) -> String {
        let artifacts = RemoteArtifactSet::new(ExecutionPhase::Run, "e42");
        wrap_command(&artifacts, "/home/ubuntu/e42", command)
    }

    #[test]
    fn test_lock_created_first_and_removed_after_captures() {
        let script = wrap("./bench.sh");
        let touch = script.find("touch /tmp/run-e42.lock").unwrap();
        let ret = script.find("echo $? > /tmp/run-e42.ret").unwrap();
        let time = script.find("echo $SECONDS > /tmp/run-e42.time").unwrap();
        let rm = script.find("rm /tmp/run-e42.lock").unwrap();

        assert!(touch < ret);
        assert!(ret < time);
        assert!(time < rm);
    }

    #[test]
    fn test_wrapper_reexits_with_captured_status() {
        let script = wrap("./bench.sh");
        assert!(script.contains("exit `cat /tmp/run-e42.ret`"));
    }

    #[test]
    fn test_wrapper_is_written_then_invoked() {
        let script = wrap("./bench.sh");
        assert!(script.starts_with("cat << 'EOF' > /tmp/run-e42.wrapper.sh\n"));
        assert!(script.ends_with("EOF\nbash /tmp/run-e42.wrapper.sh\n"));
    }

    #[test]
    fn test_inner_script_runs_fail_fast_with_redirected_streams() {
        let script = wrap("./bench.sh");
        assert!(script.contains("set -e\n./bench.sh\nEND2"));
        assert!(script
            .contains("bash -e  /tmp/run-e42.sh 1> /tmp/run-e42.out 2> /tmp/run-e42.err"));
    }

    #[test]
    fn test_working_directory_scoped_by_execution() {
        let script = wrap("./bench.sh");
        assert!(script.contains("mkdir -p /home/ubuntu/e42\ncd /home/ubuntu/e42"));
    }

    #[test]
    fn test_blank_lines_stripped_from_command() {
        let script = wrap("echo one\n\necho two\n\n");
        assert!(script.contains("set -e\necho one\necho two\nEND2"));
    }
}
