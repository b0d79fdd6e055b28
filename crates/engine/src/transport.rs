//! Interactive remote shell transport.
//!
//! One authenticated session per call: connect, run a single command line,
//! return exit status plus captured output. Long-lived phase runs never hold
//! a connection open; they are submitted detached and observed through the
//! lock-file protocol. Retry policy deliberately lives with the callers
//! (provider health checks), never here.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use ssh2::Session;
use tracing::{debug, trace};

use benchsuite_core::{Vm, VmAuth};

use crate::error::TransportError;

const SSH_PORT: u16 = 22;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Sentinel returned by detached submissions: successful status, empty
    /// output. Results must be fetched later with separate `cat` round-trips.
    pub fn detached() -> Self {
        Self {
            exit_status: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Return right after submission, leaving the command running remotely.
    pub detach: bool,
    /// Allocate a pseudo-terminal; sudo with `requiretty` needs one.
    /// Mutually exclusive with `detach`.
    pub request_pty: bool,
}

impl ExecOptions {
    pub fn detached() -> Self {
        Self {
            detach: true,
            request_pty: false,
        }
    }

    pub fn with_pty() -> Self {
        Self {
            detach: false,
            request_pty: true,
        }
    }
}

#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn exec(
        &self,
        vm: &Vm,
        command: &str,
        options: ExecOptions,
    ) -> Result<CommandOutput, TransportError>;
}

/// libssh2-backed transport.
///
/// Authenticates with private-key material when the VM carries one, with a
/// password otherwise. The blocking libssh2 calls run on the blocking thread
/// pool, so callers can wrap any `exec` in `tokio::time::timeout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshTransport;

impl SshTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RemoteTransport for SshTransport {
    async fn exec(
        &self,
        vm: &Vm,
        command: &str,
        options: ExecOptions,
    ) -> Result<CommandOutput, TransportError> {
        if options.detach && options.request_pty {
            return Err(TransportError::PtyWithDetach);
        }

        let command = if options.detach {
            detached_invocation(command)
        } else {
            command.to_string()
        };
        trace!(vm = %vm, detach = options.detach, pty = options.request_pty, "Running remote command");

        let vm = vm.clone();
        let output = tokio::task::spawn_blocking(move || exec_blocking(&vm, &command, options))
            .await
            .map_err(|e| TransportError::Worker(e.to_string()))??;

        Ok(CommandOutput {
            exit_status: output.exit_status,
            stdout: strip_terminal_escapes(&output.stdout),
            stderr: strip_terminal_escapes(&output.stderr),
        })
    }
}

fn exec_blocking(
    vm: &Vm,
    command: &str,
    options: ExecOptions,
) -> Result<CommandOutput, TransportError> {
    let address = format!("{}:{}", vm.address, SSH_PORT);
    let socket_addr = address
        .to_socket_addrs()
        .map_err(|source| TransportError::Connect {
            address: address.clone(),
            source,
        })?
        .next()
        .ok_or_else(|| TransportError::Connect {
            address: address.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address did not resolve",
            ),
        })?;

    let tcp = TcpStream::connect_timeout(&socket_addr, CONNECT_TIMEOUT).map_err(|source| {
        TransportError::Connect {
            address: address.clone(),
            source,
        }
    })?;

    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|source| TransportError::Handshake {
            address: address.clone(),
            source,
        })?;

    match &vm.auth {
        VmAuth::Key(material) => {
            session.userauth_pubkey_memory(&vm.username, None, material, None)
        }
        VmAuth::Password(password) => session.userauth_password(&vm.username, password),
    }
    .map_err(|source| TransportError::Auth {
        username: vm.username.clone(),
        address,
        source,
    })?;

    let mut channel = session.channel_session()?;
    if options.request_pty {
        channel.request_pty("xterm", None, None)?;
    }
    channel.exec(command)?;

    if options.detach {
        // the submitting shell exits as soon as the wrapper is forked
        let mut sink = String::new();
        channel.read_to_string(&mut sink)?;
        channel.wait_close()?;
        debug!("Detached command submitted");
        return Ok(CommandOutput::detached());
    }

    let mut stdout = String::new();
    let mut stderr = String::new();
    channel.read_to_string(&mut stdout)?;
    channel.stderr().read_to_string(&mut stderr)?;
    channel.wait_close()?;
    let exit_status = channel.exit_status()?;

    Ok(CommandOutput {
        exit_status,
        stdout,
        stderr,
    })
}

/// Wrap a (possibly multi-line) command so the remote shell forks it and the
/// submitting session can exit immediately.
fn detached_invocation(command: &str) -> String {
    format!(
        "nohup bash -c {} < /dev/null > /dev/null 2>&1 &",
        shellwords::escape(command)
    )
}

/// Strip VT100/ANSI control sequences a remote PTY may leave in the captured
/// streams, plus carriage returns.
fn strip_terminal_escapes(text: &str) -> String {
    let csi = Regex::new(r"\x1b\[[0-9;?]*[@-~]").expect("escape-sequence pattern");
    csi.replace_all(text, "").replace('\r', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchsuite_core::VmAuth;

    #[test]
    fn test_detached_invocation_forks_and_silences_the_command() {
        let invocation = detached_invocation("echo 'hello'\nsleep 5");
        assert!(invocation.starts_with("nohup bash -c "));
        assert!(invocation.ends_with("< /dev/null > /dev/null 2>&1 &"));
        // the quotes of the raw command survive escaping
        assert!(invocation.contains("hello"));
    }

    #[test]
    fn test_strip_terminal_escapes() {
        assert_eq!(
            strip_terminal_escapes("\x1b[31mred\x1b[0m and plain\r\n"),
            "red and plain\n"
        );
    }

    #[test]
    fn test_strip_terminal_escapes_passes_clean_text_through() {
        assert_eq!(strip_terminal_escapes("benchmark done"), "benchmark done");
    }

    #[tokio::test]
    async fn test_pty_and_detach_are_mutually_exclusive() {
        let vm = Vm::new(
            "id",
            "192.0.2.1",
            "ubuntu",
            VmAuth::Password("pw".to_string()),
            "ubuntu",
            None,
        );
        let options = ExecOptions {
            detach: true,
            request_pty: true,
        };
        let err = SshTransport::new()
            .exec(&vm, "echo hi", options)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::PtyWithDetach));
    }
}
