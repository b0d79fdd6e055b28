use thiserror::Error;

/// Connection-level failures of the remote shell transport.
///
/// Never retried by the transport or the completion poller; retry policy
/// lives with the provisioning provider and the orchestrator.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection to {address} failed: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("SSH handshake with {address} failed: {source}")]
    Handshake {
        address: String,
        source: ssh2::Error,
    },

    #[error("Authentication of {username}@{address} failed: {source}")]
    Auth {
        username: String,
        address: String,
        source: ssh2::Error,
    },

    #[error("SSH session error: {0}")]
    Session(#[from] ssh2::Error),

    #[error("I/O error on the SSH channel: {0}")]
    Io(#[from] std::io::Error),

    #[error("A PTY cannot be requested for a detached command")]
    PtyWithDetach,

    #[error("Transport worker failed: {0}")]
    Worker(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Command execution failed with exit status {exit_status}")]
    CommandFailed {
        command: String,
        exit_status: i32,
        stdout: String,
        stderr: String,
    },

    #[error("No execute commands found for platform {platform}")]
    NoExecuteScript { platform: String },

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Captured value at {path} is not a number: {raw:?}")]
    MalformedCapture { path: String, raw: String },
}

impl EngineError {
    /// Create a command-execution failure carrying the diagnostics read back
    /// from the remote capture files.
    pub fn command_failed(
        command: impl Into<String>,
        exit_status: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
