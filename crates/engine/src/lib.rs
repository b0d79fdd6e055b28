pub mod artifacts;
pub mod benchmark;
pub mod error;
pub mod executor;
pub mod poller;
pub mod script;
pub mod state_machine;
pub mod transport;

pub use artifacts::RemoteArtifactSet;
pub use benchmark::BashCommandBenchmark;
pub use error::{EngineError, Result, TransportError};
pub use executor::RemoteSshExecutor;
pub use poller::CompletionPoller;
pub use state_machine::{PhaseState, PhaseStateMachine};
pub use transport::{CommandOutput, ExecOptions, RemoteTransport, SshTransport};
