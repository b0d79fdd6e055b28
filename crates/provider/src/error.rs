use thiserror::Error;

use engine::TransportError;

use crate::driver::DriverError;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Health check exhausted after {attempts} attempts: {source}")]
    HealthCheckExhausted {
        attempts: u32,
        source: TransportError,
    },

    #[error("Instance {node_id} did not reach the running state within {waited_secs}s")]
    NodeNeverRan { node_id: String, waited_secs: u64 },

    #[error("Instance {0} reports no network address")]
    NoAddress(String),

    #[error(transparent)]
    Core(#[from] benchsuite_core::CoreError),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_check_display_carries_the_last_error() {
        let source = TransportError::Connect {
            address: "10.0.0.1:22".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        let error = ProviderError::HealthCheckExhausted {
            attempts: 20,
            source,
        };
        let message = error.to_string();
        assert!(message.contains("20 attempts"));
        assert!(message.contains("10.0.0.1:22"));
    }
}
