pub mod domain;
pub mod error;
pub mod parser;
pub mod traits;

pub use domain::environment::{ExecutionEnvironmentRequest, VmSetExecutionEnvironment};
pub use domain::execution::{Execution, ExecutionPhase, PhaseResult};
pub use domain::test_definition::BenchmarkTestDefinition;
pub use domain::vm::{Vm, VmAuth, VmSizing};
pub use error::CoreError;
pub use parser::{ParserRegistry, ResultParser};
pub use traits::{Benchmark, ServiceProvider, TestExecutor};
