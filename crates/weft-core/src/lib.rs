pub mod context;
pub mod error;
pub mod status;
pub mod step;
pub mod types;

pub use context::RunContext;
pub use error::{Result, WeftError};
pub use status::{NodeStatus, RunPublisher, StatusEvent, StatusHub, STATUS_TOPIC};
pub use step::{MemorySteps, StepRuntime};
pub use types::*;
