pub mod config;
pub mod error;
pub mod flow;
pub mod loader;
pub mod result;
pub mod settings;
pub mod traits;

pub use config::AppConfig;
pub use error::{ErrorKind, FlowError, Result, ValidationError};
pub use flow::*;
pub use result::{ExecutionResult, NodeMetrics, NodeResult};
pub use settings::{SettingError, SettingValue, Settings};
pub use traits::{CompletionRequest, CompletionResponse, Provider};
