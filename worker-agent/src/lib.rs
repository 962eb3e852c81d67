pub mod agent;
pub mod config;
pub mod driver;
pub mod error;
pub mod store;
pub mod telemetry;

pub use agent::{AgentConfig, RegistrationClient, RunningAgent};
pub use config::Config;
pub use error::{AgentError, AgentResult};
