//! Errors raised by the registration/heartbeat state machine.

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("registration failed with status {0}")]
    RegistrationFailed(reqwest::StatusCode),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;
