/// Everything that can end (or refuse) a generation session.
///
/// Only `TransientPollError` is recovered locally; the poll loop logs it and
/// waits for the next tick. Every other kind leaves the controller in a
/// terminal state until a new `start`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The initial generation call was rejected or errored.
    #[error("{0}")]
    RequestFailed(String),

    /// The server reported a synthesis failure.
    #[error("{0}")]
    SynthesisFailed(String),

    #[error("Audio generation timed out. Please try again later.")]
    Timeout,

    #[error("Audio generation is already in progress for this recording")]
    AlreadyInProgress,

    #[error("status check failed: {0}")]
    TransientPollError(String),
}

pub const GENERIC_FAILURE_MESSAGE: &str = "Audio generation failed";

impl GenerationError {
    /// Server-reported failure, falling back to the generic message when the
    /// server gave none.
    pub fn reported(error: Option<&str>, during_request: bool) -> Self {
        let message = error
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(GENERIC_FAILURE_MESSAGE)
            .to_string();
        if during_request {
            GenerationError::RequestFailed(message)
        } else {
            GenerationError::SynthesisFailed(message)
        }
    }
}
