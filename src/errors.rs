use thiserror::Error;

/// Result alias used by collaborator traits and configuration I/O
pub type CopilotResult<T> = Result<T, CopilotError>;

/// Errors raised by the copilot's collaborators.
///
/// The Decision Engine and Encoder Manager never surface these to the caller
/// for recoverable conditions; they log and fall back instead.
#[derive(Debug, Error)]
pub enum CopilotError {
    /// Latency probe failed or timed out
    #[error("Network probe error: {0}")]
    Probe(String),

    /// Transport statistics could not be read
    #[error("Stats error: {0}")]
    Stats(String),

    /// Transport-level control operation failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Encoder configuration or per-frame encode failure
    #[error("Encoder error: {0}")]
    Encoder(String),

    /// Decoder configuration or decode failure
    #[error("Decoder error: {0}")]
    Decoder(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation attempted before the component was initialized
    #[error("Not initialized: {0}")]
    NotInitialized(String),
}

impl CopilotError {
    /// Whether the error belongs to the measurement class (probe or stats)
    pub fn is_measurement(&self) -> bool {
        matches!(self, CopilotError::Probe(_) | CopilotError::Stats(_))
    }
}
