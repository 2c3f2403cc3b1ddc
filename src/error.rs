pub type AsciimateResult<T> = Result<T, AsciimateError>;

/// Top-level error taxonomy used across the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum AsciimateError {
    /// File missing or unreadable.
    #[error("io error: {0}")]
    Io(String),

    /// Unsupported or corrupt image data.
    #[error("decode error: {0}")]
    Decode(String),

    /// Transport failure or timeout talking to the gateway. Retryable.
    #[error("network error: {0}")]
    Network(String),

    /// Missing or rejected credential. Never retried.
    #[error("auth error: {0}")]
    Auth(String),

    /// The service answered, but not with a usable image.
    #[error("model error: {0}")]
    Model(String),

    /// Failure while assembling or writing the output animation.
    #[error("encode error: {0}")]
    Encode(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AsciimateError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Whether the retry policy may re-attempt the failed operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
