pub type ScrollResult<T> = Result<T, ScrollError>;

#[derive(thiserror::Error, Debug)]
pub enum ScrollError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("render backend error: {0}")]
    RenderBackend(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("output path collision: {0}")]
    Collision(String),

    #[error("generation cancelled after {frames_written} frame(s)")]
    Cancelled { frames_written: u64 },

    #[error("record store error: {0}")]
    Store(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScrollError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn render_backend(msg: impl Into<String>) -> Self {
        Self::RenderBackend(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn collision(msg: impl Into<String>) -> Self {
        Self::Collision(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// HTTP status the request boundary reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            _ => 500,
        }
    }

    /// Stable machine-readable name of the variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::RenderBackend(_) => "RENDER_BACKEND_FAILURE",
            Self::Encoding(_) => "ENCODING_FAILURE",
            Self::Collision(_) => "OUTPUT_PATH_COLLISION",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Store(_) => "STORE_FAILURE",
            Self::Other(_) => "INTERNAL",
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
