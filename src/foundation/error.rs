pub type NowcastResult<T> = Result<T, NowcastError>;

#[derive(thiserror::Error, Debug)]
pub enum NowcastError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("decode timed out after {millis} ms")]
    DecodeTimeout { millis: u64 },

    #[error("API {status}")]
    RemoteCall { status: u16 },

    #[error("Bad API response: {0}")]
    MalformedResponse(String),

    #[error("no input frames loaded")]
    EmptyInput,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NowcastError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }
}
