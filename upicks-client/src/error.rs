use upicks_shared::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error envelope. `code` is `None` only
    /// when the service sent a code this client does not know.
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<ErrorCode>,
        message: String,
    },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("local store error: {0}")]
    Store(String),
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api { code, .. } => *code,
            _ => None,
        }
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code() == Some(code)
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
