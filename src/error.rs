use reqwest::StatusCode;
use thiserror::Error;

/// Failures of the row store client. Absent rows are not errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row store responded {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("row store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("row store returned malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("row has no string `id` field")]
    MissingId,

    #[error("invalid row store url: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl StoreError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            StoreError::Status { status, .. } => Some(*status),
            StoreError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity header is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("identity header contains bytes not allowed in a header value")]
    InvalidHeader,

    #[error("identity assertion has an empty email")]
    EmptyEmail,
}

/// Raised inside the evaluator; callers only ever see it through
/// `Decision::Failed`.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("user row could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}
