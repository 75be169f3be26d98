use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transfer service returned {status}: {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("Submission was dropped before execution")]
    Cancelled,
}
