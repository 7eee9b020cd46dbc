use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("FMI request timed out")]
    Timeout,

    #[error("FMI request cancelled")]
    Cancelled,

    #[error("FMI HTTP {0}")]
    Status(StatusCode),

    #[error("FMI request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

impl FetchError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }

    /// Transport-class failures: everything the remote side or the network caused.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Status(_) | Self::Transport(_))
    }
}
