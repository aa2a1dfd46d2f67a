use tokio_tungstenite::tungstenite;

/// Failure talking to a pushpull server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("server is unavailable")]
    Unavailable,

    #[error("server answered with status {0}")]
    Status(u16),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Other(err.into())
        }
    }

    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Io(io_err)
                if matches!(
                    io_err.kind(),
                    std::io::ErrorKind::ConnectionRefused
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionAborted
                ) =>
            {
                Self::Unavailable
            }
            tungstenite::Error::Http(resp) => Self::Status(resp.status().as_u16()),
            tungstenite::Error::Protocol(e) => Self::Protocol(e.to_string()),
            other => Self::Other(other.into()),
        }
    }

    /// Worth retrying after a pause. 4xx statuses and undecodable bodies are not.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Status(400..=499) | Self::Protocol(_))
    }
}
