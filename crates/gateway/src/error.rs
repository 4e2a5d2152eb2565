use streaming::SourceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Missing credential (nothing was sent) or one the server rejected.
    Auth,
    /// The request was rejected before sending (e.g. unsaved polygon).
    Validation(String),
    /// The ring is degenerate after normalization; nothing was sent.
    InvalidGeometry,
    /// Non-success status. `message` comes from the response body when the
    /// server supplied one.
    Request { status: u16, message: String },
    Network(String),
    Aborted,
    Decode(String),
}

impl RemoteError {
    /// Auth and validation failures are the caller's to fix; retrying cannot help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::Network(_) | RemoteError::Request { status: 500.., .. }
        )
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Auth => write!(f, "authentication required, please sign in again"),
            RemoteError::Validation(msg) => write!(f, "{msg}"),
            RemoteError::InvalidGeometry => write!(f, "polygon geometry is invalid"),
            RemoteError::Request { status, message } => write!(f, "{status} - {message}"),
            RemoteError::Network(msg) => write!(f, "network error: {msg}"),
            RemoteError::Aborted => write!(f, "request aborted"),
            RemoteError::Decode(msg) => write!(f, "unexpected server response: {msg}"),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Network(e.to_string())
        }
    }
}

impl From<RemoteError> for SourceError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Auth => SourceError::Unauthorized,
            RemoteError::Request { status, message } => SourceError::Status { status, message },
            RemoteError::Decode(msg) => SourceError::Decode(msg),
            other => SourceError::Network(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RemoteError;
    use streaming::SourceError;

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(RemoteError::Network("reset".into()).is_retryable());
        assert!(
            RemoteError::Request {
                status: 503,
                message: "busy".into()
            }
            .is_retryable()
        );
        assert!(
            !RemoteError::Request {
                status: 400,
                message: "bad".into()
            }
            .is_retryable()
        );
        assert!(!RemoteError::Auth.is_retryable());
        assert!(!RemoteError::InvalidGeometry.is_retryable());
    }

    #[test]
    fn maps_onto_source_errors() {
        assert_eq!(SourceError::from(RemoteError::Auth), SourceError::Unauthorized);
        assert_eq!(
            SourceError::from(RemoteError::Request {
                status: 404,
                message: "no polygon".into()
            }),
            SourceError::Status {
                status: 404,
                message: "no polygon".into()
            }
        );
    }
}
