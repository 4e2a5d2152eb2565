use gateway::RemoteError;
use scene::{InteractionError, StoreError};

/// Failure of one session operation. Every variant is also posted as a notice.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    Store(StoreError),
    Remote(RemoteError),
    Interaction(InteractionError),
    UnknownLayer(String),
}

impl SessionError {
    /// Validation and auth failures block the operation before any request.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SessionError::Store(StoreError::Validation(_))
                | SessionError::Remote(
                    RemoteError::Auth | RemoteError::Validation(_) | RemoteError::InvalidGeometry
                )
        )
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Store(e) => write!(f, "{e}"),
            SessionError::Remote(e) => write!(f, "{e}"),
            SessionError::Interaction(e) => write!(f, "{e}"),
            SessionError::UnknownLayer(id) => write!(f, "unknown layer: {id}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Store(e) => Some(e),
            SessionError::Remote(e) => Some(e),
            SessionError::Interaction(e) => Some(e),
            SessionError::UnknownLayer(_) => None,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(value: StoreError) -> Self {
        SessionError::Store(value)
    }
}

impl From<RemoteError> for SessionError {
    fn from(value: RemoteError) -> Self {
        SessionError::Remote(value)
    }
}

impl From<InteractionError> for SessionError {
    fn from(value: InteractionError) -> Self {
        SessionError::Interaction(value)
    }
}
