use policydesk_core::editor::LookupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),
    /// The session is missing or expired; the user has to log in again.
    #[error("login required")]
    Unauthorized,
    #[error("backend answered {code} for {path}: {body}")]
    Status {
        code: u16,
        path: String,
        body: String,
    },
    #[error("request to {path} failed: {source}")]
    Network {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid backend url '{0}'")]
    InvalidUrl(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

impl From<ClientError> for LookupError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::NotFound(_) => LookupError::NotFound,
            other => LookupError::Unavailable(other.to_string()),
        }
    }
}
