use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("remote application error: {0}")]
    RemoteApplication(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("extraction contract violation: {0}")]
    ExtractionContract(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    /// Only configuration errors stop the process; everything else degrades to
    /// an empty or failed result at the component boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

const EXCERPT_CHARS: usize = 200;

/// The leading part of a remote response body, for error messages.
pub fn response_excerpt(body: &str) -> String {
    match body.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_owned(),
    }
}
