use thiserror::Error;

pub type Result<T> = std::result::Result<T, GithubError>;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),

    #[error("GitHub GraphQL error: {0}")]
    GraphQl(String),

    #[error("we expected something from GitHub, but it gave us nothing: {0}")]
    EmptyResponse(String),
}

impl GithubError {
    /// The server-provided GraphQL error message, when there is one. Handlers
    /// show this to the user and fall back to a generic string otherwise.
    pub fn graphql_message(&self) -> Option<&str> {
        match self {
            Self::GraphQl(message) => Some(message),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GithubError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for GithubError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}
