//! Error handling for the camera control console.

use thiserror::Error;

/// Failures while exchanging a room key for control information.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The server rejected the room key (HTTP 401), or no key was entered
    #[error("Invalid room code")]
    InvalidCode,

    /// Anything else, carrying the server's message when there was one
    #[error("{0}")]
    Generic(String),
}

/// Failures while fetching the camera list for a resolved room.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The control key is not valid for this room (HTTP 401)
    #[error("Not authorized to control {0}")]
    NotAuthorized(String),

    #[error("{0}")]
    Generic(String),
}

/// Transport failure on a camera command. Logged, never surfaced or retried.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("invalid command url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("request to {url} returned {status}")]
    Status { url: String, status: u16 },
}

/// Rejected access tokens.
#[derive(Error, Debug)]
pub enum InvalidToken {
    #[error("token is not a three-part JWT")]
    Malformed,

    #[error("token payload is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token payload is not valid claims JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("token expired at {0}")]
    Expired(chrono::DateTime<chrono::Utc>),
}

/// Application error types
#[derive(Error, Debug)]
pub enum OurError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Invalid token: {0}")]
    Token(#[from] InvalidToken),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A camera reference from a registry that has since been replaced
    #[error("Camera reference is stale or out of range: {0}")]
    StaleCamera(String),

    /// Generic application errors
    #[error("Application error: {0}")]
    App(String),
}

/// Application result type
pub type OurResult<T> = std::result::Result<T, OurError>;
