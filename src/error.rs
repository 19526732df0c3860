//! Viewer errors

/// Errors surfaced by the viewer controller
#[derive(Debug)]
pub enum ViewerError {
    /// HTTP request to the file API failed
    Http(String),
    /// Server answered with a non-success status
    Status(u16),
    /// A payload could not be decoded
    Decode(String),
    /// A URL could not be built
    InvalidUrl(String),
    /// Live stats transport failure
    Transport(String),
    /// The challenge provider could not be loaded
    ChallengeLoad(String),
    /// No file is currently displayed
    NoFile,
    /// List index out of range
    NoSuchEntry(usize),
    /// Invalid configuration value
    Config(String),
    /// IO error
    Io(String),
}

impl std::fmt::Display for ViewerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewerError::Http(e) => write!(f, "http error: {}", e),
            ViewerError::Status(code) => write!(f, "server returned status {}", code),
            ViewerError::Decode(e) => write!(f, "decode error: {}", e),
            ViewerError::InvalidUrl(e) => write!(f, "invalid url: {}", e),
            ViewerError::Transport(e) => write!(f, "transport error: {}", e),
            ViewerError::ChallengeLoad(e) => write!(f, "challenge failed to load: {}", e),
            ViewerError::NoFile => write!(f, "no file is being viewed"),
            ViewerError::NoSuchEntry(i) => write!(f, "list has no entry {}", i),
            ViewerError::Config(e) => write!(f, "config error: {}", e),
            ViewerError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for ViewerError {}

impl From<std::io::Error> for ViewerError {
    fn from(e: std::io::Error) -> Self {
        ViewerError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for ViewerError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ViewerError::Status(status.as_u16()),
            None => ViewerError::Http(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(e: serde_json::Error) -> Self {
        ViewerError::Decode(e.to_string())
    }
}

impl From<url::ParseError> for ViewerError {
    fn from(e: url::ParseError) -> Self {
        ViewerError::InvalidUrl(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ViewerError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ViewerError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
