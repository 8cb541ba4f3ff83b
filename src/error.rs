use thiserror::Error;

/// Errors returned by the Buildkite client and the resource adapters.
///
/// Reconcilers wrap failures in [`BuildkiteError::Context`] to say which
/// resource was involved; [`BuildkiteError::kind`] looks through any number of
/// those wrappers so callers can still tell a missing resource apart from a
/// failed request.
#[derive(Error, Debug)]
pub enum BuildkiteError {
    #[error("404 Not Found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Could not decode response body ({length} bytes): {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        length: usize,
        body: String,
    },

    #[error("GraphQL errors in {operation}: {messages}")]
    GraphQL {
        operation: &'static str,
        messages: String,
    },

    #[error("GraphQL response for {0} contained no data")]
    NoResponseData(&'static str),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid resource definition: {0}")]
    Invalid(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<BuildkiteError>,
    },
}

/// Discriminator for [`BuildkiteError`], with context wrappers removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Transport,
    HttpStatus,
    Decode,
    GraphQL,
    BackendInvariant,
    Invalid,
    Encode,
}

impl BuildkiteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Transport(_) => ErrorKind::Transport,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::Decode { .. } | Self::NoResponseData(_) => ErrorKind::Decode,
            Self::GraphQL { .. } => ErrorKind::GraphQL,
            Self::Unsupported(_) => ErrorKind::BackendInvariant,
            Self::Invalid(_) | Self::Url(_) => ErrorKind::Invalid,
            Self::Json(_) => ErrorKind::Encode,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// True when the backend reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Wraps the error with a description of the resource being handled.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Adds resource context to a failed result without changing its kind.
pub trait ResultExt<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T>;

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.context(f()))
    }
}

pub type Result<T> = std::result::Result<T, BuildkiteError>;
