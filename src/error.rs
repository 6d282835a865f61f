/// Error types for the Linode object model
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while talking to the Linode API or working with resource objects
#[derive(Error, Debug)]
pub enum Error {
    /// The API answered 404 for the requested path
    #[error("resource not found: {path}")]
    NotFound { path: String },

    /// The API answered with a body that lacks something we rely on
    #[error("unexpected response: {message}")]
    UnexpectedResponse {
        message: String,
        json: serde_json::Value,
    },

    /// Any other non-success status from the API
    #[error("API request failed with status {status}: {}", reasons.join("; "))]
    Api { status: u16, reasons: Vec<String> },

    /// Transport level failure from reqwest, passed through untouched
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON
    #[error("failed to parse API response: {0}")]
    Json(#[from] serde_json::Error),

    /// Attempted to write a property that is not declared mutable
    #[error("property '{property}' of {kind} is read-only")]
    ReadOnlyProperty {
        kind: &'static str,
        property: String,
    },

    /// The property name is not declared for this kind
    #[error("{kind} has no property named '{property}'")]
    UnknownProperty {
        kind: &'static str,
        property: String,
    },

    /// A snapshot value could not be converted into the requested type
    #[error("failed to decode property '{property}' of {kind}: {source}")]
    Decode {
        kind: &'static str,
        property: String,
        #[source]
        source: serde_json::Error,
    },

    /// A path template placeholder had no value to substitute
    #[error("no value for '{{{param}}}' in path template '{template}'")]
    MissingPathParam { param: String, template: String },

    /// Client construction failed (bad token, bad base URL)
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// An opt-in wait gave up
    #[error("timeout after {secs} seconds: {description}")]
    Timeout { secs: u64, description: String },
}

impl Error {
    /// Build an `UnexpectedResponse` carrying the offending body
    pub fn unexpected(message: impl Into<String>, json: &serde_json::Value) -> Self {
        Error::UnexpectedResponse {
            message: message.into(),
            json: json.clone(),
        }
    }

    /// Whether this is a 404 from the API
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
