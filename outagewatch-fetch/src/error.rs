//! Error types for outagewatch-fetch.

use thiserror::Error;

/// All errors that can arise while fetching a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Connection, DNS, TLS or timeout failure.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Response body was not valid JSON.
    #[error("invalid JSON body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON was valid but not shaped the way the stormcenter API shapes it.
    #[error("unexpected response from {url}: {what}")]
    Shape { url: String, what: String },

    /// An encoded polyline could not be decoded.
    #[error("invalid encoded polyline at byte {offset}: {reason}")]
    Polyline { offset: usize, reason: &'static str },
}

/// Convenience constructor for [`FetchError::Shape`].
pub(crate) fn shape_err(url: &str, what: impl Into<String>) -> FetchError {
    FetchError::Shape {
        url: url.to_string(),
        what: what.into(),
    }
}
