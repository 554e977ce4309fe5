//! JSON-over-HTTP seam.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;

use crate::error::FetchError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("outagewatch/", env!("CARGO_PKG_VERSION"));

/// Something that can GET a URL and hand back its JSON body.
pub trait JsonSource {
    /// `Ok(None)` when the resource does not exist (HTTP 404).
    fn get_json(&self, url: &str) -> Result<Option<Value>, FetchError>;

    /// Like [`get_json`](Self::get_json) but a 404 is an error.
    fn require_json(&self, url: &str) -> Result<Value, FetchError> {
        self.get_json(url)?.ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

impl<T: JsonSource + ?Sized> JsonSource for &T {
    fn get_json(&self, url: &str) -> Result<Option<Value>, FetchError> {
        (**self).get_json(url)
    }
}

// ---------------------------------------------------------------------------
// ureq
// ---------------------------------------------------------------------------

/// Blocking HTTP client backed by a shared `ureq::Agent`.
#[derive(Clone)]
pub struct UreqSource {
    agent: ureq::Agent,
}

impl UreqSource {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self { agent }
    }
}

impl Default for UreqSource {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonSource for UreqSource {
    fn get_json(&self, url: &str) -> Result<Option<Value>, FetchError> {
        tracing::debug!("GET {url}");
        match self.agent.get(url).call() {
            Ok(response) => response
                .into_json::<Value>()
                .map(Some)
                .map_err(|source| FetchError::Body {
                    url: url.to_string(),
                    source,
                }),
            Err(ureq::Error::Status(404, _)) => {
                tracing::debug!("not found: {url}");
                Ok(None)
            }
            Err(ureq::Error::Status(status, _)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            Err(ureq::Error::Transport(transport)) => Err(FetchError::Transport {
                url: url.to_string(),
                message: transport.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Canned responses keyed by URL; any other URL is a 404.
///
/// Records every requested URL so callers can assert on traversal order.
#[derive(Debug, Default)]
pub struct MemorySource {
    responses: HashMap<String, Value>,
    failures: HashMap<String, u16>,
    requests: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn with(mut self, url: impl Into<String>, body: Value) -> Self {
        self.responses.insert(url.into(), body);
        self
    }

    /// Answer `url` with a non-404 HTTP error.
    pub fn failing(mut self, url: impl Into<String>, status: u16) -> Self {
        self.failures.insert(url.into(), status);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl JsonSource for MemorySource {
    fn get_json(&self, url: &str) -> Result<Option<Value>, FetchError> {
        match self.requests.lock() {
            Ok(mut guard) => guard.push(url.to_string()),
            Err(poisoned) => poisoned.into_inner().push(url.to_string()),
        }
        if let Some(status) = self.failures.get(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            });
        }
        Ok(self.responses.get(url).cloned())
    }
}
