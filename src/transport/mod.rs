//! Backend transport: a single GET returning status and body text.

use std::fmt;

use async_trait::async_trait;

mod fixture;
mod http;

pub use fixture::FixtureTransport;
pub use http::HttpTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into() }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Offline(String),
    Timeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Offline(reason) => write!(f, "backend unreachable: {}", reason),
            TransportError::Timeout => write!(f, "backend timed out"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Single attempt, no retry. `path` carries the route and query, e.g.
/// `/profile?options=...`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Reply, TransportError>;
}
