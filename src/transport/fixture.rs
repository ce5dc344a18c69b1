use std::sync::Mutex;

use async_trait::async_trait;

use super::{Reply, Transport, TransportError};

type Responder = Box<dyn Fn(&str) -> Result<Reply, TransportError> + Send + Sync>;

/// In-process transport answering from a closure. Every requested path is
/// recorded in order.
pub struct FixtureTransport {
    responder: Responder,
    requests: Mutex<Vec<String>>,
}

impl FixtureTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<Reply, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with the same 200 body.
    pub fn always(body: &str) -> Self {
        let body = body.to_string();
        Self::new(move |_| Ok(Reply::ok(body.clone())))
    }

    pub fn offline() -> Self {
        Self::new(|_| Err(TransportError::Offline("connection refused".to_string())))
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn get(&self, path: &str) -> Result<Reply, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(path.to_string());
        }
        (self.responder)(path)
    }
}
