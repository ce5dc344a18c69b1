use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{Reply, Transport, TransportError};
use crate::logging::{self, obj, v_num, v_str, Domain, TimingScope};

pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("invalid backend url {:?}", base))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client, base })
    }

    fn resolve(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|e| TransportError::Offline(format!("bad request path {:?}: {}", path, e)))
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Offline(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<Reply, TransportError> {
        let url = self.resolve(path)?;
        let route = url.path().to_string();
        let _timing = TimingScope::new(Domain::Transport, "http_get", &[("route", v_str(&route))]);

        let resp = self.client.get(url).send().await.map_err(classify)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(classify)?;
        logging::debug(
            Domain::Transport,
            "reply",
            obj(&[
                ("route", v_str(&route)),
                ("status", v_num(status as f64)),
                ("bytes", v_num(body.len() as f64)),
            ]),
        );
        Ok(Reply { status, body })
    }
}
