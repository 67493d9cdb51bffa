//! Blocking `reqwest` transport used for record and live calls.
//!
//! reqwest does not expose the server's reason phrase, so recorded responses
//! carry the canonical phrase for their status (`200 Fine` is stored as
//! `200 OK`). Header values within one name keep their order, but different
//! names come back grouped the way `HeaderMap` stores them.

use crate::config::TransportConfig;
use crate::errors::VcrError;
use crate::runtime::HttpTransport;
use crate::types::{Request, Response};
use reqwest::blocking::Client;
use reqwest::Method;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn from_config(cfg: &TransportConfig) -> Result<Self, VcrError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .user_agent(cfg.user_agent.as_str())
            .build()
            .map_err(|e| VcrError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&self, request: &Request) -> Result<Response, VcrError> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            VcrError::Encoding(format!("invalid request method `{}`: {e}", request.method))
        })?;
        let mut builder = self.client.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .map_err(|e| VcrError::Transport(e.to_string()))?;
        let status = response.status();
        let version = format!("{:?}", response.version());
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();
        let body = response
            .bytes()
            .map_err(|e| VcrError::Transport(e.to_string()))?
            .to_vec();

        Ok(Response {
            version,
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
