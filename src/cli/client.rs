//! Thin HTTP client for the local control API, used by CLI subcommands.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde_json::Value;

pub struct ControlClient {
    base_url: String,
    http: Client,
}

impl ControlClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            base_url: format!("http://{host}:{port}"),
            http: Client::new(),
        }
    }

    /// Build a client pointed at the locally configured service address.
    pub fn from_config() -> Result<Self> {
        let config = Config::load()?;
        Ok(Self::new(&config.server.bind, config.server.port))
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to reach wisp at {}. Is the service running?",
                    self.base_url
                )
            })?;

        Self::into_body(response).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to reach wisp at {}. Is the service running?",
                    self.base_url
                )
            })?;

        Self::into_body(response).await
    }

    async fn into_body(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .context("Invalid response from wisp")?;

        if !status.is_success() {
            let message = body["message"].as_str().unwrap_or("request failed");
            bail!("{message} ({status})");
        }

        Ok(body)
    }
}
