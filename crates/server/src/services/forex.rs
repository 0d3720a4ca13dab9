use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tertulia_agent::services::ForexService;
use tertulia_core::config::EndpointConfig;
use tertulia_core::errors::ServiceError;

use super::{base_url, read_json, transport_error};

const SERVICE: &str = "forex";

/// Currency converter API, compact response mode.
pub struct ForexClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl ForexClient {
    pub fn from_config(config: &EndpointConfig, client: Client) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        Some(Self {
            client,
            endpoint: base_url(config.endpoint.as_deref()?),
            api_key: config.api_key.clone()?,
        })
    }
}

#[async_trait]
impl ForexService for ForexClient {
    async fn rate(&self, pair: &str) -> Result<f64, ServiceError> {
        let response = self
            .client
            .get(format!("{}/api/v7/convert", self.endpoint))
            .query(&[("q", pair), ("compact", "ultra"), ("apiKey", self.api_key.expose_secret())])
            .send()
            .await
            .map_err(transport_error(SERVICE))?;

        parse_rate(pair, &read_json(SERVICE, response).await?)
    }
}

pub(crate) fn parse_rate(pair: &str, body: &Value) -> Result<f64, ServiceError> {
    body.get(pair)
        .and_then(Value::as_f64)
        .ok_or_else(|| ServiceError::decode(SERVICE, format!("no rate for `{pair}`")))
}
