use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tertulia_agent::services::ProfileService;
use tertulia_core::errors::ServiceError;

use super::{decode, read_json, transport_error};

const SERVICE: &str = "graph";
const ME_URL: &str = "https://graph.microsoft.com/v1.0/me";

/// Signed-in user's profile, read with the user's own token.
pub struct GraphProfileClient {
    client: Client,
}

impl GraphProfileClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProfileService for GraphProfileClient {
    async fn display_name(&self, token: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .get(ME_URL)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error(SERVICE))?;

        parse_display_name(read_json(SERVICE, response).await?)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Me {
    display_name: Option<String>,
}

pub(crate) fn parse_display_name(body: Value) -> Result<String, ServiceError> {
    let me: Me = decode(SERVICE, body)?;
    me.display_name.ok_or_else(|| ServiceError::decode(SERVICE, "profile has no display name"))
}
