//! Bot access tokens and the channel token service used for user sign-in.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tertulia_agent::services::{IdentityService, TokenResponse};
use tertulia_core::config::ChannelConfig;
use tertulia_core::domain::activity::Activity;
use tertulia_core::errors::ServiceError;

use super::{base_url, decode, read_json, status_error, transport_error};

const TOKEN_SCOPE: &str = "https://api.botframework.com/.default";

/// The bot's app registration, exchanged for an access token on every call.
pub struct BotCredentials {
    client: Client,
    token_endpoint: String,
    app_id: String,
    app_password: SecretString,
}

impl BotCredentials {
    const SERVICE: &'static str = "bot_token";

    /// `None` when the app id or password is missing, as for a local emulator.
    pub fn from_config(config: &ChannelConfig, client: Client) -> Option<Self> {
        let app_id = config.app_id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
        Some(Self {
            client,
            token_endpoint: config.token_endpoint.clone(),
            app_id: app_id.to_string(),
            app_password: config.app_password.clone()?,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub async fn access_token(&self) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(&self.token_endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_password.expose_secret()),
                ("scope", TOKEN_SCOPE),
            ])
            .send()
            .await
            .map_err(transport_error(Self::SERVICE))?;

        parse_access_token(read_json(Self::SERVICE, response).await?)
    }
}

#[derive(Deserialize)]
struct AccessToken {
    access_token: String,
}

pub(crate) fn parse_access_token(body: Value) -> Result<String, ServiceError> {
    let token: AccessToken = decode(BotCredentials::SERVICE, body)?;
    Ok(token.access_token)
}

pub struct TokenServiceClient {
    client: Client,
    base_url: String,
    credentials: Arc<BotCredentials>,
}

impl TokenServiceClient {
    const SERVICE: &'static str = "identity";

    pub fn new(client: Client, token_service_url: &str, credentials: Arc<BotCredentials>) -> Self {
        Self { client, base_url: base_url(token_service_url), credentials }
    }

    async fn bearer(&self) -> Result<String, ServiceError> {
        self.credentials.access_token().await
    }
}

#[async_trait]
impl IdentityService for TokenServiceClient {
    async fn get_user_token(
        &self,
        activity: &Activity,
        connection_name: &str,
        magic_code: Option<&str>,
    ) -> Result<Option<TokenResponse>, ServiceError> {
        let mut query = vec![
            ("userId", activity.from.id.as_str()),
            ("connectionName", connection_name),
            ("channelId", activity.channel_id.as_str()),
        ];
        if let Some(code) = magic_code {
            query.push(("code", code));
        }

        let response = self
            .client
            .get(format!("{}/api/usertoken/GetToken", self.base_url))
            .bearer_auth(self.bearer().await?)
            .query(&query)
            .send()
            .await
            .map_err(transport_error(Self::SERVICE))?;

        // No token cached for the user, or the code did not match.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_user_token(read_json(Self::SERVICE, response).await?)
    }

    async fn get_sign_in_link(
        &self,
        activity: &Activity,
        connection_name: &str,
    ) -> Result<String, ServiceError> {
        let state = sign_in_state(activity, connection_name, self.credentials.app_id());
        let response = self
            .client
            .get(format!("{}/api/botsignin/GetSignInUrl", self.base_url))
            .bearer_auth(self.bearer().await?)
            .query(&[("state", state)])
            .send()
            .await
            .map_err(transport_error(Self::SERVICE))?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error(Self::SERVICE))?;
        if !status.is_success() {
            return Err(status_error(Self::SERVICE, status.as_u16(), &body));
        }
        Ok(body.trim().trim_matches('"').to_string())
    }

    async fn sign_out(
        &self,
        activity: &Activity,
        connection_name: &str,
    ) -> Result<(), ServiceError> {
        let response = self
            .client
            .delete(format!("{}/api/usertoken/SignOut", self.base_url))
            .bearer_auth(self.bearer().await?)
            .query(&[
                ("userId", activity.from.id.as_str()),
                ("connectionName", connection_name),
                ("channelId", activity.channel_id.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error(Self::SERVICE))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.map_err(transport_error(Self::SERVICE))?;
        Err(status_error(Self::SERVICE, status.as_u16(), &body))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUserToken {
    connection_name: String,
    token: Option<String>,
}

pub(crate) fn parse_user_token(body: Value) -> Result<Option<TokenResponse>, ServiceError> {
    let raw: RawUserToken = decode(TokenServiceClient::SERVICE, body)?;
    Ok(raw
        .token
        .filter(|token| !token.is_empty())
        .map(|token| TokenResponse { connection_name: raw.connection_name, token }))
}

/// Base64 JSON naming the connection and the conversation to return to.
pub(crate) fn sign_in_state(activity: &Activity, connection_name: &str, app_id: &str) -> String {
    let state = json!({
        "ConnectionName": connection_name,
        "Conversation": {
            "activityId": activity.id,
            "bot": activity.recipient,
            "channelId": activity.channel_id,
            "conversation": activity.conversation,
            "serviceUrl": activity.service_url,
            "user": activity.from,
        },
        "MsAppId": app_id,
    });
    STANDARD.encode(state.to_string())
}
