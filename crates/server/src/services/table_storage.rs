//! Table service entity lookups signed with the SharedKeyLite scheme.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use sha2::Sha256;
use tertulia_agent::services::{TableEntity, TableStorage};
use tertulia_core::config::StorageConfig;
use tertulia_core::errors::ServiceError;
use tracing::warn;

use super::transport_error;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "table_storage";
const API_VERSION: &str = "2019-02-02";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct StorageAccount {
    pub name: String,
    pub key: String,
    pub table_endpoint: String,
}

impl StorageAccount {
    fn with_default_endpoint(name: &str, key: &str, suffix: &str) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
            table_endpoint: format!("https://{name}.table.{suffix}"),
        }
    }
}

/// Reads `AccountName`, `AccountKey` and either `TableEndpoint` or
/// `EndpointSuffix` from a storage connection string.
pub(crate) fn parse_connection_string(raw: &str) -> Option<StorageAccount> {
    let mut fields = std::collections::HashMap::new();
    for part in raw.split(';').map(str::trim).filter(|part| !part.is_empty()) {
        let (key, value) = part.split_once('=')?;
        fields.insert(key.trim().to_ascii_lowercase(), value.trim());
    }

    let name = fields.get("accountname")?;
    let key = fields.get("accountkey")?;
    let mut account = StorageAccount::with_default_endpoint(
        name,
        key,
        fields.get("endpointsuffix").copied().unwrap_or("core.windows.net"),
    );
    if let Some(endpoint) = fields.get("tableendpoint") {
        account.table_endpoint = endpoint.trim_end_matches('/').to_string();
    }
    Some(account)
}

pub struct TableStorageClient {
    client: Client,
    account: StorageAccount,
    signing_key: Vec<u8>,
}

impl TableStorageClient {
    pub fn from_config(config: &StorageConfig, client: Client) -> Option<Self> {
        let account = match (&config.connection_string, &config.account, &config.access_key) {
            (Some(connection_string), _, _) => {
                parse_connection_string(connection_string.expose_secret())
            }
            (None, Some(name), Some(key)) => Some(StorageAccount::with_default_endpoint(
                name,
                key.expose_secret(),
                "core.windows.net",
            )),
            _ => None,
        }?;

        match STANDARD.decode(account.key.as_bytes()) {
            Ok(signing_key) => Some(Self { client, account, signing_key }),
            Err(error) => {
                warn!(
                    event_name = "system.bootstrap.storage_key_invalid",
                    correlation_id = "bootstrap",
                    account = %account.name,
                    error = %error,
                    "storage account key is not valid base64, table storage disabled"
                );
                None
            }
        }
    }

    fn authorization(&self, date: &str, resource: &str) -> Result<String, ServiceError> {
        let signature = sign(&self.signing_key, &string_to_sign(date, &self.account.name, resource))?;
        Ok(format!("SharedKeyLite {}:{signature}", self.account.name))
    }
}

#[async_trait]
impl TableStorage for TableStorageClient {
    async fn retrieve_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<TableEntity, ServiceError> {
        let resource = entity_resource(table, partition_key, row_key);
        let date = rfc1123(Utc::now());

        let response = self
            .client
            .get(format!("{}/{resource}", self.account.table_endpoint))
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header("Accept", "application/json;odata=nometadata")
            .header("Authorization", self.authorization(&date, &resource)?)
            .send()
            .await
            .map_err(transport_error(SERVICE))?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error(SERVICE))?;
        if !status.is_success() {
            return Err(storage_error(status.as_u16(), &body));
        }
        let value: Value = serde_json::from_str(&body)
            .map_err(|error| ServiceError::decode(SERVICE, error.to_string()))?;
        parse_entity(value)
    }
}

/// OData key literals double embedded single quotes.
fn entity_resource(table: &str, partition_key: &str, row_key: &str) -> String {
    format!(
        "{table}(PartitionKey='{}',RowKey='{}')",
        partition_key.replace('\'', "''"),
        row_key.replace('\'', "''")
    )
}

fn rfc1123(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn string_to_sign(date: &str, account: &str, resource: &str) -> String {
    format!("{date}\n/{account}/{resource}")
}

fn sign(key: &[u8], payload: &str) -> Result<String, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|error| ServiceError::transport(SERVICE, error.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Entity properties without the OData bookkeeping fields.
pub(crate) fn parse_entity(body: Value) -> Result<TableEntity, ServiceError> {
    let Value::Object(properties) = body else {
        return Err(ServiceError::decode(SERVICE, "entity body is not an object"));
    };
    let properties: Map<String, Value> =
        properties.into_iter().filter(|(name, _)| !name.starts_with("odata.")).collect();
    Ok(TableEntity(properties))
}

/// Table errors nest the message: `{"odata.error": {"code", "message": {"value"}}}`.
pub(crate) fn storage_error(status: u16, body: &str) -> ServiceError {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let detail = parsed.as_ref().and_then(|value| value.get("odata.error"));
    let code = detail
        .and_then(|detail| detail.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = detail
        .and_then(|detail| detail.pointer("/message/value"))
        .and_then(Value::as_str)
        .map(|message| message.lines().next().unwrap_or_default().to_string())
        .unwrap_or_else(|| body.trim().to_string());

    ServiceError::Status { service: SERVICE, status, code, message }
}
