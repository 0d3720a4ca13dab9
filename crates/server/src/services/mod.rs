//! HTTP clients for the remote collaborators behind the dialog service traits.
//!
//! Every client is built from its config section and only exists when that
//! section is complete; missing ones fall back to [`Unconfigured`].

mod cognitive;
mod documents;
mod forex;
mod graph;
mod identity;
mod luis;
mod ml;
mod qna;
mod table_storage;
mod translator;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;
use tertulia_agent::services::{
    CustomVisionService, DialogServices, FaceService, ForexService, IdentityService,
    IntentRecognizer, MlScoringService, ProfileService, QnaService, TableStorage,
    TranslatorService, Unconfigured, VisionService,
};
use tertulia_core::config::AppConfig;
use tertulia_core::errors::ServiceError;
use tracing::info;

pub use cognitive::{CustomVisionClient, FaceClient, VisionClient};
pub use documents::FileDocumentStore;
pub use forex::ForexClient;
pub use graph::GraphProfileClient;
pub use identity::{BotCredentials, TokenServiceClient};
pub use luis::LuisRecognizer;
pub use ml::MlScoringClient;
pub use qna::QnaMakerClient;
pub use table_storage::TableStorageClient;
pub use translator::TranslatorClient;

pub fn http_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(Duration::from_secs(timeout_secs.max(1))).build()
}

/// Wires every collaborator from configuration.
pub fn dialog_services(
    config: &AppConfig,
    client: &Client,
    credentials: Option<Arc<BotCredentials>>,
) -> DialogServices {
    let unconfigured = Arc::new(Unconfigured);

    let recognizer: Arc<dyn IntentRecognizer> =
        match LuisRecognizer::from_config(&config.luis, client.clone()) {
            Some(recognizer) => Arc::new(recognizer),
            None => unconfigured.clone(),
        };
    let qna: Arc<dyn QnaService> = match QnaMakerClient::from_config(&config.qna, client.clone())
    {
        Some(qna) => Arc::new(qna),
        None => unconfigured.clone(),
    };
    let forex: Arc<dyn ForexService> =
        match ForexClient::from_config(&config.forex.service, client.clone()) {
            Some(forex) => Arc::new(forex),
            None => unconfigured.clone(),
        };
    let ml: Arc<dyn MlScoringService> = match MlScoringClient::from_config(&config.ml, client.clone())
    {
        Some(ml) => Arc::new(ml),
        None => unconfigured.clone(),
    };
    let translator: Arc<dyn TranslatorService> =
        match TranslatorClient::from_config(&config.translator.service, client.clone()) {
            Some(translator) => Arc::new(translator),
            None => unconfigured.clone(),
        };
    let vision: Arc<dyn VisionService> =
        match VisionClient::from_config(&config.vision, client.clone()) {
            Some(vision) => Arc::new(vision),
            None => unconfigured.clone(),
        };
    let face: Arc<dyn FaceService> =
        match FaceClient::from_config(&config.face.service, client.clone()) {
            Some(face) => Arc::new(face),
            None => unconfigured.clone(),
        };
    let custom_vision: Arc<dyn CustomVisionService> =
        match CustomVisionClient::from_config(&config.custom_vision, client.clone()) {
            Some(custom_vision) => Arc::new(custom_vision),
            None => unconfigured.clone(),
        };
    let storage: Arc<dyn TableStorage> =
        match TableStorageClient::from_config(&config.storage, client.clone()) {
            Some(storage) => Arc::new(storage),
            None => unconfigured.clone(),
        };
    let identity: Arc<dyn IdentityService> = match credentials {
        Some(credentials) => Arc::new(TokenServiceClient::new(
            client.clone(),
            &config.channel.token_service_url,
            credentials,
        )),
        None => unconfigured.clone(),
    };
    let profile: Arc<dyn ProfileService> = Arc::new(GraphProfileClient::new(client.clone()));

    info!(
        event_name = "system.bootstrap.services_wired",
        correlation_id = "bootstrap",
        luis = recognizer.is_configured(),
        qna = config.qna.is_configured(),
        storage = config.storage.is_configured(),
        "dialog services wired from configuration"
    );

    DialogServices {
        recognizer,
        qna,
        forex,
        ml,
        translator,
        vision,
        face,
        custom_vision,
        storage,
        identity,
        profile,
        documents: Arc::new(FileDocumentStore::new(config.certificates.directory.clone())),
    }
}

/// Prefixes `https://` when a configured host has no scheme.
pub(crate) fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

pub(crate) fn transport_error(service: &'static str) -> impl Fn(reqwest::Error) -> ServiceError {
    move |error| ServiceError::transport(service, error.to_string())
}

/// Reads a JSON body, turning non-success statuses into [`ServiceError::Status`].
pub(crate) async fn read_json(
    service: &'static str,
    response: Response,
) -> Result<Value, ServiceError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error(service))?;
    if !status.is_success() {
        return Err(status_error(service, status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|error| ServiceError::decode(service, error.to_string()))
}

/// Maps an error body in the usual cognitive services shape,
/// `{"error": {"code", "message"}}` or a bare `{"code", "message"}`.
pub(crate) fn status_error(service: &'static str, status: u16, body: &str) -> ServiceError {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let detail = parsed.as_ref().map(|value| value.get("error").unwrap_or(value));
    let field = |name: &str| {
        detail
            .and_then(|detail| detail.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let message = field("message").unwrap_or_else(|| body.trim().to_string());
    ServiceError::Status { service, status, code: field("code"), message }
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    service: &'static str,
    value: Value,
) -> Result<T, ServiceError> {
    serde_json::from_value(value).map_err(|error| ServiceError::decode(service, error.to_string()))
}

#[cfg(test)]
mod tests {
    use tertulia_core::config::AppConfig;
    use tertulia_core::errors::ServiceError;

    use super::{base_url, dialog_services, http_client, status_error};

    #[test]
    fn nested_error_body_keeps_provider_code() {
        let error = status_error(
            "vision",
            400,
            r#"{"error":{"code":"InvalidImageUrl","message":"Image URL is badly formatted."}}"#,
        );

        assert_eq!(error.code(), Some("InvalidImageUrl"));
        assert_eq!(error.raw_message(), "Image URL is badly formatted.");
    }

    #[test]
    fn flat_and_plain_error_bodies_are_mapped() {
        let flat = status_error("face", 401, r#"{"code":"Unspecified","message":"Access denied"}"#);
        let plain = status_error("forex", 503, "upstream unavailable\n");

        assert_eq!(flat.code(), Some("Unspecified"));
        assert_eq!(
            plain,
            ServiceError::Status {
                service: "forex",
                status: 503,
                code: None,
                message: "upstream unavailable".to_string(),
            }
        );
    }

    #[test]
    fn hosts_without_scheme_default_to_https() {
        assert_eq!(base_url("westus.api.cognitive.microsoft.com/"), "https://westus.api.cognitive.microsoft.com");
        assert_eq!(base_url("http://localhost:5000"), "http://localhost:5000");
    }

    #[tokio::test]
    async fn empty_configuration_wires_unconfigured_collaborators() {
        let client = http_client(5).expect("client");
        let services = dialog_services(&AppConfig::default(), &client, None);

        assert!(!services.recognizer.is_configured());
        let error = services.forex.rate("USD_COP").await.expect_err("forex is not configured");
        assert_eq!(error, ServiceError::NotConfigured { service: "forex" });
    }
}
