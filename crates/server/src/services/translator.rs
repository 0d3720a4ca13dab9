use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tertulia_agent::services::{Translation, TranslationResult, TranslatorService};
use tertulia_core::config::EndpointConfig;
use tertulia_core::errors::ServiceError;

use super::{base_url, decode, read_json, transport_error};

const SERVICE: &str = "translator";

/// Translator text API v3.
pub struct TranslatorClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl TranslatorClient {
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
impl TranslatorService for TranslatorClient {
    async fn translate(
        &self,
        text: &str,
        targets: &[String],
    ) -> Result<TranslationResult, ServiceError> {
        let mut query = vec![("api-version", "3.0")];
        query.extend(targets.iter().map(|target| ("to", target.as_str())));

        let response = self
            .client
            .post(format!("{}/translate", self.endpoint))
            .query(&query)
            .header("Ocp-Apim-Subscription-Key", self.api_key.expose_secret())
            .json(&json!([{ "text": text }]))
            .send()
            .await
            .map_err(transport_error(SERVICE))?;

        parse_translation(read_json(SERVICE, response).await?)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResult {
    detected_language: Option<DetectedLanguage>,
    #[serde(default)]
    translations: Vec<RawTranslation>,
}

#[derive(Deserialize)]
struct DetectedLanguage {
    language: String,
}

#[derive(Deserialize)]
struct RawTranslation {
    text: String,
    to: String,
}

/// One result per input text; a single text is always sent.
pub(crate) fn parse_translation(body: Value) -> Result<TranslationResult, ServiceError> {
    let results: Vec<RawResult> = decode(SERVICE, body)?;
    let first = results
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::decode(SERVICE, "empty translation response"))?;

    Ok(TranslationResult {
        detected_language: first.detected_language.map(|detected| detected.language),
        translations: first
            .translations
            .into_iter()
            .map(|raw| Translation { to: raw.to, text: raw.text })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_translation;

    #[test]
    fn detected_language_and_translations_are_read() {
        let result = parse_translation(json!([{
            "detectedLanguage": { "language": "en", "score": 1.0 },
            "translations": [
                { "text": "hola", "to": "es" },
                { "text": "olá", "to": "pt" }
            ]
        }]))
        .expect("parse");

        assert_eq!(result.detected_language.as_deref(), Some("en"));
        assert_eq!(result.translations[1].to, "pt");
        assert_eq!(result.translations[1].text, "olá");
    }

    #[test]
    fn empty_response_is_a_decode_error() {
        let error = parse_translation(json!([])).expect_err("empty");
        assert!(error.to_string().contains("empty translation response"));
    }
}
