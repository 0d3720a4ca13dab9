use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tertulia_agent::services::{IncomeFeatures, MlScoringService};
use tertulia_core::config::EndpointConfig;
use tertulia_core::errors::ServiceError;

use super::{read_json, transport_error};

const SERVICE: &str = "ml";

/// Request-response scoring web service for the adult income model.
pub struct MlScoringClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl MlScoringClient {
    pub fn from_config(config: &EndpointConfig, client: Client) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        Some(Self {
            client,
            endpoint: config.endpoint.as_deref()?.trim().to_string(),
            api_key: config.api_key.clone()?,
        })
    }
}

#[async_trait]
impl MlScoringService for MlScoringClient {
    async fn score(&self, features: &IncomeFeatures) -> Result<f64, ServiceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request_body(features))
            .send()
            .await
            .map_err(transport_error(SERVICE))?;

        parse_score(read_json(SERVICE, response).await?)
    }
}

/// The model's input schema; columns the bot does not collect are sent empty.
pub(crate) fn request_body(features: &IncomeFeatures) -> Value {
    json!({
        "Inputs": {
            "Entrada": [{
                "age": features.age,
                "workclass": "",
                "fnlwgt": "",
                "education": "",
                "education-num": features.education_years,
                "marital-status": "",
                "occupation": "",
                "relationship": "",
                "race": "",
                "sex": features.sex.as_str(),
                "capital-gain": "",
                "capital-loss": "",
                "hours-per-week": "",
                "native-country": "-States",
                "income": ""
            }]
        },
        "GlobalParameters": {}
    })
}

/// `Results.Salida[0]["Scored Probabilities"]`, sent as a number or a string.
pub(crate) fn parse_score(body: Value) -> Result<f64, ServiceError> {
    let probability = body
        .pointer("/Results/Salida/0/Scored Probabilities")
        .ok_or_else(|| ServiceError::decode(SERVICE, "missing scored probability"))?;

    let parsed = match probability {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .ok_or_else(|| ServiceError::decode(SERVICE, format!("invalid probability `{probability}`")))
}
