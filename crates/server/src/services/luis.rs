use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tertulia_agent::services::IntentRecognizer;
use tertulia_core::config::LuisConfig;
use tertulia_core::domain::activity::Activity;
use tertulia_core::domain::intent::{BookingEntities, CityEntity, Intent, IntentResult};
use tertulia_core::errors::ServiceError;

use super::{base_url, decode, read_json, transport_error};

const SERVICE: &str = "luis";

/// LUIS v2 prediction endpoint with spell checking and sentiment.
pub struct LuisRecognizer {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    spell_check_key: Option<SecretString>,
}

impl LuisRecognizer {
    pub fn from_config(config: &LuisConfig, client: Client) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        let endpoint = format!(
            "{}/luis/v2.0/apps/{}",
            base_url(config.host_name.as_deref()?),
            config.app_id.as_deref()?.trim()
        );
        Some(Self {
            client,
            endpoint,
            api_key: config.api_key.clone()?,
            spell_check_key: config.spell_check_key.clone(),
        })
    }
}

#[async_trait]
impl IntentRecognizer for LuisRecognizer {
    fn is_configured(&self) -> bool {
        true
    }

    async fn recognize(&self, activity: &Activity) -> Result<IntentResult, ServiceError> {
        let text = activity.trimmed_text().unwrap_or_default();
        let mut query = vec![
            ("q", text.to_string()),
            ("verbose", "true".to_string()),
            ("timezoneOffset", "0".to_string()),
        ];
        if let Some(key) = &self.spell_check_key {
            query.push(("spellCheck", "true".to_string()));
            query.push(("bing-spell-check-subscription-key", key.expose_secret().to_string()));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", self.api_key.expose_secret())
            .query(&query)
            .send()
            .await
            .map_err(transport_error(SERVICE))?;

        parse_prediction(text, read_json(SERVICE, response).await?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    altered_query: Option<String>,
    top_scoring_intent: Option<ScoredIntent>,
    #[serde(default)]
    entities: Vec<Entity>,
    #[serde(default)]
    composite_entities: Vec<CompositeEntity>,
    sentiment_analysis: Option<Sentiment>,
}

#[derive(Debug, Deserialize)]
struct ScoredIntent {
    intent: String,
}

#[derive(Debug, Deserialize)]
struct Entity {
    entity: String,
    #[serde(rename = "type")]
    kind: String,
    resolution: Option<Resolution>,
}

#[derive(Debug, Deserialize)]
struct Resolution {
    #[serde(default)]
    values: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompositeEntity {
    parent_type: String,
    value: String,
    #[serde(default)]
    children: Vec<CompositeChild>,
}

#[derive(Debug, Deserialize)]
struct CompositeChild {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct Sentiment {
    score: f64,
}

pub(crate) fn parse_prediction(text: &str, body: Value) -> Result<IntentResult, ServiceError> {
    let prediction: Prediction = decode(SERVICE, body)?;

    let intent = prediction
        .top_scoring_intent
        .as_ref()
        .map(|scored| Intent::from_label(&scored.intent))
        .unwrap_or(Intent::None);
    let entities = BookingEntities {
        from: city(&prediction, "From"),
        to: city(&prediction, "To"),
        travel_date: travel_date(&prediction),
    };

    Ok(IntentResult {
        text: text.to_string(),
        altered_text: prediction.altered_query.filter(|altered| !altered.is_empty()),
        intent,
        sentiment: prediction.sentiment_analysis.map(|sentiment| sentiment.score),
        entities,
    })
}

/// The city text of a `From`/`To` composite and, when its `Airport` child
/// resolved to a list item, the canonical airport name.
fn city(prediction: &Prediction, parent: &str) -> CityEntity {
    let Some(composite) = prediction
        .composite_entities
        .iter()
        .find(|composite| composite.parent_type.eq_ignore_ascii_case(parent))
    else {
        return CityEntity::default();
    };

    let airport = composite
        .children
        .iter()
        .find(|child| child.kind == "Airport")
        .and_then(|child| {
            prediction.entities.iter().find(|entity| {
                entity.kind == "Airport" && entity.entity.eq_ignore_ascii_case(&child.value)
            })
        })
        .and_then(|entity| entity.resolution.as_ref())
        .and_then(|resolution| resolution.values.first())
        .and_then(Value::as_str)
        .map(str::to_string);

    CityEntity { city: Some(composite.value.clone()), airport }
}

/// Date part of the first datetime entity's TIMEX.
fn travel_date(prediction: &Prediction) -> Option<String> {
    prediction
        .entities
        .iter()
        .find(|entity| entity.kind.starts_with("builtin.datetimeV2"))
        .and_then(|entity| entity.resolution.as_ref())
        .and_then(|resolution| resolution.values.first())
        .and_then(|value| value.get("timex"))
        .and_then(Value::as_str)
        .and_then(|timex| timex.split('T').next())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tertulia_core::config::LuisConfig;
    use tertulia_core::domain::intent::Intent;

    use super::{parse_prediction, LuisRecognizer};
    use crate::services::http_client;

    #[test]
    fn booking_prediction_resolves_airports_and_date() {
        let body = json!({
            "query": "flight from paris to gotham tomorrow",
            "alteredQuery": "flight from paris to gotham tomorrow",
            "topScoringIntent": { "intent": "BookFlight", "score": 0.97 },
            "entities": [
                { "entity": "paris", "type": "Airport", "resolution": { "values": ["Paris"] } },
                { "entity": "from paris", "type": "From" },
                { "entity": "to gotham", "type": "To" },
                {
                    "entity": "tomorrow",
                    "type": "builtin.datetimeV2.date",
                    "resolution": { "values": [{ "timex": "2019-03-21", "type": "date" }] }
                }
            ],
            "compositeEntities": [
                { "parentType": "From", "value": "paris", "children": [{ "type": "Airport", "value": "paris" }] },
                { "parentType": "To", "value": "gotham", "children": [] }
            ],
            "sentimentAnalysis": { "label": "neutral", "score": 0.5 }
        });

        let result = parse_prediction("flight from paris to gotham tomorrow", body).expect("parse");

        assert_eq!(result.intent, Intent::BookFlight);
        assert_eq!(result.entities.from.airport.as_deref(), Some("Paris"));
        assert_eq!(result.entities.to.unsupported_city(), Some("gotham"));
        assert_eq!(result.entities.travel_date.as_deref(), Some("2019-03-21"));
        assert_eq!(result.sentiment, Some(0.5));
    }

    #[test]
    fn datetime_timex_keeps_only_the_date_part() {
        let body = json!({
            "topScoringIntent": { "intent": "BookFlight" },
            "entities": [{
                "entity": "tomorrow at 5pm",
                "type": "builtin.datetimeV2.datetime",
                "resolution": { "values": [{ "timex": "2019-03-21T17" }] }
            }]
        });

        let result = parse_prediction("tomorrow at 5pm", body).expect("parse");

        assert_eq!(result.entities.travel_date.as_deref(), Some("2019-03-21"));
        assert_eq!(result.entities.from.city, None);
    }

    #[test]
    fn spell_corrected_query_becomes_the_question() {
        let body = json!({
            "alteredQuery": "temperatura",
            "topScoringIntent": { "intent": "Sensor" },
            "sentimentAnalysis": { "label": "negative", "score": 0.2 }
        });

        let result = parse_prediction("temperatrua", body).expect("parse");

        assert_eq!(result.intent, Intent::Sensor);
        assert_eq!(result.question(), "temperatura");
        assert_eq!(result.sentiment, Some(0.2));
    }

    #[test]
    fn missing_intent_is_none() {
        let result = parse_prediction("hola", json!({})).expect("parse");
        assert_eq!(result.intent, Intent::None);
    }

    #[test]
    fn recognizer_requires_complete_configuration() {
        let client = http_client(5).expect("client");
        let partial = LuisConfig {
            app_id: Some("app".to_string()),
            api_key: None,
            host_name: Some("westus.api.cognitive.microsoft.com".to_string()),
            spell_check_key: None,
        };
        let complete = LuisConfig { api_key: Some("key".to_string().into()), ..partial.clone() };

        assert!(LuisRecognizer::from_config(&partial, client.clone()).is_none());
        let recognizer = LuisRecognizer::from_config(&complete, client).expect("configured");
        assert_eq!(
            recognizer.endpoint,
            "https://westus.api.cognitive.microsoft.com/luis/v2.0/apps/app"
        );
    }
}
