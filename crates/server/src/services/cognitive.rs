//! Computer vision, face and custom vision clients.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tertulia_agent::services::{
    Classifier, CustomVisionService, DetectedFace, EmotionScores, FaceService, IdentifyCandidate,
    ImageAnalysis, Prediction, VisionService,
};
use tertulia_core::config::{CustomVisionConfig, EndpointConfig};
use tertulia_core::errors::ServiceError;

use super::{base_url, decode, read_json, transport_error};

const SUBSCRIPTION_KEY: &str = "Ocp-Apim-Subscription-Key";

fn keyed_endpoint(config: &EndpointConfig) -> Option<(String, SecretString)> {
    if !config.is_configured() {
        return None;
    }
    Some((base_url(config.endpoint.as_deref()?), config.api_key.clone()?))
}

pub struct VisionClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl VisionClient {
    const SERVICE: &'static str = "vision";

    pub fn from_config(config: &EndpointConfig, client: Client) -> Option<Self> {
        let (endpoint, api_key) = keyed_endpoint(config)?;
        Some(Self { client, endpoint, api_key })
    }
}

#[async_trait]
impl VisionService for VisionClient {
    async fn analyze(&self, image_url: &str) -> Result<ImageAnalysis, ServiceError> {
        let response = self
            .client
            .post(format!("{}/vision/v2.1/analyze", self.endpoint))
            .query(&[("visualFeatures", "Categories,Description"), ("language", "es")])
            .header(SUBSCRIPTION_KEY, self.api_key.expose_secret())
            .json(&json!({ "url": image_url }))
            .send()
            .await
            .map_err(transport_error(Self::SERVICE))?;

        parse_analysis(read_json(Self::SERVICE, response).await?)
    }
}

#[derive(Default, Deserialize)]
struct Analysis {
    #[serde(default)]
    categories: Vec<Category>,
    description: Option<Description>,
}

#[derive(Deserialize)]
struct Category {
    name: String,
}

#[derive(Deserialize)]
struct Description {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    captions: Vec<Caption>,
}

#[derive(Deserialize)]
struct Caption {
    text: String,
}

pub(crate) fn parse_analysis(body: Value) -> Result<ImageAnalysis, ServiceError> {
    let analysis: Analysis = decode(VisionClient::SERVICE, body)?;
    let (tags, caption) = match analysis.description {
        Some(description) => {
            (description.tags, description.captions.into_iter().next().map(|caption| caption.text))
        }
        None => (Vec::new(), None),
    };

    Ok(ImageAnalysis {
        category: analysis.categories.into_iter().next().map(|category| category.name),
        caption,
        tags,
    })
}

pub struct FaceClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl FaceClient {
    const SERVICE: &'static str = "face";

    pub fn from_config(config: &EndpointConfig, client: Client) -> Option<Self> {
        let (endpoint, api_key) = keyed_endpoint(config)?;
        Some(Self { client, endpoint, api_key })
    }
}

#[async_trait]
impl FaceService for FaceClient {
    async fn detect(&self, image_url: &str) -> Result<Vec<DetectedFace>, ServiceError> {
        let response = self
            .client
            .post(format!("{}/detect", self.endpoint))
            .query(&[("returnFaceId", "true"), ("returnFaceAttributes", "age,gender,emotion")])
            .header(SUBSCRIPTION_KEY, self.api_key.expose_secret())
            .json(&json!({ "url": image_url }))
            .send()
            .await
            .map_err(transport_error(Self::SERVICE))?;

        parse_faces(read_json(Self::SERVICE, response).await?)
    }

    async fn identify(
        &self,
        face_id: &str,
        person_group_id: &str,
    ) -> Result<Vec<IdentifyCandidate>, ServiceError> {
        let response = self
            .client
            .post(format!("{}/identify", self.endpoint))
            .header(SUBSCRIPTION_KEY, self.api_key.expose_secret())
            .json(&json!({ "personGroupId": person_group_id, "faceIds": [face_id] }))
            .send()
            .await
            .map_err(transport_error(Self::SERVICE))?;

        parse_candidates(read_json(Self::SERVICE, response).await?)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFace {
    face_id: String,
    face_attributes: Option<FaceAttributes>,
}

#[derive(Deserialize)]
struct FaceAttributes {
    gender: Option<String>,
    age: Option<f64>,
    #[serde(default)]
    emotion: EmotionScores,
}

pub(crate) fn parse_faces(body: Value) -> Result<Vec<DetectedFace>, ServiceError> {
    let faces: Vec<RawFace> = decode(FaceClient::SERVICE, body)?;
    Ok(faces
        .into_iter()
        .map(|face| {
            let (gender, age, emotion) = match face.face_attributes {
                Some(attributes) => (attributes.gender, attributes.age, attributes.emotion),
                None => (None, None, EmotionScores::default()),
            };
            DetectedFace { face_id: face.face_id, gender, age, emotion }
        })
        .collect())
}

#[derive(Deserialize)]
struct IdentifyResult {
    #[serde(default)]
    candidates: Vec<RawCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCandidate {
    person_id: String,
    confidence: f64,
}

/// Candidates for the single face sent to `identify`.
pub(crate) fn parse_candidates(body: Value) -> Result<Vec<IdentifyCandidate>, ServiceError> {
    let results: Vec<IdentifyResult> = decode(FaceClient::SERVICE, body)?;
    Ok(results
        .into_iter()
        .next()
        .map(|result| {
            result
                .candidates
                .into_iter()
                .map(|candidate| IdentifyCandidate {
                    person_id: candidate.person_id,
                    confidence: candidate.confidence,
                })
                .collect()
        })
        .unwrap_or_default())
}

/// Two published custom vision projects sharing one prediction key.
pub struct CustomVisionClient {
    client: Client,
    coffee_endpoint: Option<String>,
    cheese_endpoint: Option<String>,
    prediction_key: SecretString,
}

impl CustomVisionClient {
    const SERVICE: &'static str = "custom_vision";

    pub fn from_config(config: &CustomVisionConfig, client: Client) -> Option<Self> {
        let prediction_key = config.prediction_key.clone()?;
        if config.coffee_endpoint.is_none() && config.cheese_endpoint.is_none() {
            return None;
        }
        Some(Self {
            client,
            coffee_endpoint: config.coffee_endpoint.as_deref().map(base_url),
            cheese_endpoint: config.cheese_endpoint.as_deref().map(base_url),
            prediction_key,
        })
    }

    fn endpoint(&self, classifier: Classifier) -> Option<&str> {
        match classifier {
            Classifier::Coffee => self.coffee_endpoint.as_deref(),
            Classifier::Cheese => self.cheese_endpoint.as_deref(),
        }
    }
}

#[async_trait]
impl CustomVisionService for CustomVisionClient {
    async fn classify(
        &self,
        classifier: Classifier,
        image_url: &str,
    ) -> Result<Vec<Prediction>, ServiceError> {
        let endpoint = self
            .endpoint(classifier)
            .ok_or(ServiceError::NotConfigured { service: Self::SERVICE })?;

        let response = self
            .client
            .post(format!("{endpoint}/classify/iterations/{}/url", classifier.iteration()))
            .header("Prediction-Key", self.prediction_key.expose_secret())
            .json(&json!({ "url": image_url }))
            .send()
            .await
            .map_err(transport_error(Self::SERVICE))?;

        parse_predictions(read_json(Self::SERVICE, response).await?)
    }
}

#[derive(Deserialize)]
struct Classification {
    #[serde(default)]
    predictions: Vec<RawPrediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPrediction {
    tag_name: String,
    probability: f64,
}

pub(crate) fn parse_predictions(body: Value) -> Result<Vec<Prediction>, ServiceError> {
    let classification: Classification = decode(CustomVisionClient::SERVICE, body)?;
    Ok(classification
        .predictions
        .into_iter()
        .map(|raw| Prediction { tag_name: raw.tag_name, probability: raw.probability })
        .collect())
}
