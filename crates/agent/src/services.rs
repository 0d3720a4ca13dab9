//! Seams to the remote collaborators the dialogs delegate work to.
//!
//! Every call returns `Result<_, ServiceError>`; dialogs decide how a failure
//! is shown to the user. HTTP implementations live in the server crate.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tertulia_core::domain::activity::Activity;
use tertulia_core::domain::intent::IntentResult;
use tertulia_core::errors::ServiceError;

#[async_trait]
pub trait IntentRecognizer: Send + Sync {
    fn is_configured(&self) -> bool;
    async fn recognize(&self, activity: &Activity) -> Result<IntentResult, ServiceError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct QnaAnswer {
    pub answer: String,
    pub score: f64,
}

#[async_trait]
pub trait QnaService: Send + Sync {
    /// Answers above the service's score threshold, best first.
    async fn answers(&self, question: &str) -> Result<Vec<QnaAnswer>, ServiceError>;
}

#[async_trait]
pub trait ForexService: Send + Sync {
    /// Conversion rate for a pair such as `USD_COP`.
    async fn rate(&self, pair: &str) -> Result<f64, ServiceError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sex {
    Female,
    Male,
    Unspecified,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Female => "Female",
            Self::Male => "Male",
            Self::Unspecified => "",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomeFeatures {
    pub age: u32,
    pub education_years: u32,
    pub sex: Sex,
}

#[async_trait]
pub trait MlScoringService: Send + Sync {
    /// Probability that the person earns above the income threshold.
    async fn score(&self, features: &IncomeFeatures) -> Result<f64, ServiceError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Translation {
    pub to: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationResult {
    pub detected_language: Option<String>,
    pub translations: Vec<Translation>,
}

#[async_trait]
pub trait TranslatorService: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        targets: &[String],
    ) -> Result<TranslationResult, ServiceError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageAnalysis {
    pub category: Option<String>,
    pub caption: Option<String>,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait VisionService: Send + Sync {
    async fn analyze(&self, image_url: &str) -> Result<ImageAnalysis, ServiceError>;
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmotionScores {
    pub anger: f64,
    pub contempt: f64,
    pub disgust: f64,
    pub fear: f64,
    pub happiness: f64,
    pub neutral: f64,
    pub sadness: f64,
    pub surprise: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetectedFace {
    pub face_id: String,
    pub gender: Option<String>,
    pub age: Option<f64>,
    pub emotion: EmotionScores,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IdentifyCandidate {
    pub person_id: String,
    pub confidence: f64,
}

#[async_trait]
pub trait FaceService: Send + Sync {
    async fn detect(&self, image_url: &str) -> Result<Vec<DetectedFace>, ServiceError>;
    /// Candidates for `face_id` within `person_group_id`, best first.
    async fn identify(
        &self,
        face_id: &str,
        person_group_id: &str,
    ) -> Result<Vec<IdentifyCandidate>, ServiceError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classifier {
    Coffee,
    Cheese,
}

impl Classifier {
    /// Published iteration name of the trained model.
    pub fn iteration(self) -> &'static str {
        match self {
            Self::Coffee => "cafe",
            Self::Cheese => "queso",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub tag_name: String,
    pub probability: f64,
}

#[async_trait]
pub trait CustomVisionService: Send + Sync {
    async fn classify(
        &self,
        classifier: Classifier,
        image_url: &str,
    ) -> Result<Vec<Prediction>, ServiceError>;
}

/// One row of a key/value table, property name to value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableEntity(pub Map<String, Value>);

impl TableEntity {
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

#[async_trait]
pub trait TableStorage: Send + Sync {
    async fn retrieve_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<TableEntity, ServiceError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenResponse {
    pub connection_name: String,
    pub token: String,
}

/// User sign-in through the channel's token service.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn get_user_token(
        &self,
        activity: &Activity,
        connection_name: &str,
        magic_code: Option<&str>,
    ) -> Result<Option<TokenResponse>, ServiceError>;
    async fn get_sign_in_link(
        &self,
        activity: &Activity,
        connection_name: &str,
    ) -> Result<String, ServiceError>;
    async fn sign_out(&self, activity: &Activity, connection_name: &str)
        -> Result<(), ServiceError>;
}

#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn display_name(&self, token: &str) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load(&self, name: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Handles to every collaborator, shared read-only across turns.
#[derive(Clone)]
pub struct DialogServices {
    pub recognizer: Arc<dyn IntentRecognizer>,
    pub qna: Arc<dyn QnaService>,
    pub forex: Arc<dyn ForexService>,
    pub ml: Arc<dyn MlScoringService>,
    pub translator: Arc<dyn TranslatorService>,
    pub vision: Arc<dyn VisionService>,
    pub face: Arc<dyn FaceService>,
    pub custom_vision: Arc<dyn CustomVisionService>,
    pub storage: Arc<dyn TableStorage>,
    pub identity: Arc<dyn IdentityService>,
    pub profile: Arc<dyn ProfileService>,
    pub documents: Arc<dyn DocumentStore>,
}

impl DialogServices {
    /// Every collaborator reports `NotConfigured`.
    pub fn unconfigured() -> Self {
        let unconfigured = Arc::new(Unconfigured);
        Self {
            recognizer: unconfigured.clone(),
            qna: unconfigured.clone(),
            forex: unconfigured.clone(),
            ml: unconfigured.clone(),
            translator: unconfigured.clone(),
            vision: unconfigured.clone(),
            face: unconfigured.clone(),
            custom_vision: unconfigured.clone(),
            storage: unconfigured.clone(),
            identity: unconfigured.clone(),
            profile: unconfigured.clone(),
            documents: unconfigured,
        }
    }
}

#[derive(Default)]
pub struct Unconfigured;

#[async_trait]
impl IntentRecognizer for Unconfigured {
    fn is_configured(&self) -> bool {
        false
    }

    async fn recognize(&self, _activity: &Activity) -> Result<IntentResult, ServiceError> {
        Err(ServiceError::NotConfigured { service: "luis" })
    }
}

#[async_trait]
impl QnaService for Unconfigured {
    async fn answers(&self, _question: &str) -> Result<Vec<QnaAnswer>, ServiceError> {
        Err(ServiceError::NotConfigured { service: "qna" })
    }
}

#[async_trait]
impl ForexService for Unconfigured {
    async fn rate(&self, _pair: &str) -> Result<f64, ServiceError> {
        Err(ServiceError::NotConfigured { service: "forex" })
    }
}

#[async_trait]
impl MlScoringService for Unconfigured {
    async fn score(&self, _features: &IncomeFeatures) -> Result<f64, ServiceError> {
        Err(ServiceError::NotConfigured { service: "ml" })
    }
}

#[async_trait]
impl TranslatorService for Unconfigured {
    async fn translate(
        &self,
        _text: &str,
        _targets: &[String],
    ) -> Result<TranslationResult, ServiceError> {
        Err(ServiceError::NotConfigured { service: "translator" })
    }
}

#[async_trait]
impl VisionService for Unconfigured {
    async fn analyze(&self, _image_url: &str) -> Result<ImageAnalysis, ServiceError> {
        Err(ServiceError::NotConfigured { service: "vision" })
    }
}

#[async_trait]
impl FaceService for Unconfigured {
    async fn detect(&self, _image_url: &str) -> Result<Vec<DetectedFace>, ServiceError> {
        Err(ServiceError::NotConfigured { service: "face" })
    }

    async fn identify(
        &self,
        _face_id: &str,
        _person_group_id: &str,
    ) -> Result<Vec<IdentifyCandidate>, ServiceError> {
        Err(ServiceError::NotConfigured { service: "face" })
    }
}

#[async_trait]
impl CustomVisionService for Unconfigured {
    async fn classify(
        &self,
        _classifier: Classifier,
        _image_url: &str,
    ) -> Result<Vec<Prediction>, ServiceError> {
        Err(ServiceError::NotConfigured { service: "custom_vision" })
    }
}

#[async_trait]
impl TableStorage for Unconfigured {
    async fn retrieve_entity(
        &self,
        _table: &str,
        _partition_key: &str,
        _row_key: &str,
    ) -> Result<TableEntity, ServiceError> {
        Err(ServiceError::NotConfigured { service: "table_storage" })
    }
}

#[async_trait]
impl IdentityService for Unconfigured {
    async fn get_user_token(
        &self,
        _activity: &Activity,
        _connection_name: &str,
        _magic_code: Option<&str>,
    ) -> Result<Option<TokenResponse>, ServiceError> {
        Err(ServiceError::NotConfigured { service: "identity" })
    }

    async fn get_sign_in_link(
        &self,
        _activity: &Activity,
        _connection_name: &str,
    ) -> Result<String, ServiceError> {
        Err(ServiceError::NotConfigured { service: "identity" })
    }

    async fn sign_out(
        &self,
        _activity: &Activity,
        _connection_name: &str,
    ) -> Result<(), ServiceError> {
        Err(ServiceError::NotConfigured { service: "identity" })
    }
}

#[async_trait]
impl ProfileService for Unconfigured {
    async fn display_name(&self, _token: &str) -> Result<String, ServiceError> {
        Err(ServiceError::NotConfigured { service: "graph" })
    }
}

#[async_trait]
impl DocumentStore for Unconfigured {
    async fn load(&self, _name: &str) -> Result<Vec<u8>, ServiceError> {
        Err(ServiceError::NotConfigured { service: "documents" })
    }
}
