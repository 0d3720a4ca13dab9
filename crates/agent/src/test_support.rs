//! Scripted collaborators for dialog and runner tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tertulia_core::domain::activity::{Activity, ChannelAccount, ConversationAccount};
use tertulia_core::domain::intent::{Intent, IntentResult};
use tertulia_core::errors::ServiceError;

use crate::dialogs::DialogSet;
use crate::services::{
    Classifier, CustomVisionService, DetectedFace, DialogServices, DocumentStore, FaceService,
    ForexService, IdentifyCandidate, IdentityService, ImageAnalysis, IncomeFeatures,
    IntentRecognizer, MlScoringService, Prediction, ProfileService, QnaAnswer, QnaService,
    TableEntity, TableStorage, TokenResponse, TranslationResult, TranslatorService,
    VisionService,
};
use crate::settings::TaskSettings;
use crate::turn::TurnContext;

pub fn settings() -> TaskSettings {
    TaskSettings {
        oauth_connection_name: "graph".to_string(),
        face_person_group_id: "familia".to_string(),
        face_person_id: "person-1".to_string(),
        forex_source_url: "https://forex.example/convert".to_string(),
        ..TaskSettings::default()
    }
}

pub fn activity(text: &str) -> Activity {
    Activity {
        id: Some("act-1".to_string()),
        channel_id: "emulator".to_string(),
        from: ChannelAccount { id: "user-1".to_string(), name: Some("Ana".to_string()) },
        recipient: ChannelAccount { id: "bot".to_string(), name: Some("tertulia".to_string()) },
        conversation: ConversationAccount {
            id: "conv-1".to_string(),
            ..ConversationAccount::default()
        },
        service_url: Some("https://channel.example/".to_string()),
        ..Activity::message(text)
    }
}

/// A turn on 2019-03-20, a Wednesday.
pub fn context(activity: Activity) -> TurnContext {
    let now = Utc.with_ymd_and_hms(2019, 3, 20, 12, 0, 0).single().expect("valid clock");
    TurnContext::with_clock(activity, now)
}

pub fn message(text: &str) -> TurnContext {
    context(activity(text))
}

/// A message on the channel that renders adaptive cards.
pub fn card_channel_message(text: &str) -> TurnContext {
    context(Activity { channel_id: "directline".to_string(), ..activity(text) })
}

pub fn recognized(text: &str, intent: Intent) -> IntentResult {
    IntentResult { intent, ..IntentResult::unclassified(text) }
}

pub fn dialog_set(fakes: &Fakes) -> DialogSet {
    DialogSet::new(fakes.services(), Arc::new(settings()))
}

/// Every fake records `name:args` in a shared call log.
#[derive(Clone)]
pub struct Fakes {
    recognizer_configured: bool,
    intent: Option<IntentResult>,
    qna: Result<Vec<QnaAnswer>, ServiceError>,
    forex: Result<f64, ServiceError>,
    ml: Result<f64, ServiceError>,
    translation: Result<TranslationResult, ServiceError>,
    analysis: Result<ImageAnalysis, ServiceError>,
    faces: Vec<DetectedFace>,
    candidates: Vec<IdentifyCandidate>,
    predictions: Result<Vec<Prediction>, ServiceError>,
    entity: Result<TableEntity, ServiceError>,
    sign_in_link: String,
    code_token: Option<(String, String)>,
    sign_out: Result<(), ServiceError>,
    document: Vec<u8>,
    calls: Arc<Mutex<Vec<String>>>,
    recognizer_calls: Arc<Mutex<usize>>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            recognizer_configured: true,
            intent: None,
            qna: Ok(Vec::new()),
            forex: Ok(4000.0),
            ml: Ok(0.5),
            translation: Ok(TranslationResult {
                detected_language: Some("es".to_string()),
                translations: Vec::new(),
            }),
            analysis: Ok(ImageAnalysis::default()),
            faces: Vec::new(),
            candidates: Vec::new(),
            predictions: Ok(Vec::new()),
            entity: Ok(TableEntity::default()),
            sign_in_link: "https://token.example/signin".to_string(),
            code_token: None,
            sign_out: Ok(()),
            document: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            recognizer_calls: Arc::new(Mutex::new(0)),
        }
    }
}

impl Fakes {
    pub fn services(&self) -> DialogServices {
        let fakes = Arc::new(self.clone());
        DialogServices {
            recognizer: fakes.clone(),
            qna: fakes.clone(),
            forex: fakes.clone(),
            ml: fakes.clone(),
            translator: fakes.clone(),
            vision: fakes.clone(),
            face: fakes.clone(),
            custom_vision: fakes.clone(),
            storage: fakes.clone(),
            identity: fakes.clone(),
            profile: fakes.clone(),
            documents: fakes,
        }
    }

    /// Service calls other than intent recognition, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log").clone()
    }

    pub fn recognizer_calls(&self) -> usize {
        *self.recognizer_calls.lock().expect("recognizer count")
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("call log").push(call);
    }

    pub fn without_recognizer(mut self) -> Self {
        self.recognizer_configured = false;
        self
    }

    pub fn with_intent(mut self, intent: IntentResult) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_qna_answer(mut self, answer: &str) -> Self {
        if let Ok(answers) = &mut self.qna {
            answers.push(QnaAnswer { answer: answer.to_string(), score: 0.9 });
        }
        self
    }

    pub fn with_qna_error(mut self, error: ServiceError) -> Self {
        self.qna = Err(error);
        self
    }

    pub fn with_forex_rate(mut self, rate: f64) -> Self {
        self.forex = Ok(rate);
        self
    }

    pub fn with_forex_error(mut self, error: ServiceError) -> Self {
        self.forex = Err(error);
        self
    }

    pub fn with_ml_score(mut self, score: f64) -> Self {
        self.ml = Ok(score);
        self
    }

    pub fn with_translation(mut self, translation: TranslationResult) -> Self {
        self.translation = Ok(translation);
        self
    }

    pub fn with_analysis(mut self, analysis: ImageAnalysis) -> Self {
        self.analysis = Ok(analysis);
        self
    }

    pub fn with_vision_error(mut self, error: ServiceError) -> Self {
        self.analysis = Err(error);
        self
    }

    pub fn with_faces(mut self, faces: Vec<DetectedFace>) -> Self {
        self.faces = faces;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<IdentifyCandidate>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_predictions(mut self, predictions: Vec<Prediction>) -> Self {
        self.predictions = Ok(predictions);
        self
    }

    pub fn with_classifier_error(mut self, error: ServiceError) -> Self {
        self.predictions = Err(error);
        self
    }

    pub fn with_entity(mut self, properties: Value) -> Self {
        if let Value::Object(map) = properties {
            self.entity = Ok(TableEntity(map));
        }
        self
    }

    pub fn with_storage_error(mut self, error: ServiceError) -> Self {
        self.entity = Err(error);
        self
    }

    pub fn with_sign_in_link(mut self, link: &str) -> Self {
        self.sign_in_link = link.to_string();
        self
    }

    pub fn with_token_for_code(mut self, code: &str, token: &str) -> Self {
        self.code_token = Some((code.to_string(), token.to_string()));
        self
    }

    pub fn with_sign_out_error(mut self, error: ServiceError) -> Self {
        self.sign_out = Err(error);
        self
    }

    pub fn with_document(mut self, bytes: Vec<u8>) -> Self {
        self.document = bytes;
        self
    }
}

#[async_trait]
impl IntentRecognizer for Fakes {
    fn is_configured(&self) -> bool {
        self.recognizer_configured
    }

    async fn recognize(&self, activity: &Activity) -> Result<IntentResult, ServiceError> {
        *self.recognizer_calls.lock().expect("recognizer count") += 1;
        Ok(self.intent.clone().unwrap_or_else(|| {
            IntentResult::unclassified(activity.trimmed_text().unwrap_or_default())
        }))
    }
}

#[async_trait]
impl QnaService for Fakes {
    async fn answers(&self, question: &str) -> Result<Vec<QnaAnswer>, ServiceError> {
        self.record(format!("qna:{question}"));
        self.qna.clone()
    }
}

#[async_trait]
impl ForexService for Fakes {
    async fn rate(&self, pair: &str) -> Result<f64, ServiceError> {
        self.record(format!("forex:{pair}"));
        self.forex.clone()
    }
}

#[async_trait]
impl MlScoringService for Fakes {
    async fn score(&self, features: &IncomeFeatures) -> Result<f64, ServiceError> {
        self.record(format!(
            "ml:{}/{}/{}",
            features.age,
            features.education_years,
            features.sex.as_str()
        ));
        self.ml.clone()
    }
}

#[async_trait]
impl TranslatorService for Fakes {
    async fn translate(
        &self,
        text: &str,
        targets: &[String],
    ) -> Result<TranslationResult, ServiceError> {
        self.record(format!("translator:{text}->{}", targets.join(",")));
        self.translation.clone()
    }
}

#[async_trait]
impl VisionService for Fakes {
    async fn analyze(&self, image_url: &str) -> Result<ImageAnalysis, ServiceError> {
        self.record(format!("vision:{image_url}"));
        self.analysis.clone()
    }
}

#[async_trait]
impl FaceService for Fakes {
    async fn detect(&self, image_url: &str) -> Result<Vec<DetectedFace>, ServiceError> {
        self.record(format!("face.detect:{image_url}"));
        Ok(self.faces.clone())
    }

    async fn identify(
        &self,
        face_id: &str,
        person_group_id: &str,
    ) -> Result<Vec<IdentifyCandidate>, ServiceError> {
        self.record(format!("face.identify:{face_id}/{person_group_id}"));
        Ok(self.candidates.clone())
    }
}

#[async_trait]
impl CustomVisionService for Fakes {
    async fn classify(
        &self,
        classifier: Classifier,
        image_url: &str,
    ) -> Result<Vec<Prediction>, ServiceError> {
        self.record(format!("classify:{}:{image_url}", classifier.iteration()));
        self.predictions.clone()
    }
}

#[async_trait]
impl TableStorage for Fakes {
    async fn retrieve_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<TableEntity, ServiceError> {
        self.record(format!("storage:{table}/{partition_key}/{row_key}"));
        self.entity.clone()
    }
}

#[async_trait]
impl IdentityService for Fakes {
    async fn get_user_token(
        &self,
        _activity: &Activity,
        connection_name: &str,
        magic_code: Option<&str>,
    ) -> Result<Option<TokenResponse>, ServiceError> {
        let token = match (&self.code_token, magic_code) {
            (Some((code, token)), Some(given)) if code == given => Some(TokenResponse {
                connection_name: connection_name.to_string(),
                token: token.clone(),
            }),
            _ => None,
        };
        Ok(token)
    }

    async fn get_sign_in_link(
        &self,
        _activity: &Activity,
        _connection_name: &str,
    ) -> Result<String, ServiceError> {
        Ok(self.sign_in_link.clone())
    }

    async fn sign_out(
        &self,
        _activity: &Activity,
        connection_name: &str,
    ) -> Result<(), ServiceError> {
        self.record(format!("sign_out:{connection_name}"));
        self.sign_out.clone()
    }
}

#[async_trait]
impl ProfileService for Fakes {
    async fn display_name(&self, _token: &str) -> Result<String, ServiceError> {
        Ok("Ana Gomez".to_string())
    }
}

#[async_trait]
impl DocumentStore for Fakes {
    async fn load(&self, name: &str) -> Result<Vec<u8>, ServiceError> {
        self.record(format!("documents:{name}"));
        Ok(self.document.clone())
    }
}
