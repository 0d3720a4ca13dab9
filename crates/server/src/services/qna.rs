use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tertulia_agent::services::{QnaAnswer, QnaService};
use tertulia_core::config::QnaConfig;
use tertulia_core::errors::ServiceError;

use super::{base_url, decode, read_json, transport_error};

const SERVICE: &str = "qna";
/// Answers scoring below this fraction are treated as no match.
const SCORE_THRESHOLD: f64 = 0.3;

pub struct QnaMakerClient {
    client: Client,
    endpoint: String,
    endpoint_key: SecretString,
}

impl QnaMakerClient {
    pub fn from_config(config: &QnaConfig, client: Client) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        let endpoint = format!(
            "{}/knowledgebases/{}/generateAnswer",
            base_url(config.host.as_deref()?),
            config.knowledge_base_id.as_deref()?.trim()
        );
        Some(Self { client, endpoint, endpoint_key: config.endpoint_key.clone()? })
    }
}

#[async_trait]
impl QnaService for QnaMakerClient {
    async fn answers(&self, question: &str) -> Result<Vec<QnaAnswer>, ServiceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("EndpointKey {}", self.endpoint_key.expose_secret()))
            .json(&json!({ "question": question, "top": 1 }))
            .send()
            .await
            .map_err(transport_error(SERVICE))?;

        parse_answers(read_json(SERVICE, response).await?)
    }
}

#[derive(Deserialize)]
struct GenerateAnswer {
    #[serde(default)]
    answers: Vec<RawAnswer>,
}

#[derive(Deserialize)]
struct RawAnswer {
    answer: String,
    score: f64,
}

/// Scores arrive on a 0-100 scale and are normalized to 0-1.
pub(crate) fn parse_answers(body: Value) -> Result<Vec<QnaAnswer>, ServiceError> {
    let parsed: GenerateAnswer = decode(SERVICE, body)?;
    let mut answers: Vec<QnaAnswer> = parsed
        .answers
        .into_iter()
        .map(|raw| QnaAnswer { answer: raw.answer, score: raw.score / 100.0 })
        .filter(|answer| answer.score >= SCORE_THRESHOLD)
        .collect();
    answers.sort_by(|left, right| right.score.total_cmp(&left.score));
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_answers;

    #[test]
    fn answers_are_normalized_and_ranked() {
        let answers = parse_answers(json!({
            "answers": [
                { "answer": "Segunda", "score": 45.0, "id": 2 },
                { "answer": "Atendemos de 8 a 5", "score": 87.5, "id": 1 }
            ]
        }))
        .expect("parse");

        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].answer, "Atendemos de 8 a 5");
        assert_eq!(answers[0].score, 0.875);
    }

    #[test]
    fn no_match_placeholder_is_dropped() {
        let answers = parse_answers(json!({
            "answers": [{ "answer": "No good match found in KB.", "score": 0.0, "id": -1 }]
        }))
        .expect("parse");

        assert!(answers.is_empty());
    }
}
