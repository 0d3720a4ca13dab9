use serde_json::{json, Value};
use tertulia_core::domain::activity::{Attachment, CardAction};
use thiserror::Error;

const WELCOME_CARD: &str = include_str!("../../../resources/cards/welcome.json");
const SENSOR_CARD: &str = include_str!("../../../resources/cards/sensor.json");

pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";
pub const OAUTH_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.oauth";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CardError {
    #[error("card template `{name}` is not valid JSON: {message}")]
    InvalidTemplate { name: &'static str, message: String },
}

fn adaptive_card(name: &'static str, template: &str) -> Result<Attachment, CardError> {
    let content: Value = serde_json::from_str(template)
        .map_err(|e| CardError::InvalidTemplate { name, message: e.to_string() })?;
    Ok(Attachment {
        content_type: ADAPTIVE_CARD_CONTENT_TYPE.to_string(),
        content: Some(content),
        ..Attachment::default()
    })
}

/// Task menu shown to new members and on the `initial` intent.
pub fn welcome_card() -> Result<Attachment, CardError> {
    adaptive_card("welcome", WELCOME_CARD)
}

pub fn sensor_card() -> Result<Attachment, CardError> {
    adaptive_card("sensor", SENSOR_CARD)
}

/// Sign-in card for the identity provider behind `connection_name`.
pub fn oauth_card(text: &str, connection_name: &str, title: &str, link: &str) -> Attachment {
    Attachment {
        content_type: OAUTH_CARD_CONTENT_TYPE.to_string(),
        content: Some(json!({
            "text": text,
            "connectionName": connection_name,
            "buttons": [CardAction::sign_in(title, link)],
        })),
        ..Attachment::default()
    }
}
