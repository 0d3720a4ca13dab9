//! Top-level dispatcher: classifies the utterance and hands it to a task dialog.

use chrono::NaiveDate;
use tertulia_channel::cards::welcome_card;
use tertulia_channel::choices::choice_prompt;
use tertulia_channel::messages::Reply;
use tertulia_core::dialog::{DialogFrame, MainState, MainStep};
use tertulia_core::domain::booking::BookingDetails;
use tertulia_core::domain::intent::{Intent, IntentResult};
use tracing::{info, warn};

use super::{
    DialogError, DialogRequest, DialogResult, DialogSet, FrameOutcome, TURN_ERROR_MESSAGE,
};
use crate::timex;
use crate::turn::TurnContext;

pub const LUIS_NOT_CONFIGURED: &str = "NOTE: LUIS is not configured. To enable all capabilities, add `LuisAppId`, `LuisAPIKey` and `LuisAPIHostName` to the .env file.";
pub const MENU_PROMPT: &str = "¿Qué puedo hacer para ayudarle el día de hoy?";
pub const MENU_CHOICES: [&str; 7] =
    ["QnA", "IoT", "Traducir", "Imagen", "Salario", "TRM", "Certificado"];

const NEGATIVE_SENTIMENT_THRESHOLD: f64 = 0.4;

fn not_understood(question: &str) -> String {
    format!("Lo siento, no entendi su pregunta \"{question}\", puede intentarlo nuevamente?")
}

/// Starts the dispatcher. `restart` is a prompt to show before classifying
/// the user's next utterance.
pub async fn begin(
    set: &DialogSet,
    ctx: &mut TurnContext,
    restart: Option<&str>,
) -> Result<FrameOutcome, DialogError> {
    if !set.services.recognizer.is_configured() {
        ctx.send_text(LUIS_NOT_CONFIGURED);
        let unclassified = IntentResult::unclassified(ctx.text().unwrap_or_default());
        return dispatch(set, ctx, unclassified).await;
    }

    if let Some(message) = restart {
        ctx.send(Reply::prompt(message));
        return Ok(FrameOutcome::Waiting(DialogFrame::Main(MainState { step: MainStep::Act })));
    }

    act(set, ctx).await
}

pub async fn continue_dialog(
    set: &DialogSet,
    ctx: &mut TurnContext,
    state: MainState,
) -> Result<FrameOutcome, DialogError> {
    match state.step {
        MainStep::Act => act(set, ctx).await,
        MainStep::Final => resume(set, ctx, state, DialogResult::Empty),
    }
}

/// Receives the result of the task dialog begun from `act`.
pub fn resume(
    _set: &DialogSet,
    ctx: &mut TurnContext,
    _state: MainState,
    result: DialogResult,
) -> Result<FrameOutcome, DialogError> {
    if let DialogResult::Booking(Some(details)) = result {
        ctx.send_text(booking_confirmation(&details, ctx.now().date_naive()));
    }
    Ok(FrameOutcome::Complete(DialogResult::Empty))
}

fn booking_confirmation(details: &BookingDetails, today: NaiveDate) -> String {
    let when = details
        .travel_date
        .as_deref()
        .map(|timex| timex::to_natural_language(timex, today))
        .unwrap_or_default();
    format!(
        "I have you booked to {} from {} on {}.",
        details.destination.as_deref().unwrap_or_default(),
        details.origin.as_deref().unwrap_or_default(),
        when
    )
}

async fn act(set: &DialogSet, ctx: &mut TurnContext) -> Result<FrameOutcome, DialogError> {
    let recognized = match set.services.recognizer.recognize(ctx.activity()).await {
        Ok(result) => result,
        Err(error) => {
            warn!(
                event_name = "dialog.main.recognize_failed",
                correlation_id = %ctx.activity().correlation_id(),
                error = %error,
                "intent recognition failed"
            );
            ctx.send_text(TURN_ERROR_MESSAGE);
            return Ok(FrameOutcome::Complete(DialogResult::Empty));
        }
    };

    if recognized.sentiment.is_some_and(|score| score < NEGATIVE_SENTIMENT_THRESHOLD) {
        ctx.send_text("Detecto un sentimiento negativo!");
    }

    dispatch(set, ctx, recognized).await
}

async fn dispatch(
    set: &DialogSet,
    ctx: &mut TurnContext,
    recognized: IntentResult,
) -> Result<FrameOutcome, DialogError> {
    let question = recognized.question().to_string();
    info!(
        event_name = "dialog.main.intent",
        correlation_id = %ctx.activity().correlation_id(),
        intent = recognized.intent.label(),
        "dispatching utterance"
    );

    let child = match recognized.intent {
        Intent::BookFlight => {
            let entities = recognized.entities;
            let unsupported: Vec<&str> = [&entities.from, &entities.to]
                .into_iter()
                .filter_map(|city| city.unsupported_city())
                .collect();
            if !unsupported.is_empty() {
                ctx.send_text(format!(
                    "Sorry but the following airports are not supported: {}",
                    unsupported.join(", ")
                ));
            }
            Some(DialogRequest::Booking(BookingDetails {
                destination: entities.to.airport.clone(),
                origin: entities.from.airport.clone(),
                travel_date: entities.travel_date.clone(),
            }))
        }
        Intent::Initial => {
            if set.settings.wants_card(ctx.channel_id(), ctx.sender_id()) {
                ctx.send(Reply::attachment(welcome_card()?));
            } else {
                let menu = choice_prompt(ctx.channel_id(), MENU_PROMPT, &MENU_CHOICES);
                ctx.send(menu);
            }
            None
        }
        Intent::Certificate => Some(DialogRequest::Certificate),
        Intent::Forex => Some(DialogRequest::Forex),
        Intent::Machine => Some(DialogRequest::Machine),
        Intent::Sensor => Some(DialogRequest::Sensor { question: question.clone() }),
        Intent::Translate => Some(DialogRequest::Translate),
        Intent::Vision => Some(DialogRequest::Vision),
        Intent::General => {
            answer_question(set, ctx, &question).await;
            None
        }
        Intent::None => {
            if ctx.activity().has_attachments() {
                Some(DialogRequest::Vision)
            } else {
                if !question.is_empty() {
                    ctx.send_text(not_understood(&question));
                }
                None
            }
        }
        Intent::Other(label) => {
            ctx.send_text(format!("{} (intent: {label})", not_understood(&question)));
            None
        }
    };

    Ok(match child {
        Some(child) => FrameOutcome::BeginChild {
            parent: DialogFrame::Main(MainState { step: MainStep::Final }),
            child,
        },
        None => FrameOutcome::Complete(DialogResult::Empty),
    })
}

async fn answer_question(set: &DialogSet, ctx: &mut TurnContext, question: &str) {
    let text = ctx.text().unwrap_or_default().to_string();
    match set.services.qna.answers(&text).await {
        Ok(answers) => match answers.into_iter().next() {
            Some(best) => ctx.send_text(best.answer),
            None => ctx.send_text(not_understood(question)),
        },
        Err(error) => {
            warn!(
                event_name = "dialog.main.qna_failed",
                correlation_id = %ctx.activity().correlation_id(),
                error = %error,
                "knowledge base query failed"
            );
            ctx.send_text(TURN_ERROR_MESSAGE);
        }
    }
}
