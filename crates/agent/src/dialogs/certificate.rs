//! Employment certificates behind an OAuth sign-in.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Duration;
use tertulia_channel::cards::oauth_card;
use tertulia_channel::choices::choice_prompt;
use tertulia_channel::messages::{Reply, ReplyBuilder};
use tertulia_core::dialog::{CertificateState, CertificateStep, DialogFrame};
use tertulia_core::domain::activity::{ActivityType, Attachment};
use tertulia_core::errors::ServiceError;
use tracing::{info, warn};

use super::{DialogError, DialogResult, DialogSet, FrameOutcome};
use crate::prompts::{magic_code, recognize_choice};
use crate::turn::TurnContext;

pub const TOKEN_RESPONSE_EVENT: &str = "tokens/response";
pub const VERIFY_STATE_INVOKE: &str = "signin/verifyState";

const SIGN_IN_TEXT: &str =
    "Por favor ingrese a continuación con sus credenciales y escriba el token generado";
const SIGN_IN_TITLE: &str = "Ingresar y generar token";
const SIGN_IN_FAILED: &str = "No pudo ingresar exitosamente, intente nuevamente.";
const CHOICE_PROMPT: &str = "¿Qué certificado requiere?";
const CHOICES: [&str; 2] = ["Nomina", "Ingresos"];
const UNSUPPORTED_CERTIFICATE: &str = "Sólamente puedo enviar certificados de nómina o de ingresos";

fn sign_in_timeout() -> Duration {
    Duration::minutes(5)
}

pub async fn begin(set: &DialogSet, ctx: &mut TurnContext) -> Result<FrameOutcome, DialogError> {
    let connection = set.settings.oauth_connection_name.as_str();
    let existing = set.services.identity.get_user_token(ctx.activity(), connection, None).await;

    match existing {
        Ok(Some(token)) => signed_in(set, ctx, &token.token).await,
        Ok(None) => {
            let link = match set.services.identity.get_sign_in_link(ctx.activity(), connection).await
            {
                Ok(link) => link,
                Err(error) => return Ok(sign_in_failed(ctx, &error)),
            };
            let card = oauth_card(SIGN_IN_TEXT, connection, SIGN_IN_TITLE, &link);
            ctx.send(Reply::attachment(card));
            Ok(FrameOutcome::Waiting(DialogFrame::Certificate(CertificateState {
                step: CertificateStep::SignIn,
                sign_in_started_at: Some(ctx.now()),
            })))
        }
        Err(error) => Ok(sign_in_failed(ctx, &error)),
    }
}

pub async fn continue_dialog(
    set: &DialogSet,
    ctx: &mut TurnContext,
    state: CertificateState,
) -> Result<FrameOutcome, DialogError> {
    match state.step {
        CertificateStep::SignIn => continue_sign_in(set, ctx, state).await,
        CertificateStep::Choose => send_certificate(set, ctx).await,
    }
}

async fn continue_sign_in(
    set: &DialogSet,
    ctx: &mut TurnContext,
    state: CertificateState,
) -> Result<FrameOutcome, DialogError> {
    let expired = state
        .sign_in_started_at
        .is_some_and(|started| ctx.now() - started > sign_in_timeout());
    if expired {
        info!(
            event_name = "dialog.certificate.sign_in_expired",
            correlation_id = %ctx.activity().correlation_id(),
            "sign-in prompt timed out"
        );
        ctx.send_text(SIGN_IN_FAILED);
        return Ok(FrameOutcome::Complete(DialogResult::Empty));
    }

    if let Some(token) = token_from_event(ctx) {
        return signed_in(set, ctx, &token).await;
    }

    let Some(code) = sign_in_code(ctx) else {
        // Keep waiting for a code until the prompt expires.
        return Ok(FrameOutcome::Waiting(DialogFrame::Certificate(state)));
    };

    let connection = set.settings.oauth_connection_name.as_str();
    match set.services.identity.get_user_token(ctx.activity(), connection, Some(&code)).await {
        Ok(Some(token)) => signed_in(set, ctx, &token.token).await,
        Ok(None) => {
            ctx.send_text(SIGN_IN_FAILED);
            Ok(FrameOutcome::Complete(DialogResult::Empty))
        }
        Err(error) => Ok(sign_in_failed(ctx, &error)),
    }
}

fn token_from_event(ctx: &TurnContext) -> Option<String> {
    let activity = ctx.activity();
    if activity.activity_type != ActivityType::Event || !activity.is_named(TOKEN_RESPONSE_EVENT) {
        return None;
    }
    activity.value.as_ref()?.get("token")?.as_str().map(str::to_string)
}

fn sign_in_code(ctx: &TurnContext) -> Option<String> {
    let activity = ctx.activity();
    if activity.activity_type == ActivityType::Invoke && activity.is_named(VERIFY_STATE_INVOKE) {
        return activity.value.as_ref()?.get("state")?.as_str().map(str::to_string);
    }
    ctx.text().and_then(magic_code).map(str::to_string)
}

fn sign_in_failed(ctx: &mut TurnContext, error: &ServiceError) -> FrameOutcome {
    warn!(
        event_name = "dialog.certificate.sign_in_failed",
        correlation_id = %ctx.activity().correlation_id(),
        error = %error,
        "user sign-in failed"
    );
    ctx.send_text(SIGN_IN_FAILED);
    FrameOutcome::Complete(DialogResult::Empty)
}

async fn signed_in(
    set: &DialogSet,
    ctx: &mut TurnContext,
    token: &str,
) -> Result<FrameOutcome, DialogError> {
    let name = set.services.profile.display_name(token).await?;
    ctx.send_text(format!("Ingreso exitoso, bienvenida(o) {name}"));
    ctx.send(choice_prompt(ctx.channel_id(), CHOICE_PROMPT, &CHOICES));
    Ok(FrameOutcome::Waiting(DialogFrame::Certificate(CertificateState {
        step: CertificateStep::Choose,
        sign_in_started_at: None,
    })))
}

/// Only the two bundled certificates can ever be loaded.
fn certificate_choice(text: &str) -> Option<&'static str> {
    if let Some(index) = recognize_choice(text, &CHOICES) {
        return Some(CHOICES[index]);
    }
    let lowered = text.to_lowercase();
    if lowered.contains("nomi") {
        Some(CHOICES[0])
    } else if lowered.contains("ingre") {
        Some(CHOICES[1])
    } else {
        None
    }
}

async fn send_certificate(
    set: &DialogSet,
    ctx: &mut TurnContext,
) -> Result<FrameOutcome, DialogError> {
    let Some(certificate) = certificate_choice(ctx.text().unwrap_or_default()) else {
        ctx.send_text(UNSUPPORTED_CERTIFICATE);
        return Ok(FrameOutcome::Complete(DialogResult::Empty));
    };

    let file_name = format!("cert-{}.pdf", certificate.to_lowercase());
    let bytes = set.services.documents.load(&file_name).await?;
    let attachment = Attachment {
        content_type: "application/pdf".to_string(),
        content_url: Some(format!("data:application/pdf;base64,{}", STANDARD.encode(bytes))),
        content: None,
        name: Some(file_name),
    };
    ctx.send(
        ReplyBuilder::new(format!("Enviando certificado de {certificate}"))
            .attachment(attachment)
            .build(),
    );
    Ok(FrameOutcome::Complete(DialogResult::Empty))
}
