use tertulia_channel::messages::Reply;
use tertulia_core::dialog::DialogFrame;
use tracing::warn;

use super::{DialogError, DialogResult, DialogSet, FrameOutcome};
use crate::services::TranslationResult;
use crate::turn::TurnContext;

const TEXT_PROMPT: &str = "¿Que texto quiere traducir?";
const TRANSLATION_FAILED: &str =
    "No fue posible realizar la traducción, por favor intente nuevamente.";

pub fn begin(ctx: &mut TurnContext) -> FrameOutcome {
    ctx.send(Reply::prompt(TEXT_PROMPT));
    FrameOutcome::Waiting(DialogFrame::Translate)
}

pub async fn continue_dialog(
    set: &DialogSet,
    ctx: &mut TurnContext,
) -> Result<FrameOutcome, DialogError> {
    let Some(text) = ctx.text().map(str::to_string) else {
        return Ok(begin(ctx));
    };

    match set.services.translator.translate(&text, &set.settings.translation_targets).await {
        Ok(result) => ctx.send_text(render(&result)),
        Err(error) => {
            warn!(
                event_name = "dialog.translate.failed",
                correlation_id = %ctx.activity().correlation_id(),
                error = %error,
                "translation failed"
            );
            ctx.send_text(TRANSLATION_FAILED);
        }
    }
    Ok(FrameOutcome::Complete(DialogResult::Empty))
}

fn language_name(code: &str) -> &str {
    match code {
        "es" => "Español",
        "en" => "Ingles",
        "pt" => "Portuges",
        "fr" => "Frances",
        "it" => "Italiano",
        other => other,
    }
}

fn render(result: &TranslationResult) -> String {
    let detected = result.detected_language.as_deref().unwrap_or_default();
    let mut message = format!("Traducido del {}\n\nTraducciones\n\n", language_name(detected));
    for translation in &result.translations {
        message.push_str(&format!("{} - {}\n\n", translation.to, translation.text));
    }
    message
}
