//! Image analysis, with face identification and custom classifiers chosen
//! from what the general analysis found.
//!
//! Failures from the vision providers are shown to the user as the provider's
//! own error text rather than a fixed apology.

use tertulia_channel::messages::{Reply, ReplyBuilder};
use tertulia_core::dialog::DialogFrame;
use tertulia_core::domain::activity::Attachment;
use tracing::{debug, warn};

use super::{DialogError, DialogResult, DialogSet, FrameOutcome};
use crate::services::{Classifier, DetectedFace, EmotionScores, ImageAnalysis, Prediction};
use crate::turn::TurnContext;

const ATTACHMENT_PROMPT: &str = "Por favor adjunte la imagen";
const INVALID_IMAGE_URL: &str = "InvalidImageUrl";
const NOT_IDENTIFIED: &str = "Persona no identificada";
const EMPTY_ANALYSIS: &str = "Categoría: -\n\nDescripción: -\n\nEtiquetas: -";

pub async fn begin(set: &DialogSet, ctx: &mut TurnContext) -> Result<FrameOutcome, DialogError> {
    continue_dialog(set, ctx).await
}

/// Analyzes the turn's attachments, or asks for one when there are none.
pub async fn continue_dialog(
    set: &DialogSet,
    ctx: &mut TurnContext,
) -> Result<FrameOutcome, DialogError> {
    let attachments = ctx.activity().attachments.clone();
    if attachments.is_empty() {
        ctx.send(Reply::prompt(ATTACHMENT_PROMPT));
        return Ok(FrameOutcome::Waiting(DialogFrame::Vision));
    }

    for attachment in &attachments {
        if analyze_attachment(set, ctx, attachment).await == Flow::Stop {
            break;
        }
    }
    Ok(FrameOutcome::Complete(DialogResult::Empty))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Next,
    Stop,
}

async fn analyze_attachment(set: &DialogSet, ctx: &mut TurnContext, file: &Attachment) -> Flow {
    if !file.is_image() {
        ctx.send_text(format!("Por favor adjunta una imagen (enviaste: {})", file.content_type));
        return Flow::Next;
    }

    ctx.send(
        ReplyBuilder::new("Analizando la imagen usando: Computer Vision API...")
            .attachment(file.clone())
            .build(),
    );

    let Some(url) = file.content_url.as_deref() else {
        ctx.send_text(EMPTY_ANALYSIS);
        return Flow::Next;
    };

    let analysis = match set.services.vision.analyze(url).await {
        Ok(analysis) => analysis,
        Err(error) if error.code() == Some(INVALID_IMAGE_URL) => {
            debug!(
                event_name = "dialog.vision.invalid_url",
                correlation_id = %ctx.activity().correlation_id(),
                "image url rejected, skipping remaining attachments"
            );
            ctx.send_text(EMPTY_ANALYSIS);
            return Flow::Stop;
        }
        Err(error) => {
            warn!(
                event_name = "dialog.vision.analyze_failed",
                correlation_id = %ctx.activity().correlation_id(),
                error = %error,
                "image analysis failed"
            );
            ctx.send_text(error.raw_message());
            return Flow::Next;
        }
    };
    ctx.send_text(describe(&analysis));

    let category = analysis.category.as_deref().unwrap_or_default();
    let has_tag = |tag: &str| analysis.tags.iter().any(|candidate| candidate == tag);

    if category.contains("gente") || has_tag("persona") {
        identify_person(set, ctx, url).await;
    } else if category.contains("planta") || has_tag("fruta") || has_tag("comida") {
        classify_coffee(set, ctx, url).await;
    } else if has_tag("alimentos") {
        classify_cheese(set, ctx, url).await;
    }
    Flow::Next
}

fn describe(analysis: &ImageAnalysis) -> String {
    let tags = if analysis.tags.is_empty() { "-".to_string() } else { analysis.tags.join(",") };
    format!(
        "Categoría: {}\n\nDescripción: {}\n\nEtiquetas: {tags}",
        analysis.category.as_deref().unwrap_or("-"),
        analysis.caption.as_deref().unwrap_or("-"),
    )
}

async fn identify_person(set: &DialogSet, ctx: &mut TurnContext, url: &str) {
    ctx.send_text("Analizando la imagen usando: Face API...");
    let faces = match set.services.face.detect(url).await {
        Ok(faces) => faces,
        Err(error) => {
            ctx.send_text(error.raw_message());
            return;
        }
    };

    let face = faces.first();
    ctx.send_text(describe_face(face));
    ctx.send_text("Identificando a la persona usando: Face API...");

    let Some(face) = face else {
        ctx.send_text(NOT_IDENTIFIED);
        return;
    };

    let settings = &set.settings;
    match set.services.face.identify(&face.face_id, &settings.face_person_group_id).await {
        Ok(candidates) => {
            let identified = candidates.first().is_some_and(|candidate| {
                candidate.person_id == settings.face_person_id && candidate.confidence > 0.5
            });
            if identified {
                ctx.send_text(format!("Persona Identificada: {}", settings.face_person_name));
            } else {
                ctx.send_text(NOT_IDENTIFIED);
            }
        }
        Err(error) => ctx.send_text(error.raw_message()),
    }
}

fn describe_face(face: Option<&DetectedFace>) -> String {
    let Some(face) = face else {
        return "Género: -\n\nEdad: -\n\nEmoción: -\n\nId: -".to_string();
    };
    let gender = match face.gender.as_deref() {
        Some("male") => "hombre",
        Some(_) => "mujer",
        None => "-",
    };
    let age = face.age.map(|age| age.to_string()).unwrap_or_else(|| "-".to_string());
    format!(
        "Género: {gender}\n\nEdad: {age}\n\nEmoción: {}\n\nId: {}",
        emotion_bucket(&face.emotion),
        face.face_id
    )
}

/// First emotion above 0.5 in a fixed priority order.
fn emotion_bucket(emotion: &EmotionScores) -> &'static str {
    [
        (emotion.surprise, "negativa"),
        (emotion.disgust, "negativa"),
        (emotion.neutral, "neutral"),
        (emotion.contempt, "negativa"),
        (emotion.fear, "negativa"),
        (emotion.happiness, "positiva"),
        (emotion.sadness, "negativa"),
        (emotion.anger, "negativa"),
    ]
    .into_iter()
    .find_map(|(score, bucket)| (score > 0.5).then_some(bucket))
    .unwrap_or("-")
}

/// Percentage with two decimals, as the classifiers report it.
fn percent(probability: f64) -> f64 {
    (probability * 10000.0).round() / 100.0
}

/// Percent for each known tag. A tag repeated in the predictions keeps its last value.
fn tag_percentages<const N: usize>(predictions: &[Prediction], tags: [&str; N]) -> [f64; N] {
    let mut values = [0.0; N];
    for prediction in predictions {
        if let Some(index) = tags.iter().position(|tag| *tag == prediction.tag_name) {
            values[index] = percent(prediction.probability);
        }
    }
    values
}

fn ranked(first: (&str, f64), second: (&str, f64)) -> String {
    let (winner, loser) = if first.1 > second.1 { (first, second) } else { (second, first) };
    format!("{} {}% ({} {}%)", winner.0, winner.1, loser.0, loser.1)
}

async fn classify_coffee(set: &DialogSet, ctx: &mut TurnContext, url: &str) {
    ctx.send_text("Analizando la imagen usando: Custom Vision API (Cafe)...");
    let predictions = match set.services.custom_vision.classify(Classifier::Coffee, url).await {
        Ok(predictions) => predictions,
        Err(error) => {
            ctx.send_text(error.raw_message());
            return;
        }
    };

    let [coffee, tree, toasted, arabica, robusta] =
        tag_percentages(&predictions, ["cafe", "arbol", "tostado", "arabica", "robusta"]);
    ctx.send_text(format!(
        "Café: {coffee}%\n\nVariedad: {}\n\nEstado: {}",
        ranked(("Arabica", arabica), ("Robusta", robusta)),
        ranked(("Arbol", tree), ("Tostado", toasted)),
    ));
}

async fn classify_cheese(set: &DialogSet, ctx: &mut TurnContext, url: &str) {
    ctx.send_text("Analizando la imagen usando: Custom Vision API (Queso)...");
    let predictions = match set.services.custom_vision.classify(Classifier::Cheese, url).await {
        Ok(predictions) => predictions,
        Err(error) => {
            ctx.send_text(error.raw_message());
            return;
        }
    };

    let [cheese, alpina, colanta, campesino, mozarella, parmesano, quesito] = tag_percentages(
        &predictions,
        ["queso", "alpina", "colanta", "campesino", "mozarella", "parmesano", "quesito"],
    );
    // The fifth type slot repeats the parmesano check instead of reading a sabana tag, so it stays zero.
    let sabana = 0.0_f64;
    ctx.send_text(format!(
        "Queso: {cheese}%\n\nMarca: {}\n\nTipo:\n\nCampesino - {campesino}% \n\nMozarella - {mozarella}% \n\nParmesano - {parmesano}% \n\nQuesito - {quesito}% \n\nSabana - {sabana}%",
        ranked(("Alpina", alpina), ("Colanta", colanta)),
    ));
}

#[cfg(test)]
mod tests {
    use tertulia_core::domain::activity::Attachment;
    use tertulia_core::errors::ServiceError;

    use super::{continue_dialog, emotion_bucket, ATTACHMENT_PROMPT, EMPTY_ANALYSIS};
    use crate::dialogs::{DialogResult, FrameOutcome};
    use crate::services::{
        DetectedFace, EmotionScores, IdentifyCandidate, ImageAnalysis, Prediction,
    };
    use crate::test_support::{activity, context, dialog_set, Fakes};

    fn image(url: &str) -> Attachment {
        Attachment {
            content_type: "image/jpeg".to_string(),
            content_url: Some(url.to_string()),
            ..Attachment::default()
        }
    }

    fn texts(ctx: &crate::turn::TurnContext) -> Vec<String> {
        ctx.replies().iter().map(|reply| reply.text_content().to_string()).collect()
    }

    fn with_attachments(attachments: Vec<Attachment>) -> crate::turn::TurnContext {
        let mut inbound = activity("");
        inbound.attachments = attachments;
        context(inbound)
    }

    #[tokio::test]
    async fn missing_attachment_prompts_for_image() {
        let fakes = Fakes::default();
        let set = dialog_set(&fakes);
        let mut ctx = with_attachments(Vec::new());

        let outcome = continue_dialog(&set, &mut ctx).await.expect("vision");

        assert!(matches!(outcome, FrameOutcome::Waiting(_)));
        assert_eq!(texts(&ctx), vec![ATTACHMENT_PROMPT.to_string()]);
    }

    #[tokio::test]
    async fn non_image_is_reported_without_any_service_call() {
        let fakes = Fakes::default();
        let set = dialog_set(&fakes);
        let mut ctx = with_attachments(vec![Attachment {
            content_type: "text/plain".to_string(),
            content_url: Some("https://files.example/notes.txt".to_string()),
            ..Attachment::default()
        }]);

        let outcome = continue_dialog(&set, &mut ctx).await.expect("vision");

        assert_eq!(outcome, FrameOutcome::Complete(DialogResult::Empty));
        assert_eq!(texts(&ctx), vec!["Por favor adjunta una imagen (enviaste: text/plain)"]);
        assert!(fakes.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_image_url_stops_processing() {
        let fakes = Fakes::default().with_vision_error(ServiceError::Status {
            service: "vision",
            status: 400,
            code: Some("InvalidImageUrl".to_string()),
            message: "Image URL is badly formatted.".to_string(),
        });
        let set = dialog_set(&fakes);
        let mut ctx = with_attachments(vec![image("bad"), image("https://img.example/2.jpg")]);

        continue_dialog(&set, &mut ctx).await.expect("vision");

        assert_eq!(texts(&ctx).last().map(String::as_str), Some(EMPTY_ANALYSIS));
        assert_eq!(fakes.calls(), vec!["vision:bad".to_string()]);
    }

    #[tokio::test]
    async fn people_are_detected_and_identified() {
        let fakes = Fakes::default()
            .with_analysis(ImageAnalysis {
                category: Some("gente_retrato".to_string()),
                caption: Some("un hombre sonriendo".to_string()),
                tags: vec!["persona".to_string(), "hombre".to_string()],
            })
            .with_faces(vec![DetectedFace {
                face_id: "face-1".to_string(),
                gender: Some("male".to_string()),
                age: Some(34.0),
                emotion: EmotionScores { happiness: 0.9, ..EmotionScores::default() },
            }])
            .with_candidates(vec![IdentifyCandidate {
                person_id: "person-1".to_string(),
                confidence: 0.8,
            }]);
        let set = dialog_set(&fakes);
        let mut ctx = with_attachments(vec![image("https://img.example/1.jpg")]);

        continue_dialog(&set, &mut ctx).await.expect("vision");

        let texts = texts(&ctx);
        assert_eq!(
            texts[1],
            "Categoría: gente_retrato\n\nDescripción: un hombre sonriendo\n\nEtiquetas: persona,hombre"
        );
        assert_eq!(texts[3], "Género: hombre\n\nEdad: 34\n\nEmoción: positiva\n\nId: face-1");
        assert_eq!(texts[5], "Persona Identificada: Fernando");
    }

    #[tokio::test]
    async fn coffee_classifier_ranks_variety_and_state() {
        let fakes = Fakes::default()
            .with_analysis(ImageAnalysis {
                category: Some("planta_".to_string()),
                caption: None,
                tags: vec!["cafe".to_string()],
            })
            .with_predictions(vec![
                Prediction { tag_name: "cafe".to_string(), probability: 0.9876 },
                Prediction { tag_name: "robusta".to_string(), probability: 0.6 },
                Prediction { tag_name: "arabica".to_string(), probability: 0.3 },
                Prediction { tag_name: "tostado".to_string(), probability: 0.75 },
            ]);
        let set = dialog_set(&fakes);
        let mut ctx = with_attachments(vec![image("https://img.example/cafe.jpg")]);

        continue_dialog(&set, &mut ctx).await.expect("vision");

        assert_eq!(
            texts(&ctx).last().map(String::as_str),
            Some(
                "Café: 98.76%\n\nVariedad: Robusta 60% (Arabica 30%)\n\nEstado: Tostado 75% (Arbol 0%)"
            )
        );
        assert!(fakes.calls().contains(&"classify:cafe:https://img.example/cafe.jpg".to_string()));
    }

    #[tokio::test]
    async fn cheese_report_never_fills_the_sabana_type() {
        let fakes = Fakes::default()
            .with_analysis(ImageAnalysis {
                category: None,
                caption: None,
                tags: vec!["alimentos".to_string()],
            })
            .with_predictions(vec![
                Prediction { tag_name: "queso".to_string(), probability: 0.9 },
                Prediction { tag_name: "alpina".to_string(), probability: 0.7 },
                Prediction { tag_name: "colanta".to_string(), probability: 0.2 },
                Prediction { tag_name: "campesino".to_string(), probability: 0.5 },
                Prediction { tag_name: "sabana".to_string(), probability: 0.8 },
            ]);
        let set = dialog_set(&fakes);
        let mut ctx = with_attachments(vec![image("https://img.example/queso.jpg")]);

        continue_dialog(&set, &mut ctx).await.expect("vision");

        assert_eq!(
            texts(&ctx).last().map(String::as_str),
            Some(
                "Queso: 90%\n\nMarca: Alpina 70% (Colanta 20%)\n\nTipo:\n\nCampesino - 50% \n\nMozarella - 0% \n\nParmesano - 0% \n\nQuesito - 0% \n\nSabana - 0%"
            )
        );
    }

    #[tokio::test]
    async fn classifier_errors_surface_raw_text() {
        let fakes = Fakes::default()
            .with_analysis(ImageAnalysis {
                category: None,
                caption: None,
                tags: vec!["alimentos".to_string()],
            })
            .with_classifier_error(ServiceError::transport("custom_vision", "socket hang up"));
        let set = dialog_set(&fakes);
        let mut ctx = with_attachments(vec![image("https://img.example/queso.jpg")]);

        continue_dialog(&set, &mut ctx).await.expect("vision");

        assert_eq!(texts(&ctx).last().map(String::as_str), Some("socket hang up"));
    }

    #[test]
    fn emotion_priority_prefers_surprise_over_happiness() {
        let scores = EmotionScores { surprise: 0.6, happiness: 0.9, ..EmotionScores::default() };
        assert_eq!(emotion_bucket(&scores), "negativa");
        assert_eq!(emotion_bucket(&EmotionScores::default()), "-");
    }
}
