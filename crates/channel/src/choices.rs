//! Renders a closed choice list the way each channel can display it.

use serde_json::json;
use tertulia_core::domain::activity::{Attachment, CardAction, InputHint, SuggestedActions};

use crate::messages::{Reply, ReplyBuilder};

const MAX_ACTION_TITLE_LENGTH: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListStyle {
    SuggestedActions,
    HeroCard,
    Inline,
    List,
}

fn suggested_action_limit(channel_id: &str) -> usize {
    match channel_id {
        "facebook" | "skype" => 10,
        "line" => 13,
        "kik" => 20,
        "telegram" | "emulator" | "directline" | "directlinespeech" | "webchat" => 100,
        _ => 0,
    }
}

fn card_action_limit(channel_id: &str) -> usize {
    match channel_id {
        "facebook" | "skype" | "msteams" => 3,
        "line" => 99,
        "slack" | "emulator" | "directline" | "directlinespeech" | "webchat" | "cortana" => 100,
        _ => 0,
    }
}

pub fn list_style(channel_id: &str, choices: &[&str]) -> ListStyle {
    let count = choices.len();
    let long_titles =
        choices.iter().any(|choice| choice.chars().count() > MAX_ACTION_TITLE_LENGTH);
    let suggested = count <= suggested_action_limit(channel_id);
    let cards = count <= card_action_limit(channel_id);

    if long_titles {
        ListStyle::List
    } else if suggested {
        ListStyle::SuggestedActions
    } else if cards {
        ListStyle::HeroCard
    } else if count <= 3 {
        ListStyle::Inline
    } else {
        ListStyle::List
    }
}

/// A prompt that offers `choices`, rendered for `channel_id`.
pub fn choice_prompt(channel_id: &str, text: &str, choices: &[&str]) -> Reply {
    match list_style(channel_id, choices) {
        ListStyle::SuggestedActions => ReplyBuilder::new(text)
            .input_hint(InputHint::ExpectingInput)
            .suggested_actions(SuggestedActions {
                actions: choices.iter().map(|choice| CardAction::im_back(*choice)).collect(),
                to: Vec::new(),
            })
            .build(),
        ListStyle::HeroCard => ReplyBuilder::empty()
            .input_hint(InputHint::ExpectingInput)
            .attachment(hero_card(text, choices))
            .build(),
        ListStyle::Inline => Reply::prompt(inline_text(text, choices)),
        ListStyle::List => Reply::prompt(list_text(text, choices)),
    }
}

fn hero_card(text: &str, choices: &[&str]) -> Attachment {
    let buttons: Vec<CardAction> =
        choices.iter().map(|choice| CardAction::im_back(*choice)).collect();
    Attachment {
        content_type: "application/vnd.microsoft.card.hero".to_string(),
        content: Some(json!({ "text": text, "buttons": buttons })),
        ..Attachment::default()
    }
}

fn inline_text(text: &str, choices: &[&str]) -> String {
    let mut rendered = String::from(text);
    for (index, choice) in choices.iter().enumerate() {
        let separator = match index {
            0 => " ",
            _ if index + 1 == choices.len() && choices.len() == 2 => " or ",
            _ if index + 1 == choices.len() => ", or ",
            _ => ", ",
        };
        rendered.push_str(separator);
        rendered.push_str(&format!("({}) {choice}", index + 1));
    }
    rendered
}

fn list_text(text: &str, choices: &[&str]) -> String {
    let mut rendered = String::from(text);
    rendered.push_str("\n\n");
    for (index, choice) in choices.iter().enumerate() {
        rendered.push_str(&format!("   {}. {choice}\n", index + 1));
    }
    rendered.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::{choice_prompt, list_style, ListStyle};

    const MENU: [&str; 7] = ["QnA", "IoT", "Traducir", "Imagen", "Salario", "TRM", "Certificado"];

    #[test]
    fn webchat_gets_suggested_actions() {
        let reply = choice_prompt("webchat", "¿Qué puedo hacer?", &MENU);

        let actions = reply.suggested_actions.expect("suggested actions");
        assert_eq!(actions.actions.len(), 7);
        assert_eq!(actions.actions[2].title, "Traducir");
        assert_eq!(reply.text.as_deref(), Some("¿Qué puedo hacer?"));
    }

    #[test]
    fn teams_uses_hero_card_for_short_lists() {
        assert_eq!(list_style("msteams", &["Nomina", "Ingresos"]), ListStyle::HeroCard);
        let reply = choice_prompt("msteams", "¿Qué certificado requiere?", &["Nomina", "Ingresos"]);
        assert_eq!(reply.attachments[0].content_type, "application/vnd.microsoft.card.hero");
    }

    #[test]
    fn unknown_channels_fall_back_to_text() {
        let inline = choice_prompt("sms", "Indiqueme su género:", &["Mujer", "Hombre", "N/D"]);
        assert_eq!(inline.text_content(), "Indiqueme su género: (1) Mujer, (2) Hombre, or (3) N/D");

        let list = choice_prompt("sms", "Menu", &MENU);
        assert!(list.text_content().starts_with("Menu\n\n   1. QnA\n   2. IoT"));
    }
}
