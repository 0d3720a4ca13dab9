use serde::Serialize;
use tertulia_core::domain::activity::{
    Activity, ActivityType, Attachment, InputHint, SuggestedActions,
};

/// One outbound message produced while handling a turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Reply {
    pub text: Option<String>,
    pub speak: Option<String>,
    pub input_hint: Option<InputHint>,
    pub attachments: Vec<Attachment>,
    pub attachment_layout: Option<String>,
    pub suggested_actions: Option<SuggestedActions>,
}

impl Reply {
    /// Plain text that does not wait for a reply.
    pub fn text(text: impl Into<String>) -> Self {
        ReplyBuilder::new(text).input_hint(InputHint::IgnoringInput).build()
    }

    /// Text that asks the user for input.
    pub fn prompt(text: impl Into<String>) -> Self {
        ReplyBuilder::new(text).input_hint(InputHint::ExpectingInput).build()
    }

    pub fn attachment(attachment: Attachment) -> Self {
        ReplyBuilder::empty().attachment(attachment).build()
    }

    pub fn text_content(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// Addresses this reply back to the sender of `inbound`.
    pub fn to_activity(&self, inbound: &Activity) -> Activity {
        Activity {
            activity_type: ActivityType::Message,
            id: None,
            timestamp: None,
            channel_id: inbound.channel_id.clone(),
            from: inbound.recipient.clone(),
            recipient: inbound.from.clone(),
            conversation: inbound.conversation.clone(),
            service_url: inbound.service_url.clone(),
            text: self.text.clone(),
            speak: self.speak.clone(),
            input_hint: self.input_hint,
            attachments: self.attachments.clone(),
            attachment_layout: self.attachment_layout.clone(),
            suggested_actions: self.suggested_actions.clone(),
            value: None,
            name: None,
            members_added: Vec::new(),
            delivery_mode: None,
            reply_to_id: inbound.id.clone(),
            locale: inbound.locale.clone(),
        }
    }
}

pub struct ReplyBuilder {
    reply: Reply,
}

impl ReplyBuilder {
    /// Starts a reply whose text is also spoken on voice channels.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self { reply: Reply { speak: Some(text.clone()), text: Some(text), ..Reply::default() } }
    }

    pub fn empty() -> Self {
        Self { reply: Reply::default() }
    }

    pub fn input_hint(mut self, hint: InputHint) -> Self {
        self.reply.input_hint = Some(hint);
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.reply.attachments.push(attachment);
        self
    }

    pub fn carousel(mut self) -> Self {
        self.reply.attachment_layout = Some("carousel".to_string());
        self
    }

    pub fn suggested_actions(mut self, actions: SuggestedActions) -> Self {
        self.reply.suggested_actions = Some(actions);
        self
    }

    pub fn build(self) -> Reply {
        self.reply
    }
}
