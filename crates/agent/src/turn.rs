use chrono::{DateTime, Utc};
use tertulia_channel::messages::Reply;
use tertulia_core::domain::activity::Activity;

/// State for handling one inbound activity. Never persisted.
pub struct TurnContext {
    activity: Activity,
    replies: Vec<Reply>,
    now: DateTime<Utc>,
}

impl TurnContext {
    pub fn new(activity: Activity) -> Self {
        Self::with_clock(activity, Utc::now())
    }

    pub fn with_clock(activity: Activity, now: DateTime<Utc>) -> Self {
        Self { activity, replies: Vec::new(), now }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn text(&self) -> Option<&str> {
        self.activity.trimmed_text()
    }

    pub fn channel_id(&self) -> &str {
        &self.activity.channel_id
    }

    pub fn sender_id(&self) -> &str {
        &self.activity.from.id
    }

    pub fn send(&mut self, reply: Reply) {
        self.replies.push(reply);
    }

    pub fn send_text(&mut self, text: impl Into<String>) {
        self.send(Reply::text(text));
    }

    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    pub fn into_replies(self) -> Vec<Reply> {
        self.replies
    }
}
