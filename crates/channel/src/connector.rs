use std::sync::Mutex;

use async_trait::async_trait;
use tertulia_core::domain::activity::Activity;
use thiserror::Error;
use tracing::{debug, info};

use crate::messages::Reply;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("inbound activity has no service url to reply to")]
    MissingServiceUrl,
    #[error("bot token request failed: {0}")]
    Token(String),
    #[error("reply delivery failed: {0}")]
    Delivery(String),
}

/// Delivers replies back to the channel the inbound activity came from.
#[async_trait]
pub trait ReplyConnector: Send + Sync {
    async fn send(&self, inbound: &Activity, replies: &[Reply]) -> Result<(), ConnectorError>;
}

/// Discards replies. Used when every caller asks for inline `expectReplies` delivery.
#[derive(Default)]
pub struct NoopConnector;

#[async_trait]
impl ReplyConnector for NoopConnector {
    async fn send(&self, inbound: &Activity, replies: &[Reply]) -> Result<(), ConnectorError> {
        debug!(
            event_name = "egress.connector.discarded",
            correlation_id = %inbound.correlation_id(),
            reply_count = replies.len(),
            "noop connector discarded replies"
        );
        Ok(())
    }
}

/// Keeps every delivered activity in memory, in order.
#[derive(Default)]
pub struct RecordingConnector {
    sent: Mutex<Vec<Activity>>,
}

impl RecordingConnector {
    pub fn sent(&self) -> Vec<Activity> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ReplyConnector for RecordingConnector {
    async fn send(&self, inbound: &Activity, replies: &[Reply]) -> Result<(), ConnectorError> {
        let mut sent =
            self.sent.lock().map_err(|_| ConnectorError::Delivery("recorder poisoned".into()))?;
        sent.extend(replies.iter().map(|reply| reply.to_activity(inbound)));
        info!(
            event_name = "egress.connector.recorded",
            correlation_id = %inbound.correlation_id(),
            reply_count = replies.len(),
            "replies recorded"
        );
        Ok(())
    }
}
