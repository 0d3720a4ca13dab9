use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tertulia_channel::connector::{ConnectorError, ReplyConnector};
use tertulia_channel::messages::Reply;
use tertulia_core::domain::activity::Activity;
use tracing::{info, warn};

use crate::services::BotCredentials;

/// Posts replies to the channel's connector REST API.
pub struct HttpConnector {
    client: Client,
    credentials: Option<Arc<BotCredentials>>,
}

impl HttpConnector {
    pub fn new(client: Client, credentials: Option<Arc<BotCredentials>>) -> Self {
        Self { client, credentials }
    }
}

/// `{serviceUrl}/v3/conversations/{id}/activities`, with the id as one encoded segment.
pub(crate) fn activities_url(service_url: &str, conversation_id: &str) -> Result<Url, ConnectorError> {
    let mut url = Url::parse(service_url)
        .map_err(|error| ConnectorError::Delivery(format!("invalid service url: {error}")))?;
    url.path_segments_mut()
        .map_err(|_| ConnectorError::Delivery("service url cannot hold a path".to_string()))?
        .pop_if_empty()
        .extend(["v3", "conversations", conversation_id, "activities"]);
    Ok(url)
}

#[async_trait]
impl ReplyConnector for HttpConnector {
    async fn send(&self, inbound: &Activity, replies: &[Reply]) -> Result<(), ConnectorError> {
        if replies.is_empty() {
            return Ok(());
        }
        let service_url = inbound.service_url.as_deref().ok_or(ConnectorError::MissingServiceUrl)?;
        let url = activities_url(service_url, &inbound.conversation.id)?;

        let token = match &self.credentials {
            Some(credentials) => Some(
                credentials
                    .access_token()
                    .await
                    .map_err(|error| ConnectorError::Token(error.to_string()))?,
            ),
            None => None,
        };

        for reply in replies {
            let mut request = self.client.post(url.clone()).json(&reply.to_activity(inbound));
            if let Some(token) = &token {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(|error| ConnectorError::Delivery(error.to_string()))?;
            if !response.status().is_success() {
                let status = response.status();
                warn!(
                    event_name = "egress.connector.rejected",
                    correlation_id = %inbound.correlation_id(),
                    conversation_id = %inbound.conversation.id,
                    status = status.as_u16(),
                    "channel rejected reply"
                );
                return Err(ConnectorError::Delivery(format!("channel returned HTTP {status}")));
            }
        }

        info!(
            event_name = "egress.connector.delivered",
            correlation_id = %inbound.correlation_id(),
            conversation_id = %inbound.conversation.id,
            reply_count = replies.len(),
            "replies delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tertulia_channel::connector::{ConnectorError, ReplyConnector};
    use tertulia_channel::messages::Reply;
    use tertulia_core::domain::activity::Activity;

    use super::{activities_url, HttpConnector};
    use crate::services::http_client;

    #[test]
    fn activities_url_encodes_conversation_id() {
        let url = activities_url("https://smba.trafficmanager.net/amer/", "a:1/b c")
            .expect("url");

        assert_eq!(
            url.as_str(),
            "https://smba.trafficmanager.net/amer/v3/conversations/a:1%2Fb%20c/activities"
        );
    }

    #[test]
    fn service_url_without_trailing_slash_is_extended() {
        let url = activities_url("http://localhost:50000", "conv-1").expect("url");
        assert_eq!(url.as_str(), "http://localhost:50000/v3/conversations/conv-1/activities");
    }

    #[tokio::test]
    async fn replies_need_a_service_url() {
        let connector = HttpConnector::new(http_client(5).expect("client"), None);

        let error = connector
            .send(&Activity::message("hola"), &[Reply::text("hola")])
            .await
            .expect_err("no service url");

        assert_eq!(error, ConnectorError::MissingServiceUrl);
    }
}
