//! Turn runner: loads the conversation's dialog stack, applies interrupts,
//! runs the dialogs and persists what is left.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tertulia_channel::cards::{welcome_card, CardError};
use tertulia_channel::messages::Reply;
use tertulia_core::dialog::DialogStack;
use tertulia_core::domain::activity::{Activity, ActivityType};
use tertulia_db::{ConversationStateRepository, RepositoryError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::dialogs::certificate::{TOKEN_RESPONSE_EVENT, VERIFY_STATE_INVOKE};
use crate::dialogs::{DialogError, DialogSet, TURN_ERROR_MESSAGE};
use crate::interrupt::{Interrupt, InterruptPolicy};
use crate::services::DialogServices;
use crate::settings::TaskSettings;
use crate::turn::TurnContext;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Dialog(#[from] DialogError),
    #[error(transparent)]
    Card(#[from] CardError),
    #[error("conversation state: {0}")]
    State(#[from] RepositoryError),
}

type ConversationLock = Arc<tokio::sync::Mutex<()>>;

pub struct TurnRunner {
    dialogs: DialogSet,
    repository: Arc<dyn ConversationStateRepository>,
    policy: InterruptPolicy,
    locks: Mutex<HashMap<String, ConversationLock>>,
}

impl TurnRunner {
    pub fn new(
        services: DialogServices,
        settings: Arc<TaskSettings>,
        repository: Arc<dyn ConversationStateRepository>,
    ) -> Self {
        Self {
            dialogs: DialogSet::new(services, settings),
            repository,
            policy: InterruptPolicy::default(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: InterruptPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Handles one inbound activity and returns the replies to send back.
    pub async fn on_turn(&self, activity: Activity) -> Vec<Reply> {
        self.on_turn_at(activity, Utc::now()).await
    }

    pub async fn on_turn_at(&self, activity: Activity, now: DateTime<Utc>) -> Vec<Reply> {
        let conversation_id = activity.conversation.id.clone();
        let lock = self.conversation_lock(&conversation_id);
        let guard = lock.lock().await;

        let mut ctx = TurnContext::with_clock(activity, now);
        if let Err(turn_error) = self.dispatch(&mut ctx, &conversation_id).await {
            error!(
                event_name = "turn.failed",
                correlation_id = %ctx.activity().correlation_id(),
                conversation_id = %conversation_id,
                error = %turn_error,
                "turn failed, clearing conversation state"
            );
            ctx.send_text(TURN_ERROR_MESSAGE);
            if let Err(delete_error) = self.repository.delete(&conversation_id).await {
                warn!(
                    event_name = "turn.state_clear_failed",
                    correlation_id = %ctx.activity().correlation_id(),
                    conversation_id = %conversation_id,
                    error = %delete_error,
                    "could not clear conversation state"
                );
            }
        }

        drop(guard);
        self.release_lock(&conversation_id, &lock);
        ctx.into_replies()
    }

    async fn dispatch(&self, ctx: &mut TurnContext, conversation_id: &str) -> Result<(), TurnError> {
        let activity = ctx.activity();
        if activity.activity_type == ActivityType::ConversationUpdate {
            return self.greet_members(ctx);
        }

        let runs_dialogs = match activity.activity_type {
            ActivityType::Message => true,
            ActivityType::Event => activity.is_named(TOKEN_RESPONSE_EVENT),
            ActivityType::Invoke => activity.is_named(VERIFY_STATE_INVOKE),
            _ => false,
        };
        if !runs_dialogs {
            debug!(
                event_name = "turn.ignored",
                correlation_id = %activity.correlation_id(),
                conversation_id = %conversation_id,
                activity_type = ?activity.activity_type,
                "activity has no handler"
            );
            return Ok(());
        }

        self.run_dialogs(ctx, conversation_id).await
    }

    fn greet_members(&self, ctx: &mut TurnContext) -> Result<(), TurnError> {
        let bot_id = ctx.activity().recipient.id.clone();
        let newcomers =
            ctx.activity().members_added.iter().filter(|member| member.id != bot_id).count();
        for _ in 0..newcomers {
            ctx.send(Reply::attachment(welcome_card()?));
        }
        Ok(())
    }

    async fn run_dialogs(
        &self,
        ctx: &mut TurnContext,
        conversation_id: &str,
    ) -> Result<(), TurnError> {
        let mut stack = self.repository.load(conversation_id).await?.unwrap_or_default();

        let interrupt = if stack.is_empty() { None } else { self.policy.evaluate(ctx.text()) };
        match interrupt {
            Some(interrupt) => self.interrupt(ctx, conversation_id, interrupt, &mut stack).await,
            None => self.dialogs.run_turn(ctx, &mut stack).await?,
        }

        if stack.is_empty() {
            self.repository.delete(conversation_id).await?;
        } else {
            self.repository.save(conversation_id, ctx.channel_id(), &stack).await?;
        }
        debug!(
            event_name = "turn.completed",
            correlation_id = %ctx.activity().correlation_id(),
            conversation_id = %conversation_id,
            frames = stack.len(),
            replies = ctx.replies().len(),
            "turn completed"
        );
        Ok(())
    }

    async fn interrupt(
        &self,
        ctx: &mut TurnContext,
        conversation_id: &str,
        interrupt: Interrupt,
        stack: &mut DialogStack,
    ) {
        info!(
            event_name = interrupt.event_key(),
            correlation_id = %ctx.activity().correlation_id(),
            conversation_id = %conversation_id,
            "interrupting active dialog"
        );

        if interrupt.signs_out() {
            let connection = &self.dialogs.settings.oauth_connection_name;
            let signed_out =
                self.dialogs.services.identity.sign_out(ctx.activity(), connection).await;
            if let Err(sign_out_error) = signed_out {
                warn!(
                    event_name = "interrupt.sign_out_failed",
                    correlation_id = %ctx.activity().correlation_id(),
                    conversation_id = %conversation_id,
                    error = %sign_out_error,
                    "sign-out failed, clearing dialogs anyway"
                );
            }
        }

        ctx.send(interrupt.notification());
        if interrupt.cancels_dialogs() {
            stack.clear();
        }
    }

    fn conversation_lock(&self, conversation_id: &str) -> ConversationLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(conversation_id.to_string()).or_default().clone()
    }

    /// Drops the lock entry once no other turn for the conversation holds or awaits it.
    fn release_lock(&self, conversation_id: &str, lock: &ConversationLock) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(lock) == 2 {
            locks.remove(conversation_id);
        }
    }
}
