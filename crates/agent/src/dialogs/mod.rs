//! Waterfall dialogs and the stack machine that drives them.
//!
//! A dialog step either waits for the next turn (its frame goes back on the
//! stack), begins a child dialog (the parent frame stays below the child), or
//! completes with a result that is handed to the frame underneath.

pub mod booking;
pub mod certificate;
pub mod forex;
pub mod machine;
pub mod main;
pub mod sensor;
pub mod translate;
pub mod vision;

use std::sync::Arc;

use tertulia_channel::cards::CardError;
use tertulia_core::dialog::{DialogFrame, DialogKind, DialogStack, DialogTransitionError};
use tertulia_core::domain::booking::BookingDetails;
use tertulia_core::errors::ServiceError;
use thiserror::Error;
use tracing::debug;

use crate::services::DialogServices;
use crate::settings::TaskSettings;
use crate::turn::TurnContext;

/// Fixed apology for failures nobody handled further down.
pub const TURN_ERROR_MESSAGE: &str = "Disculpas, parece que algo no ha salido bien!";

#[derive(Debug, Error)]
pub enum DialogError {
    #[error(transparent)]
    Transition(#[from] DialogTransitionError),
    #[error(transparent)]
    Card(#[from] CardError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// A task dialog to begin, with whatever input the parent already has.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogRequest {
    Booking(BookingDetails),
    Certificate,
    Forex,
    Machine,
    Sensor { question: String },
    Translate,
    Vision,
}

impl DialogRequest {
    pub fn kind(&self) -> DialogKind {
        match self {
            Self::Booking(_) => DialogKind::Booking,
            Self::Certificate => DialogKind::Certificate,
            Self::Forex => DialogKind::Forex,
            Self::Machine => DialogKind::Machine,
            Self::Sensor { .. } => DialogKind::Sensor,
            Self::Translate => DialogKind::Translate,
            Self::Vision => DialogKind::Vision,
        }
    }
}

/// What an ended dialog hands back to its parent. Only booking returns data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogResult {
    Empty,
    Booking(Option<BookingDetails>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Waiting(DialogFrame),
    BeginChild { parent: DialogFrame, child: DialogRequest },
    Complete(DialogResult),
}

pub struct DialogSet {
    pub services: DialogServices,
    pub settings: Arc<TaskSettings>,
}

impl DialogSet {
    pub fn new(services: DialogServices, settings: Arc<TaskSettings>) -> Self {
        Self { services, settings }
    }

    /// Runs one turn against `stack`: resumes the top frame, or begins the
    /// main dialog when nothing is active.
    pub async fn run_turn(
        &self,
        ctx: &mut TurnContext,
        stack: &mut DialogStack,
    ) -> Result<(), DialogError> {
        let mut outcome = match stack.pop() {
            Some(frame) => self.continue_frame(ctx, frame).await?,
            None => main::begin(self, ctx, None).await?,
        };

        loop {
            match outcome {
                FrameOutcome::Waiting(frame) => {
                    stack.push(frame);
                    return Ok(());
                }
                FrameOutcome::BeginChild { parent, child } => {
                    debug!(
                        event_name = "dialog.child_started",
                        correlation_id = %ctx.activity().correlation_id(),
                        parent = parent.kind().as_str(),
                        child = child.kind().as_str(),
                        "beginning child dialog"
                    );
                    stack.push(parent);
                    outcome = self.begin(ctx, child).await?;
                }
                FrameOutcome::Complete(result) => match stack.pop() {
                    Some(parent) => outcome = self.resume(ctx, parent, result).await?,
                    None => return Ok(()),
                },
            }
        }
    }

    async fn begin(
        &self,
        ctx: &mut TurnContext,
        request: DialogRequest,
    ) -> Result<FrameOutcome, DialogError> {
        match request {
            DialogRequest::Booking(details) => Ok(booking::begin(ctx, details)),
            DialogRequest::Certificate => certificate::begin(self, ctx).await,
            DialogRequest::Forex => forex::run(self, ctx).await,
            DialogRequest::Machine => Ok(machine::begin(ctx)),
            DialogRequest::Sensor { question } => sensor::run(self, ctx, &question).await,
            DialogRequest::Translate => Ok(translate::begin(ctx)),
            DialogRequest::Vision => vision::begin(self, ctx).await,
        }
    }

    async fn continue_frame(
        &self,
        ctx: &mut TurnContext,
        frame: DialogFrame,
    ) -> Result<FrameOutcome, DialogError> {
        match frame {
            DialogFrame::Main(state) => main::continue_dialog(self, ctx, state).await,
            DialogFrame::Booking(state) => Ok(booking::continue_dialog(ctx, state)),
            DialogFrame::Certificate(state) => {
                certificate::continue_dialog(self, ctx, state).await
            }
            DialogFrame::Machine(state) => machine::continue_dialog(self, ctx, state).await,
            DialogFrame::Translate => translate::continue_dialog(self, ctx).await,
            DialogFrame::Vision => vision::continue_dialog(self, ctx).await,
        }
    }

    async fn resume(
        &self,
        ctx: &mut TurnContext,
        parent: DialogFrame,
        result: DialogResult,
    ) -> Result<FrameOutcome, DialogError> {
        match parent {
            DialogFrame::Main(state) => main::resume(self, ctx, state, result),
            other => {
                Err(DialogTransitionError::UnexpectedResume { dialog: other.kind() }.into())
            }
        }
    }
}
