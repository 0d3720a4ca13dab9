//! Flight booking: collects destination, origin and travel date, then confirms.

use tertulia_channel::choices::choice_prompt;
use tertulia_channel::messages::Reply;
use tertulia_core::dialog::{BookingState, BookingStep, DialogFrame};
use tertulia_core::domain::booking::BookingDetails;

use super::{DialogResult, FrameOutcome};
use crate::prompts::{recognize_choice, recognize_confirm};
use crate::timex;
use crate::turn::TurnContext;

const DESTINATION_PROMPT: &str = "To what city would you like to travel?";
const ORIGIN_PROMPT: &str = "From what city will you be travelling?";
const DATE_PROMPT: &str = "On what date would you like to travel?";
const DATE_RETRY: &str =
    "I'm sorry, for best results, please enter your travel date including the month, day and year.";
const CONFIRM_CHOICES: [&str; 2] = ["Yes", "No"];

pub fn begin(ctx: &mut TurnContext, details: BookingDetails) -> FrameOutcome {
    ask_next(ctx, details)
}

pub fn continue_dialog(ctx: &mut TurnContext, state: BookingState) -> FrameOutcome {
    let BookingState { step, mut details } = state;
    let text = ctx.text().map(str::to_string);

    match step {
        BookingStep::Destination => {
            details.destination = text;
            ask_next(ctx, details)
        }
        BookingStep::Origin => {
            details.origin = text;
            ask_next(ctx, details)
        }
        BookingStep::TravelDate => {
            let today = ctx.now().date_naive();
            match text.as_deref().and_then(|text| timex::parse_user_date(text, today)) {
                Some(date) => {
                    details.travel_date = Some(date);
                    ask_next(ctx, details)
                }
                None => {
                    ctx.send(Reply::prompt(DATE_RETRY));
                    waiting(BookingStep::TravelDate, details)
                }
            }
        }
        BookingStep::Confirm => {
            let answer = text.as_deref().and_then(|text| {
                recognize_confirm(text)
                    .or_else(|| recognize_choice(text, &CONFIRM_CHOICES).map(|index| index == 0))
            });
            match answer {
                Some(true) => FrameOutcome::Complete(DialogResult::Booking(Some(details))),
                Some(false) => FrameOutcome::Complete(DialogResult::Booking(None)),
                None => {
                    ctx.send(confirm_prompt(ctx.channel_id(), &details));
                    waiting(BookingStep::Confirm, details)
                }
            }
        }
    }
}

/// Prompts for the first missing value, or for confirmation once all are known.
fn ask_next(ctx: &mut TurnContext, details: BookingDetails) -> FrameOutcome {
    if details.destination.is_none() {
        ctx.send(Reply::prompt(DESTINATION_PROMPT));
        return waiting(BookingStep::Destination, details);
    }
    if details.origin.is_none() {
        ctx.send(Reply::prompt(ORIGIN_PROMPT));
        return waiting(BookingStep::Origin, details);
    }
    // Partial dates such as `XXXX-03-22` are asked for again.
    if !details.travel_date.as_deref().is_some_and(timex::is_definite) {
        ctx.send(Reply::prompt(DATE_PROMPT));
        return waiting(BookingStep::TravelDate, details);
    }

    ctx.send(confirm_prompt(ctx.channel_id(), &details));
    waiting(BookingStep::Confirm, details)
}

fn confirm_prompt(channel_id: &str, details: &BookingDetails) -> Reply {
    let text = format!(
        "Please confirm, I have you traveling to: {} from: {} on: {}. Is this correct?",
        details.destination.as_deref().unwrap_or_default(),
        details.origin.as_deref().unwrap_or_default(),
        details.travel_date.as_deref().unwrap_or_default(),
    );
    choice_prompt(channel_id, &text, &CONFIRM_CHOICES)
}

fn waiting(step: BookingStep, details: BookingDetails) -> FrameOutcome {
    FrameOutcome::Waiting(DialogFrame::Booking(BookingState { step, details }))
}
