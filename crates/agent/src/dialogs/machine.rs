//! Income prediction from age, years of study and gender.

use tertulia_channel::choices::choice_prompt;
use tertulia_channel::messages::Reply;
use tertulia_core::dialog::{
    DialogFrame, DialogKind, DialogTransitionError, MachineState, MachineStep,
};
use tracing::warn;

use super::{DialogError, DialogResult, DialogSet, FrameOutcome};
use crate::prompts::{recognize_choice, NumberPrompt};
use crate::services::{IncomeFeatures, Sex};
use crate::turn::TurnContext;

const GENDER_PROMPT: &str = "Indiqueme su género:";
const GENDER_CHOICES: [&str; 3] = ["Mujer", "Hombre", "N/D"];
const PREDICTION_FAILED: &str =
    "No fue posible realizar la predicción, por favor intente nuevamente.";

pub fn age_prompt() -> NumberPrompt {
    NumberPrompt {
        prompt: "Indiqueme su edad en años:",
        retry: "Solamente analizo rango de edad entre 16 y 90 años, por favor intente nuevamente.",
        range: 16..=90,
    }
}

pub fn study_prompt() -> NumberPrompt {
    NumberPrompt {
        prompt: "Indiqueme sus años de estudio (incluyendo Colegio):",
        retry: "Solamente analizo rango de estudio entre 0 y 25 años, por favor intente nuevamente.",
        range: 0..=25,
    }
}

pub fn begin(ctx: &mut TurnContext) -> FrameOutcome {
    ctx.send(Reply::prompt(age_prompt().prompt));
    waiting(MachineState { step: MachineStep::Age, age: None, study_years: None })
}

pub async fn continue_dialog(
    set: &DialogSet,
    ctx: &mut TurnContext,
    mut state: MachineState,
) -> Result<FrameOutcome, DialogError> {
    let text = ctx.text().unwrap_or_default().to_string();

    match state.step {
        MachineStep::Age => {
            let prompt = age_prompt();
            let Some(age) = prompt.validate(&text) else {
                ctx.send(Reply::prompt(prompt.retry));
                return Ok(waiting(state));
            };
            state.age = Some(age);
            state.step = MachineStep::Study;
            ctx.send(Reply::prompt(study_prompt().prompt));
            Ok(waiting(state))
        }
        MachineStep::Study => {
            let prompt = study_prompt();
            let Some(years) = prompt.validate(&text) else {
                ctx.send(Reply::prompt(prompt.retry));
                return Ok(waiting(state));
            };
            state.study_years = Some(years);
            state.step = MachineStep::Gender;
            ctx.send(choice_prompt(ctx.channel_id(), GENDER_PROMPT, &GENDER_CHOICES));
            Ok(waiting(state))
        }
        MachineStep::Gender => {
            let Some(choice) = recognize_choice(&text, &GENDER_CHOICES) else {
                ctx.send(choice_prompt(ctx.channel_id(), GENDER_PROMPT, &GENDER_CHOICES));
                return Ok(waiting(state));
            };
            let features = IncomeFeatures {
                age: required(state.age, "age")?,
                education_years: required(state.study_years, "study_years")?,
                sex: sex_for(GENDER_CHOICES[choice]),
            };
            predict(set, ctx, &features).await;
            Ok(FrameOutcome::Complete(DialogResult::Empty))
        }
    }
}

fn required(value: Option<u32>, field: &'static str) -> Result<u32, DialogTransitionError> {
    value.ok_or(DialogTransitionError::MissingValue {
        dialog: DialogKind::Machine,
        field,
        step: "gender",
    })
}

fn sex_for(choice: &str) -> Sex {
    let choice = choice.to_lowercase();
    if choice.contains("muj") {
        Sex::Female
    } else if choice.contains("homb") {
        Sex::Male
    } else {
        Sex::Unspecified
    }
}

async fn predict(set: &DialogSet, ctx: &mut TurnContext, features: &IncomeFeatures) {
    match set.services.ml.score(features).await {
        Ok(probability) => {
            let percent = (probability * 100.0).round();
            ctx.send_text(format!("{percent}% probable que gane mas de USD 50k/año"));
        }
        Err(error) => {
            warn!(
                event_name = "dialog.machine.failed",
                correlation_id = %ctx.activity().correlation_id(),
                error = %error,
                "income prediction failed"
            );
            ctx.send_text(PREDICTION_FAILED);
        }
    }
}

fn waiting(state: MachineState) -> FrameOutcome {
    FrameOutcome::Waiting(DialogFrame::Machine(state))
}
