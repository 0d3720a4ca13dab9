pub mod stack;
pub mod states;

use thiserror::Error;

pub use stack::DialogStack;
pub use states::{
    BookingState, BookingStep, CertificateState, CertificateStep, DialogFrame, DialogKind,
    MachineState, MachineStep, MainState, MainStep,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DialogTransitionError {
    #[error("{dialog:?} dialog cannot be resumed from its current step")]
    UnexpectedResume { dialog: DialogKind },
    #[error("{dialog:?} dialog is missing `{field}` at step {step}")]
    MissingValue { dialog: DialogKind, field: &'static str, step: &'static str },
}
