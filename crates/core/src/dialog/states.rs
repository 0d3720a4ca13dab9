use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::booking::BookingDetails;

/// Identifies a dialog for logs and errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    Main,
    Booking,
    Certificate,
    Forex,
    Machine,
    Sensor,
    Translate,
    Vision,
}

impl DialogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Booking => "booking",
            Self::Certificate => "certificate",
            Self::Forex => "forex",
            Self::Machine => "machine",
            Self::Sensor => "sensor",
            Self::Translate => "translate",
            Self::Vision => "vision",
        }
    }
}

/// One suspended dialog instance. Each variant carries the typed record its
/// dialog has collected so far and the step that receives the next input.
///
/// Forex and sensor finish within the turn that starts them, so they never
/// appear on a persisted stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dialog", rename_all = "snake_case")]
pub enum DialogFrame {
    Main(MainState),
    Booking(BookingState),
    Certificate(CertificateState),
    Machine(MachineState),
    Translate,
    Vision,
}

impl DialogFrame {
    pub fn kind(&self) -> DialogKind {
        match self {
            Self::Main(_) => DialogKind::Main,
            Self::Booking(_) => DialogKind::Booking,
            Self::Certificate(_) => DialogKind::Certificate,
            Self::Machine(_) => DialogKind::Machine,
            Self::Translate => DialogKind::Translate,
            Self::Vision => DialogKind::Vision,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainStep {
    /// Waiting for the user's reply to the restart prompt.
    Act,
    /// Waiting for a child task dialog to end.
    Final,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainState {
    pub step: MainStep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStep {
    Destination,
    Origin,
    TravelDate,
    Confirm,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingState {
    pub step: BookingStep,
    pub details: BookingDetails,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStep {
    SignIn,
    Choose,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateState {
    pub step: CertificateStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_in_started_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStep {
    Age,
    Study,
    Gender,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineState {
    pub step: MachineStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_years: Option<u32>,
}
