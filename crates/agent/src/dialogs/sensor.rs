//! IoT readings stored as table entities by the device gateways.

use serde_json::Value;
use tertulia_channel::cards::sensor_card;
use tertulia_channel::choices::choice_prompt;
use tertulia_channel::messages::Reply;
use tracing::warn;

use super::{DialogError, DialogResult, DialogSet, FrameOutcome};
use crate::turn::TurnContext;

const NOT_MONITORING: &str = "De momento no estoy monitoreando ningun sensor";
const SENSOR_PROMPT: &str = "Seleccione un sensor:";
const SENSOR_CHOICES: [&str; 5] = ["Temperatura", "Humedad", "Personas", "Hombres", "Mujeres"];
const STATE_ROW_KEY: &str = "state";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorReading {
    Temperature,
    Humidity,
    People,
    Women,
    Men,
}

impl SensorReading {
    /// Keyword containment on the lower-cased question, first match wins.
    pub fn from_question(question: &str) -> Option<Self> {
        let question = question.to_lowercase();
        [
            ("temp", Self::Temperature),
            ("hume", Self::Humidity),
            ("pers", Self::People),
            ("muje", Self::Women),
            ("homb", Self::Men),
        ]
        .into_iter()
        .find_map(|(keyword, reading)| question.contains(keyword).then_some(reading))
    }

    pub fn device(self) -> &'static str {
        match self {
            Self::Temperature | Self::Humidity => "iot-devkit",
            Self::People | Self::Women | Self::Men => "rpi-demo",
        }
    }

    /// Entity property holding the value. The people counter publishes its
    /// gender columns swapped, so women are read from `male` and men from `female`.
    pub fn property(self) -> &'static str {
        match self {
            Self::Temperature => "temp",
            Self::Humidity => "humi",
            Self::People => "people",
            Self::Women => "male",
            Self::Men => "female",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Temperature => "La temperatura actual es ",
            Self::Humidity => "La humedad actual es ",
            Self::People => "La cantidad de personas es ",
            Self::Women => "La cantidad de mujeres es ",
            Self::Men => "La cantidad de hombres es ",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Temperature => "°",
            Self::Humidity => "%",
            _ => "",
        }
    }
}

/// Reports the reading the question asks for, or offers the sensor menu.
pub async fn run(
    set: &DialogSet,
    ctx: &mut TurnContext,
    question: &str,
) -> Result<FrameOutcome, DialogError> {
    let Some(reading) = SensorReading::from_question(question) else {
        if set.settings.wants_card(ctx.channel_id(), ctx.sender_id()) {
            ctx.send(Reply::attachment(sensor_card()?));
        } else {
            ctx.send(choice_prompt(ctx.channel_id(), SENSOR_PROMPT, &SENSOR_CHOICES));
        }
        return Ok(FrameOutcome::Complete(DialogResult::Empty));
    };

    let entity = set
        .services
        .storage
        .retrieve_entity(&set.settings.storage_table, reading.device(), STATE_ROW_KEY)
        .await;

    let value = match entity {
        Ok(entity) => entity.property(reading.property()).and_then(display_value),
        Err(error) => {
            warn!(
                event_name = "dialog.sensor.failed",
                correlation_id = %ctx.activity().correlation_id(),
                device = reading.device(),
                error = %error,
                "sensor state lookup failed"
            );
            None
        }
    };

    match value {
        Some(value) => ctx.send_text(format!("{}{value}{}", reading.label(), reading.suffix())),
        None => ctx.send_text(NOT_MONITORING),
    }
    Ok(FrameOutcome::Complete(DialogResult::Empty))
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        // `23.0` displays as `23`.
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() => Some(float.to_string()),
            _ => Some(number.to_string()),
        },
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
