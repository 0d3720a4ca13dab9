use serde::{Deserialize, Serialize};

/// Top-scoring intent label returned by the recognizer, as a closed set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BookFlight,
    Initial,
    Certificate,
    Forex,
    Machine,
    Sensor,
    Translate,
    Vision,
    General,
    None,
    /// A label the dispatcher has no handler for. Keeps the raw, lower-cased label.
    Other(String),
}

impl Intent {
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "bookflight" => Self::BookFlight,
            "initial" => Self::Initial,
            "certificate" => Self::Certificate,
            "forex" => Self::Forex,
            "machine" => Self::Machine,
            "sensor" => Self::Sensor,
            "translate" => Self::Translate,
            "vision" => Self::Vision,
            "general" => Self::General,
            "none" => Self::None,
            _ => Self::Other(label),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::BookFlight => "bookflight",
            Self::Initial => "initial",
            Self::Certificate => "certificate",
            Self::Forex => "forex",
            Self::Machine => "machine",
            Self::Sensor => "sensor",
            Self::Translate => "translate",
            Self::Vision => "vision",
            Self::General => "general",
            Self::None => "none",
            Self::Other(label) => label,
        }
    }
}

/// A city mentioned in the utterance and, when recognized, its airport.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityEntity {
    pub city: Option<String>,
    pub airport: Option<String>,
}

impl CityEntity {
    /// A city the recognizer saw but could not map to a supported airport.
    pub fn unsupported_city(&self) -> Option<&str> {
        match (&self.city, &self.airport) {
            (Some(city), None) => Some(city.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingEntities {
    pub from: CityEntity,
    pub to: CityEntity,
    pub travel_date: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub text: String,
    pub altered_text: Option<String>,
    pub intent: Intent,
    pub sentiment: Option<f64>,
    pub entities: BookingEntities,
}

impl IntentResult {
    pub fn unclassified(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            altered_text: None,
            intent: Intent::None,
            sentiment: None,
            entities: BookingEntities::default(),
        }
    }

    /// Spell-corrected text when the recognizer altered the query, else the original.
    pub fn question(&self) -> &str {
        self.altered_text.as_deref().unwrap_or(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::{CityEntity, Intent, IntentResult};

    #[test]
    fn labels_map_case_insensitively_to_closed_set() {
        assert_eq!(Intent::from_label("BookFlight"), Intent::BookFlight);
        assert_eq!(Intent::from_label("Sensor"), Intent::Sensor);
        assert_eq!(Intent::from_label("None"), Intent::None);
        assert_eq!(Intent::from_label("Weather"), Intent::Other("weather".to_string()));
        assert_eq!(Intent::from_label("Weather").label(), "weather");
    }

    #[test]
    fn unsupported_city_requires_missing_airport() {
        let supported =
            CityEntity { city: Some("paris".to_string()), airport: Some("Paris".to_string()) };
        let unsupported = CityEntity { city: Some("bogota".to_string()), airport: None };

        assert_eq!(supported.unsupported_city(), None);
        assert_eq!(unsupported.unsupported_city(), Some("bogota"));
        assert_eq!(CityEntity::default().unsupported_city(), None);
    }

    #[test]
    fn question_prefers_altered_text() {
        let mut result = IntentResult::unclassified("temperatrua");
        assert_eq!(result.question(), "temperatrua");

        result.altered_text = Some("temperatura".to_string());
        assert_eq!(result.question(), "temperatura");
    }
}
