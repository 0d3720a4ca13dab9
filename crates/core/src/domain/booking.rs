use serde::{Deserialize, Serialize};

/// Flight booking values collected by the booking dialog. `travel_date` holds
/// a TIMEX expression.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    pub destination: Option<String>,
    pub origin: Option<String>,
    pub travel_date: Option<String>,
}

impl BookingDetails {
    pub fn is_complete(&self) -> bool {
        self.destination.is_some() && self.origin.is_some() && self.travel_date.is_some()
    }
}
