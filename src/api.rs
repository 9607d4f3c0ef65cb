use schemars::JsonSchema;
use serde::Deserialize;

/// A booking proposal. `repeat_weeks` turns it into a weekly recurring
/// booking; omitted means a one-off.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct NewBooking {
    pub room: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub info: String,
    pub repeat_weeks: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LoginPayload {
    pub password: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DateQuery {
    pub date: String,
}

/// Query for the slot picker; `after` narrows the labels to valid end times
/// for a chosen start.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SlotsQuery {
    pub after: Option<String>,
}
