use serde::Serialize;

/// Latest climate values served by the page and written to the CSV log.
///
/// Starts at `0.0/0.0`; a zero reading is indistinguishable from "never read".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Reading {
    #[serde(rename = "temperatureC")]
    pub temperature_c: f32,
    #[serde(rename = "humidityRh")]
    pub humidity_rh: f32,
}

impl Reading {
    pub fn new(temperature_c: f32, humidity_rh: f32) -> Self {
        Self {
            temperature_c,
            humidity_rh,
        }
    }
}
