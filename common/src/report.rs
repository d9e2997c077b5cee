//! Summary of a captured serial console log.
//!
//! The console mixes startup chatter with CSV lines, so parsing is lenient:
//! anything that is not a `timestamp,temp,humidity` triple is skipped.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::types::Reading;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoggedReading {
    pub timestamp: NaiveDateTime,
    pub reading: Reading,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSummary {
    pub count: usize,
    pub skipped_lines: usize,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
    #[serde(rename = "temperatureC")]
    pub temperature_c: Range,
    #[serde(rename = "humidityRh")]
    pub humidity_rh: Range,
}

pub fn parse_line(line: &str) -> Option<LoggedReading> {
    let mut fields = line.trim().split(',');
    let timestamp = fields.next()?.trim();
    let temperature = fields.next()?.trim().parse::<f32>().ok()?;
    let humidity = fields.next()?.trim().parse::<f32>().ok()?;
    if fields.next().is_some() || !temperature.is_finite() || !humidity.is_finite() {
        return None;
    }

    let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
    Some(LoggedReading {
        timestamp,
        reading: Reading::new(temperature, humidity),
    })
}

pub fn parse_log(text: &str) -> (Vec<LoggedReading>, usize) {
    let mut readings = Vec::new();
    let mut skipped = 0;
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        match parse_line(line) {
            Some(reading) => readings.push(reading),
            None => skipped += 1,
        }
    }
    (readings, skipped)
}

fn range(values: impl Iterator<Item = f32>) -> Option<Range> {
    let mut count = 0_u32;
    let mut sum = 0.0_f64;
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for value in values {
        count += 1;
        sum += f64::from(value);
        min = min.min(value);
        max = max.max(value);
    }
    (count > 0).then(|| Range {
        min,
        max,
        mean: (sum / f64::from(count)) as f32,
    })
}

pub fn summarize(text: &str) -> Option<LogSummary> {
    let (readings, skipped_lines) = parse_log(text);
    let first = readings.iter().map(|r| r.timestamp).min()?;
    let last = readings.iter().map(|r| r.timestamp).max()?;

    Some(LogSummary {
        count: readings.len(),
        skipped_lines,
        first,
        last,
        temperature_c: range(readings.iter().map(|r| r.reading.temperature_c))?,
        humidity_rh: range(readings.iter().map(|r| r.reading.humidity_rh))?,
    })
}
