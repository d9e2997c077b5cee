use crate::{time_sync::format_calendar, types::Reading};

pub const CSV_HEADER: &str = "timestamp,temp_C,humidity_RH";

/// `YYYY-MM-DD HH:MM:SS,<temp:.2>,<humidity:.1>` for an offset-adjusted epoch.
pub fn format_csv_line(epoch_seconds_local: i64, reading: Reading) -> String {
    format!(
        "{},{:.2},{:.1}",
        format_calendar(epoch_seconds_local),
        reading.temperature_c,
        reading.humidity_rh
    )
}
