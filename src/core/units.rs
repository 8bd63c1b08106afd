pub const JOULES_PER_KILOWATT_HOUR: u32 = 3_600_000;
pub const SECONDS_PER_HOUR: u32 = 3_600;
pub const HOURS_PER_DAY: u32 = 24;
pub const DAYS_PER_YEAR: u32 = 365;
pub const WATT_HOURS_PER_KILOWATT_HOUR: u32 = 1_000;

/// Converts an energy in joules (per metre of borehole) into kWh (per metre).
pub fn joules_to_kilowatt_hours(energy: f64) -> f64 {
    energy / JOULES_PER_KILOWATT_HOUR as f64
}

/// Converts a daily-sampled power integral (W/m x days) into kWh/m.
pub fn watt_days_to_kilowatt_hours(integral: f64) -> f64 {
    integral * HOURS_PER_DAY as f64 / WATT_HOURS_PER_KILOWATT_HOUR as f64
}

pub(crate) fn hours_to_seconds(hours: f64) -> f64 {
    hours * SECONDS_PER_HOUR as f64
}
