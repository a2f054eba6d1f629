use std::time::{Duration, SystemTime};

use chrono::{DateTime, SecondsFormat, Utc};

/// RFC 3339 timestamp in UTC with whole seconds, e.g. "2021-01-01T12:00:00Z".
pub fn system_time_to_string(system_time: SystemTime) -> String
{
    let datetime: DateTime<Utc> = system_time.into();
    datetime.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Human readable duration for log lines, e.g. "1m 05.250s".
pub fn format_duration(duration: Duration) -> String
{
    let seconds = duration.as_secs_f64();
    let minutes = (seconds / 60.0).floor();
    if minutes >= 1.0 {
        format!("{}m {:06.3}s", minutes as u64, seconds - minutes * 60.0)
    } else {
        format!("{:.3}s", seconds)
    }
}
