// Time label helpers shared by the engine and anything that reads or writes bar windows.
pub mod bar_time {
    use anyhow::{anyhow, Result};
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

    /// Broker layout for intraday bars ("20251006 09:30:00").
    pub const BROKER_FORMAT: &str = "%Y%m%d %H:%M:%S";

    const DATETIME_FORMATS: [&str; 3] = [BROKER_FORMAT, "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    const DATE_FORMATS: [&str; 2] = ["%Y%m%d", "%Y-%m-%d"];

    // Parses a bar time label into a UTC timestamp. Accepted layouts:
    // broker intraday ("20251006 09:30:00", repeated spaces allowed), broker daily ("20251006"),
    // ISO-like with or without 'T', RFC 3339 with offset, and epoch seconds.
    pub fn parse(label: &str) -> Result<DateTime<Utc>> {
        let normalized = label.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            return Err(anyhow!("Empty time label"));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
            return Ok(dt.with_timezone(&Utc));
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
                return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
            }
        }
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(&normalized, fmt) {
                if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                    return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
                }
            }
        }
        // Eight digits are a date and were handled above.
        if normalized.len() != 8 && normalized.chars().all(|c| c.is_ascii_digit()) {
            let secs: i64 = normalized
                .parse()
                .map_err(|e| anyhow!("Failed to parse epoch seconds '{}': {}", label, e))?;
            return DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| anyhow!("Epoch seconds out of range: '{}'", label));
        }

        Err(anyhow!("Unrecognized time label '{}'", label))
    }

    pub fn format(time: &DateTime<Utc>) -> String {
        time.format(BROKER_FORMAT).to_string()
    }

}
