use std::fmt::Display;

use chrono::{DateTime, TimeZone};

/// Timestamp identifier with one-second granularity: `job_YYYYMMDD_HHMMSS`.
pub fn timestamp_job_id<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("job_{}", at.format("%Y%m%d_%H%M%S"))
}

/// Candidate id for the `attempt`-th try: the base first, then `_2`, `_3`, …
pub fn suffixed_id(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{}_{}", base, attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_timestamp_job_id_format() {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 9, 3, 7).unwrap();
        assert_eq!(timestamp_job_id(&at), "job_20260105_090307");
    }

    #[test]
    fn test_timestamp_job_id_uses_given_offset() {
        let seoul = FixedOffset::east_opt(9 * 3600).unwrap();
        let at = Utc
            .with_ymd_and_hms(2026, 1, 5, 20, 0, 0)
            .unwrap()
            .with_timezone(&seoul);
        assert_eq!(timestamp_job_id(&at), "job_20260106_050000");
    }

    #[test]
    fn test_suffixed_id() {
        assert_eq!(suffixed_id("job_20260105_090307", 1), "job_20260105_090307");
        assert_eq!(suffixed_id("job_20260105_090307", 2), "job_20260105_090307_2");
        assert_eq!(suffixed_id("job_20260105_090307", 10), "job_20260105_090307_10");
    }
}
