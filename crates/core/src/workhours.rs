//! Work-hours data model shared between team configuration
//! (`broker-config`) and the scheduler (`broker-scheduler`, §4.5).

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// One open interval within a working day, in local wall-clock time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Per-recipient (user or team channel) work-hours specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkHoursSpec {
    /// IANA timezone name, e.g. `"Europe/Berlin"`.
    pub timezone: String,
    /// Working intervals by weekday. A day absent from this map has no
    /// working hours (treated as a weekend/off day).
    pub weekly: HashMap<Weekday, Vec<TimeInterval>>,
    pub holidays: Vec<NaiveDate>,
    /// PTO ranges as `(start, end)` in UTC.
    pub pto: Vec<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)>,
    /// When set, critical-urgency decisions bypass work-hours gating
    /// entirely for this recipient (§4.5).
    pub urgent_bypass: bool,
}

impl Default for WorkHoursSpec {
    fn default() -> Self {
        let business_hours = vec![TimeInterval {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        }];
        let mut weekly = HashMap::new();
        for day in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ] {
            weekly.insert(day, business_hours.clone());
        }
        Self {
            timezone: "UTC".to_string(),
            weekly,
            holidays: Vec::new(),
            pto: Vec::new(),
            urgent_bypass: true,
        }
    }
}
