//! Work-hours arithmetic over `broker_core::workhours::WorkHoursSpec`
//! (§4.5): membership test and `next_work_instant` search.

use std::str::FromStr;

use broker_core::workhours::WorkHoursSpec;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use chrono_tz::Tz;

/// How many calendar days ahead to search before giving up. A
/// recipient whose schedule has no working day within two weeks is
/// almost certainly misconfigured.
const MAX_SEARCH_DAYS: i64 = 14;

fn resolve_tz(spec: &WorkHoursSpec) -> Tz {
    Tz::from_str(&spec.timezone).unwrap_or(Tz::UTC)
}

fn in_pto(spec: &WorkHoursSpec, instant: DateTime<Utc>) -> bool {
    spec.pto.iter().any(|(start, end)| instant >= *start && instant < *end)
}

/// Whether `now` falls inside a configured working interval for this
/// recipient, honouring timezone, weekday, holidays, and PTO.
pub fn is_within_work_hours(spec: &WorkHoursSpec, now: DateTime<Utc>) -> bool {
    if in_pto(spec, now) {
        return false;
    }
    let tz = resolve_tz(spec);
    let local = now.with_timezone(&tz);
    let date = local.date_naive();
    if spec.holidays.contains(&date) {
        return false;
    }
    let Some(intervals) = spec.weekly.get(&local.weekday()) else {
        return false;
    };
    let time = local.time();
    intervals.iter().any(|interval| time >= interval.start && time < interval.end)
}

/// Earliest UTC instant at or after `now` that falls within work
/// hours for this recipient. Falls back to `now` if no working window
/// is found within `MAX_SEARCH_DAYS` (a misconfigured recipient should
/// never block delivery indefinitely).
pub fn next_work_instant(spec: &WorkHoursSpec, now: DateTime<Utc>) -> DateTime<Utc> {
    let tz = resolve_tz(spec);
    let mut cursor_date = now.with_timezone(&tz).date_naive();

    for _ in 0..=MAX_SEARCH_DAYS {
        if !spec.holidays.contains(&cursor_date) {
            if let Some(intervals) = spec.weekly.get(&cursor_date.weekday()) {
                let mut sorted = intervals.clone();
                sorted.sort_by_key(|i| i.start);
                for interval in sorted {
                    let candidate_local = cursor_date.and_time(interval.start);
                    let Some(candidate_utc) = tz
                        .from_local_datetime(&candidate_local)
                        .single()
                        .map(|dt| dt.with_timezone(&Utc))
                    else {
                        continue;
                    };
                    if candidate_utc < now {
                        continue;
                    }
                    if in_pto(spec, candidate_utc) {
                        continue;
                    }
                    return candidate_utc;
                }
            }
        }
        cursor_date = cursor_date.succ_opt().unwrap_or(cursor_date);
    }

    now
}

/// A small jitter subtracted from `next_work_instant` so recipients in
/// the same timezone don't all receive digests at the exact same
/// millisecond (§4.5: "for that instant minus a small jitter").
pub fn with_jitter(instant: DateTime<Utc>, seed: u64) -> DateTime<Utc> {
    let jitter_secs = (seed % 30) as i64;
    instant - Duration::seconds(jitter_secs)
}
