//! Bridges `broker-batcher`'s crate-local `QuietHoursGate` trait to
//! `broker-config`'s `TeamConfig::quiet_hours` (§4.4 quiet-hours
//! interaction). Grounded on `broker-scheduler::workhours`'s
//! timezone-aware interval arithmetic, applied to a single daily
//! window instead of a weekly schedule.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use broker_batcher::QuietHoursGate;
use broker_config::{ConfigLoader, QuietHours};
use broker_core::workhours::WorkHoursSpec;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolves a channel's owning team on demand, since the batcher only
/// ever sees a bare channel string. The pipeline registers the
/// mapping the first time it routes a decision to a channel.
pub struct ConfigQuietHoursGate {
    config: Arc<ConfigLoader>,
    channel_teams: RwLock<HashMap<String, String>>,
}

impl ConfigQuietHoursGate {
    pub fn new(config: Arc<ConfigLoader>) -> Self {
        Self {
            config,
            channel_teams: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, channel: &str, team_id: &str) {
        self.channel_teams
            .write()
            .expect("channel_teams lock poisoned")
            .entry(channel.to_string())
            .or_insert_with(|| team_id.to_string());
    }
}

impl QuietHoursGate for ConfigQuietHoursGate {
    fn quiet_until(&self, channel: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let team_id = self
            .channel_teams
            .read()
            .expect("channel_teams lock poisoned")
            .get(channel)
            .cloned()?;
        let config = self.config.load(&team_id).ok()?;
        let quiet = config.quiet_hours.as_ref()?;
        quiet_window_end(quiet, &config.work_hours, now)
    }
}

/// `Arc`-sharing handle so the same registry instance can be both the
/// `SmartBatcher`'s boxed `QuietHoursGate` and the `Pipeline`'s
/// registration target; `QuietHoursGate` can't be implemented directly
/// on `Arc<ConfigQuietHoursGate>` since neither type is local to this
/// crate's orphan-rule scope once wrapped.
#[derive(Clone)]
pub struct SharedQuietGate(pub Arc<ConfigQuietHoursGate>);

impl QuietHoursGate for SharedQuietGate {
    fn quiet_until(&self, channel: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.0.quiet_until(channel, now)
    }
}

/// `Some(end)` if `now` falls within the team's daily quiet window,
/// localized to the team's configured timezone. Handles windows that
/// span midnight (`start > end`).
fn quiet_window_end(quiet: &QuietHours, spec: &WorkHoursSpec, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let tz = Tz::from_str(&spec.timezone).unwrap_or(Tz::UTC);
    let local = now.with_timezone(&tz);
    let time = local.time();

    let spans_midnight = quiet.start > quiet.end;
    let in_window = if spans_midnight {
        time >= quiet.start || time < quiet.end
    } else {
        time >= quiet.start && time < quiet.end
    };
    if !in_window {
        return None;
    }

    let end_date: NaiveDate = if spans_midnight && time >= quiet.start {
        local.date_naive().succ_opt().unwrap_or_else(|| local.date_naive())
    } else {
        local.date_naive()
    };

    let candidate_local = end_date.and_time(quiet.end);
    tz.from_local_datetime(&candidate_local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn spec() -> WorkHoursSpec {
        WorkHoursSpec {
            timezone: "UTC".to_string(),
            weekly: Default::default(),
            holidays: Vec::new(),
            pto: Vec::new(),
            urgent_bypass: true,
        }
    }

    #[test]
    fn outside_quiet_window_returns_none() {
        let quiet = QuietHours {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
        };
        let noon = Utc.with_ymd_and_hms(2026, 8, 3, 12, 0, 0).unwrap();
        assert!(quiet_window_end(&quiet, &spec(), noon).is_none());
    }

    #[test]
    fn overnight_window_resolves_to_next_day_end() {
        let quiet = QuietHours {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
        };
        let late_night = Utc.with_ymd_and_hms(2026, 8, 3, 23, 0, 0).unwrap();
        let end = quiet_window_end(&quiet, &spec(), late_night).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 8, 4, 7, 0, 0).unwrap());
    }

    #[test]
    fn same_day_window_resolves_to_todays_end() {
        let quiet = QuietHours {
            start: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        };
        let lunch = Utc.with_ymd_and_hms(2026, 8, 3, 12, 30, 0).unwrap();
        let end = quiet_window_end(&quiet, &spec(), lunch).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 8, 3, 13, 0, 0).unwrap());
    }
}
