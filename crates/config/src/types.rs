//! Typed team configuration (§3 TeamConfig, §4.9).

use std::collections::HashMap;

use broker_core::workhours::WorkHoursSpec;
use broker_rules::Rule;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// A registered handler bound to a team, a render spec tag, and the
/// kinds it accepts (§3 Hook). Rules reference hooks by id in their
/// `Route` action; `broker-config`'s validator checks that every
/// referenced id resolves here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    pub hook_id: String,
    pub kind_filter: Vec<String>,
    pub rendering_type: String,
    pub owning_team: String,
    /// Whether this hook's downstream tolerates redelivery. Dispatch
    /// timeouts are only retried when this is set (§4.6).
    #[serde(default)]
    pub idempotent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchParams {
    pub max_size: usize,
    pub max_wait_secs: u64,
    pub hard_ceiling_secs: u64,
    pub immediate_urgency_threshold: broker_core::Urgency,
    pub similarity_threshold: u32,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self {
            max_size: 25,
            max_wait_secs: 120,
            hard_ceiling_secs: 900,
            immediate_urgency_threshold: broker_core::Urgency::Critical,
            similarity_threshold: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekendPolicy {
    Defer,
    Allow,
}

/// One immutable, versioned snapshot of a team's full configuration
/// (§3 TeamConfig).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    pub team_id: String,
    pub version: u64,
    pub default_channels: HashMap<String, String>,
    pub work_hours: WorkHoursSpec,
    pub quiet_hours: Option<QuietHours>,
    pub weekend_policy: WeekendPolicy,
    pub batching: BatchParams,
    pub escalation_channel: String,
    pub rules: Vec<Rule>,
    pub hooks: HashMap<String, Hook>,
}

impl TeamConfig {
    pub fn new_empty(team_id: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            version: 1,
            default_channels: HashMap::new(),
            work_hours: WorkHoursSpec::default(),
            quiet_hours: None,
            weekend_policy: WeekendPolicy::Defer,
            batching: BatchParams::default(),
            escalation_channel: "#escalations".to_string(),
            rules: Vec::new(),
            hooks: HashMap::new(),
        }
    }
}
