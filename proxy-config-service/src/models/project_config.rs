//! Config model - a named rate-limit policy under a project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::HeaderReplacementSummary;

/// Period unit of a rate-limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitPeriod {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
    Forever,
}

impl LimitPeriod {
    pub const ALL: [LimitPeriod; 8] = [
        LimitPeriod::Second,
        LimitPeriod::Minute,
        LimitPeriod::Hour,
        LimitPeriod::Day,
        LimitPeriod::Week,
        LimitPeriod::Month,
        LimitPeriod::Year,
        LimitPeriod::Forever,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitPeriod::Second => "second",
            LimitPeriod::Minute => "minute",
            LimitPeriod::Hour => "hour",
            LimitPeriod::Day => "day",
            LimitPeriod::Week => "week",
            LimitPeriod::Month => "month",
            LimitPeriod::Year => "year",
            LimitPeriod::Forever => "forever",
        }
    }
}

impl std::fmt::Display for LimitPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LimitPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LimitPeriod::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Invalid limit period: {}", s))
    }
}

/// Stored policy parameters; enforcement is the proxy's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitPolicy {
    pub requests: i64,
    pub period: LimitPeriod,
}

/// Config entity.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub policy: RateLimitPolicy,
    pub created_utc: DateTime<Utc>,
}

impl ProjectConfig {
    pub fn new(project_id: Uuid, name: String, policy: RateLimitPolicy) -> Self {
        Self {
            config_id: Uuid::new_v4(),
            project_id,
            name,
            policy,
            created_utc: Utc::now(),
        }
    }

    pub fn belongs_to(&self, project_id: Uuid) -> bool {
        self.project_id == project_id
    }
}

/// Config summary; header values are never part of it.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigResponse {
    pub config_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub limit_requests_count: i64,
    pub limit_period: LimitPeriod,
    pub created_utc: DateTime<Utc>,
    pub headers: Vec<HeaderReplacementSummary>,
}

impl ConfigResponse {
    pub fn new(config: ProjectConfig, headers: Vec<HeaderReplacementSummary>) -> Self {
        Self {
            config_id: config.config_id,
            project_id: config.project_id,
            name: config.name,
            limit_requests_count: config.policy.requests,
            limit_period: config.policy.period,
            created_utc: config.created_utc,
            headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn period_parses_every_unit() {
        for period in LimitPeriod::ALL {
            assert_eq!(LimitPeriod::from_str(period.as_str()), Ok(period));
        }
    }

    #[test]
    fn period_rejects_unknown_and_mixed_case() {
        assert!(LimitPeriod::from_str("fortnight").is_err());
        assert!(LimitPeriod::from_str("Hour").is_err());
        assert!(LimitPeriod::from_str("").is_err());
    }

    #[test]
    fn period_serializes_lowercase() {
        let json = serde_json::to_string(&LimitPeriod::Forever).unwrap();
        assert_eq!(json, "\"forever\"");
    }
}
