//! Priority classes and gate tiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Priority requested by a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Served from the low tier only
    #[default]
    Low,
    /// Served from the low tier when it has room, otherwise from the high reserve
    High,
}

/// One of the two semaphores that make up a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Bulk of the resource capacity
    Low,
    /// Small reserve reachable only by high priority requests
    High,
}

impl Priority {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

impl Tier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a priority or tier name cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "high" => Ok(Self::High),
            _ => Err(ParseEnumError {
                kind: "priority",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Tier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "high" => Ok(Self::High),
            _ => Err(ParseEnumError {
                kind: "tier",
                value: s.to_string(),
            }),
        }
    }
}

/// Permit counts of the two tiers of a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPermits {
    pub low: usize,
    pub high: usize,
}

impl TierPermits {
    /// Permits of a single tier
    #[must_use]
    pub fn get(&self, tier: Tier) -> usize {
        match tier {
            Tier::Low => self.low,
            Tier::High => self.high,
        }
    }

    /// Upper bound on concurrent holders of the gate
    #[must_use]
    pub fn total(&self) -> usize {
        self.low + self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_priority_case_insensitive() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("low".parse::<Priority>().unwrap(), Priority::Low);
        let err = "urgent".parse::<Priority>().unwrap_err();
        assert_eq!(err.to_string(), "invalid priority: urgent");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Tier::High).unwrap();
        assert_eq!(json, r#""high""#);
        let prio: Priority = serde_json::from_str(r#""low""#).unwrap();
        assert_eq!(prio, Priority::Low);
    }

    #[test]
    fn test_tier_permits_total() {
        let permits = TierPermits { low: 19, high: 1 };
        assert_eq!(permits.total(), 20);
        assert_eq!(permits.get(Tier::High), 1);
    }
}
