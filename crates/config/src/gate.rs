//! Gate sizing and dispatch policy configuration

use crate::constants::{
    DEFAULT_HIGH_DIVISOR, DEFAULT_LOW_DIVISOR, DEFAULT_PROCESS_FAMILIES, DEFAULT_RESOURCES,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tier a high priority request waits on when both tiers are exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighFallback {
    /// Queue behind low priority requests
    WaitLow,
    /// Queue on the reserve tier
    #[default]
    WaitHigh,
    /// Take whichever tier frees a permit first
    FirstFree,
}

impl fmt::Display for HighFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WaitLow => "wait_low",
            Self::WaitHigh => "wait_high",
            Self::FirstFree => "first_free",
        })
    }
}

impl FromStr for HighFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait_low" | "low" => Ok(Self::WaitLow),
            "wait_high" | "high" => Ok(Self::WaitHigh),
            "first_free" | "any" => Ok(Self::FirstFree),
            _ => Err(s.to_string()),
        }
    }
}

/// Gate sizing and dispatch behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Low tier permits are `round(capacity / low_divisor)`
    #[serde(default = "default_low_divisor")]
    pub low_divisor: u32,
    /// High tier permits are `round(low_permits / high_divisor)`
    #[serde(default = "default_high_divisor")]
    pub high_divisor: u32,
    #[serde(default = "default_process_families")]
    pub process_families: Vec<String>,
    #[serde(default)]
    pub high_fallback: HighFallback,
    #[serde(default = "default_true")]
    pub capture_call_sites: bool,
    /// Discard diagnostics emitted by user callables while they run
    #[serde(default = "default_true")]
    pub suppress_warnings: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            low_divisor: DEFAULT_LOW_DIVISOR,
            high_divisor: DEFAULT_HIGH_DIVISOR,
            process_families: default_process_families(),
            high_fallback: HighFallback::default(),
            capture_call_sites: true,
            suppress_warnings: true,
        }
    }
}

/// A named resource and its total capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub name: String,
    pub capacity: usize,
}

impl ResourceEntry {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

pub(crate) fn default_resources() -> Vec<ResourceEntry> {
    DEFAULT_RESOURCES
        .iter()
        .map(|(name, capacity)| ResourceEntry::new(*name, *capacity))
        .collect()
}

fn default_low_divisor() -> u32 {
    DEFAULT_LOW_DIVISOR
}

fn default_high_divisor() -> u32 {
    DEFAULT_HIGH_DIVISOR
}

fn default_process_families() -> Vec<String> {
    DEFAULT_PROCESS_FAMILIES
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_true() -> bool {
    true
}
