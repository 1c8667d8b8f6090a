//! Built-in defaults for the gate configuration

/// Resources registered when no configuration names any, in registration order
pub const DEFAULT_RESOURCES: &[(&str, usize)] = &[
    ("http", 100),
    ("mongo", 50),
    ("ssh", 20),
    ("nmap", 10),
    ("os", 200),
    ("socket", 100),
    ("ping", 20),
    ("tests", 10),
    ("max", 1000),
];

/// Resources whose telemetry is enriched with a running process count
pub const DEFAULT_PROCESS_FAMILIES: &[&str] = &["ssh", "nmap", "ping"];

pub const DEFAULT_LOW_DIVISOR: u32 = 1;
pub const DEFAULT_HIGH_DIVISOR: u32 = 20;

/// Prefix of the per-resource capacity override variables
pub const CAPACITY_ENV_PREFIX: &str = "SEMPOOL_CAPACITY_";

/// Largest capacity a resource may declare; every tier is backed by a tokio
/// semaphore, which cannot hold more permits than this
pub const MAX_CAPACITY: usize = tokio::sync::Semaphore::MAX_PERMITS;
