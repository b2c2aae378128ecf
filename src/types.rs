use serde::{Deserialize, Serialize};

/// Speed class of a registered store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// Hot tier: short-lived, most frequently read data
    Hot,
    /// Warm tier: recent data
    #[default]
    Warm,
    /// Cold tier: rarely read snapshots
    Cold,
}

impl CacheTier {
    /// Higher = faster tier
    pub fn priority(&self) -> u8 {
        match self {
            CacheTier::Hot => 3,
            CacheTier::Warm => 2,
            CacheTier::Cold => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Hot => "hot",
            CacheTier::Warm => "warm",
            CacheTier::Cold => "cold",
        }
    }
}

/// Coordinator-facing, normalized metrics of one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    /// Percentage, 0..=100
    pub hit_rate: f64,
    /// Percentage, 0..=100
    pub miss_rate: f64,
    /// Average access latency in milliseconds
    pub response_time: f64,
    /// Estimated memory footprint in MB
    pub memory_usage: f64,
    pub entry_count: u64,
    pub request_count: u64,
    pub invalidation_count: u64,
    pub error_count: u64,
    /// Equal to `hit_rate`
    pub efficiency: f64,
}

impl SystemMetrics {
    /// Metrics reported for a store that could not be read
    pub fn zeroed() -> Self {
        Self::default()
    }

    pub fn is_zeroed(&self) -> bool {
        *self == Self::default()
    }
}

/// Health classification used by store health reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }

    /// The more severe of the two
    pub fn worst(self, other: HealthStatus) -> HealthStatus {
        self.max(other)
    }
}
