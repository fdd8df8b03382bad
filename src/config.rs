//! Configuration types.

use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default coverage radius when the user doesn't give one.
    pub default_radius_km: f64,
    /// Minimum retained localities for a region group to survive resolution.
    pub min_region_members: usize,
    /// Maximum clarification rounds for ServiceDiscovery before forcing completion.
    pub service_round_cap: u32,
    /// Maximum clarification rounds for ServiceArea before forcing completion.
    pub area_round_cap: u32,
    /// Per-call timeout for the licensing enrichment service.
    pub licensing_timeout: Duration,
    /// Per-call timeout for the web-presence enrichment service.
    pub web_timeout: Duration,
    /// Per-call timeout for registry detail fetches during enrichment.
    pub registry_timeout: Duration,
    /// How many identity candidates to offer at most.
    pub max_candidates: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_radius_km: 20.0,
            min_region_members: 3,
            service_round_cap: 3,
            area_round_cap: 3,
            licensing_timeout: Duration::from_secs(8),
            web_timeout: Duration::from_secs(5),
            registry_timeout: Duration::from_secs(8),
            max_candidates: 5,
        }
    }
}

impl EngineConfig {
    /// Build configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_radius_km: env_f64("ONBOARD_RADIUS_KM", defaults.default_radius_km),
            min_region_members: env_usize("ONBOARD_MIN_REGION_MEMBERS", defaults.min_region_members),
            service_round_cap: env_u32("ONBOARD_SERVICE_ROUND_CAP", defaults.service_round_cap),
            area_round_cap: env_u32("ONBOARD_AREA_ROUND_CAP", defaults.area_round_cap),
            licensing_timeout: env_secs("ONBOARD_LICENSING_TIMEOUT_SECS", defaults.licensing_timeout),
            web_timeout: env_secs("ONBOARD_WEB_TIMEOUT_SECS", defaults.web_timeout),
            registry_timeout: env_secs("ONBOARD_REGISTRY_TIMEOUT_SECS", defaults.registry_timeout),
            max_candidates: env_usize("ONBOARD_MAX_CANDIDATES", defaults.max_candidates),
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
