//! # System Constants
//!
//! Event names, default timings and naming conventions shared across the
//! tower.

/// Names under which world events are published
pub mod events {
    pub const PLATFORM_STATUS_UPDATED: &str = "platform.status_updated";
    pub const PIT_STOP_UPDATED: &str = "pit_stop.updated";
    pub const PIT_STOP_LOGGED: &str = "pit_stop.logged";
}

/// Compiled-in configuration defaults
pub mod defaults {
    pub const COMMS_TIMEOUT_MS: u64 = 10_000;
    pub const LANDING_WAIT_MS: u64 = 30_000;
    pub const HALF_MARGIN_MS: u64 = 15_000;
    pub const PLANNING_LEAD_MS: u64 = 10_000;
    pub const EVENT_CHANNEL_CAPACITY: usize = 1000;
}

/// Base name of the configuration files (`tower.toml`, `tower.<env>.toml`)
pub const CONFIG_BASENAME: &str = "tower";

/// Prefix of environment variable overrides (`TOWER__TIMING__LANDING_WAIT_MS`)
pub const ENV_PREFIX: &str = "TOWER";

/// Prefix of per pit stop audit files
pub const PS_LOG_FILE_PREFIX: &str = "PS-";

/// First id handed out to a pit stop
pub const FIRST_PS_ID: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_distinct() {
        let names = [
            events::PLATFORM_STATUS_UPDATED,
            events::PIT_STOP_UPDATED,
            events::PIT_STOP_LOGGED,
        ];
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }
}
