//! Upload engine configuration parameters.
//!
//! All tunable timing values for the protocol engine. The engine measures
//! time exclusively in caller-driven tick counts (documented cadence:
//! 100 ms), so these are tick budgets, not wall-clock durations.

use serde::{Deserialize, Serialize};

/// Timeout and retry policy shared by every protocol step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Ticks to wait for a reply before re-sending the outstanding RPC.
    /// At the documented 100 ms cadence the default is one second.
    pub timeout_ticks: u16,
    /// Re-sends allowed per protocol step before the step fails.
    /// Total transmissions per step = `max_retries + 1`.
    pub max_retries: u8,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            timeout_ticks: 10,
            max_retries: 3,
        }
    }
}
