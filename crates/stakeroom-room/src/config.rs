//! Lifecycle timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timers that bound how long a session may sit in each state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// How long a session may wait for an opponent before it is destroyed.
    pub waiting_timeout: Duration,

    /// Delay between an explicit end and deletion, so final events drain.
    pub finished_grace: Duration,

    /// Same, for sessions finished by a disconnect.
    pub forfeit_grace: Duration,

    /// How long a disconnect from an active session waits before it is
    /// settled. Both sides leaving within it is a draw.
    pub departure_window: Duration,

    /// How often the inactivity sweep runs.
    pub sweep_interval: Duration,

    /// Sessions idle for longer than this are reclaimed by the sweep,
    /// whatever their status.
    pub inactivity_limit: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            waiting_timeout: Duration::from_secs(5 * 60),
            finished_grace: Duration::from_secs(60),
            forfeit_grace: Duration::from_secs(30),
            departure_window: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(10 * 60),
            inactivity_limit: Duration::from_secs(30 * 60),
        }
    }
}
