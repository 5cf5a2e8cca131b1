//! Engine configuration.

/// Tunable parameters of the lifecycle engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long after resolution an incident may still be reopened, in
    /// hours.
    pub reopen_window_hours: i64,

    /// Fraction of the resolution window that counts as "at risk"
    /// (0.20 = the final fifth before the deadline).
    pub at_risk_fraction: f64,

    /// Maximum trackings the escalation sweep examines per batch.
    pub sweep_batch_size: i64,

    /// How often the escalation sweep polls, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reopen_window_hours: 72,
            at_risk_fraction: 0.20,
            sweep_batch_size: 100,
            sweep_interval_secs: 60,
        }
    }
}
