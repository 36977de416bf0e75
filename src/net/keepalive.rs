//! Keepalive policy: how long a served connection may live.
//!
//! Translates the three configured durations into per-connection limits.
//! A zero duration leaves that dimension unbounded; it never turns into a
//! zero-length limit.

use std::time::Duration;

use rand::Rng;

use crate::config::KeepaliveConfig;

/// Max-age jitter, as a fraction of the configured age (+/- 10%).
const AGE_JITTER: f64 = 0.1;

/// Effective enforcement rules for served connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepalivePolicy {
    /// Close after this long without outstanding RPCs.
    pub max_idle: Option<Duration>,
    /// Close once the connection is this old, active or not.
    pub max_age: Option<Duration>,
    /// Drain allowance after a close has been announced.
    pub max_age_grace: Option<Duration>,
}

impl KeepalivePolicy {
    /// Build the policy from configuration. Pure transform, never fails.
    pub fn from_config(config: &KeepaliveConfig) -> Self {
        Self {
            max_idle: non_zero(config.max_connection_idle),
            max_age: non_zero(config.max_connection_age),
            max_age_grace: non_zero(config.max_connection_age_grace),
        }
    }

    /// True when no connection can ever be closed by this policy.
    pub fn is_unbounded(&self) -> bool {
        self.max_idle.is_none() && self.max_age.is_none()
    }

    /// Max age for one connection, jittered so connections opened together
    /// are not all recycled at the same instant.
    pub fn age_deadline(&self) -> Option<Duration> {
        self.max_age.map(|age| {
            let factor = rand::thread_rng().gen_range((1.0 - AGE_JITTER)..=(1.0 + AGE_JITTER));
            age.mul_f64(factor)
        })
    }
}

impl From<&KeepaliveConfig> for KeepalivePolicy {
    fn from(config: &KeepaliveConfig) -> Self {
        Self::from_config(config)
    }
}

fn non_zero(value: Duration) -> Option<Duration> {
    (!value.is_zero()).then_some(value)
}
