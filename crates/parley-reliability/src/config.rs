//! Retry configuration and acknowledgment policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RetryConfig
// ---------------------------------------------------------------------------

/// How long to wait for a CONFIRM and how often to resend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Time a message may stay unconfirmed before it is resent.
    pub interval: Duration,

    /// Resends allowed after the initial transmission.
    pub max_retries: u8,
}

impl RetryConfig {
    /// Default retransmission interval in milliseconds.
    pub const DEFAULT_INTERVAL_MS: u16 = 250;
    /// Default retransmission interval.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(Self::DEFAULT_INTERVAL_MS as u64);
    /// Default number of retransmissions.
    pub const DEFAULT_RETRIES: u8 = 3;

    /// Builds a config from the command-line units: milliseconds and count.
    pub fn from_millis(interval_ms: u16, max_retries: u8) -> Self {
        Self {
            interval: Duration::from_millis(u64::from(interval_ms)),
            max_retries,
        }
    }

    /// Upper bound on how long a single message can stay in flight
    /// before delivery is declared failed. Also how long a marked entry
    /// waits for its settling acknowledgment.
    pub fn give_up_after(&self) -> Duration {
        self.interval * (u32::from(self.max_retries) + 1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            max_retries: Self::DEFAULT_RETRIES,
        }
    }
}

// ---------------------------------------------------------------------------
// AckPolicy
// ---------------------------------------------------------------------------

/// When an acknowledged message stops being tracked.
///
/// ```text
/// RemoveOnFirst:   [pending] ──ack──▶ (removed)
/// SettleOnSecond:  [pending] ──ack──▶ [acknowledged] ──ack──▶ (removed)
/// ```
///
/// Acknowledged entries are never resent under either policy. Under
/// `SettleOnSecond` a marked entry that never gets its second
/// acknowledgment is forgotten once [`RetryConfig::give_up_after`] has
/// passed since it was last sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AckPolicy {
    /// Forget a message as soon as anything acknowledges it.
    #[default]
    RemoveOnFirst,

    /// Keep the entry after the first acknowledgment and remove it on the
    /// second, so that a CONFIRM followed by a REPLY for the same request
    /// both match. Compatible with servers tuned for the legacy client.
    SettleOnSecond,
}

impl std::fmt::Display for AckPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoveOnFirst => write!(f, "RemoveOnFirst"),
            Self::SettleOnSecond => write!(f, "SettleOnSecond"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.interval, Duration::from_millis(250));
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(AckPolicy::default(), AckPolicy::RemoveOnFirst);
    }

    #[test]
    fn test_from_millis() {
        let cfg = RetryConfig::from_millis(100, 0);
        assert_eq!(cfg.interval, Duration::from_millis(100));
        assert_eq!(cfg.max_retries, 0);
    }

    #[test]
    fn test_give_up_after_covers_every_attempt() {
        assert_eq!(
            RetryConfig::default().give_up_after(),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_config_serde_round_trip() {
        let cfg = RetryConfig::from_millis(500, 7);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: RetryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);

        let json = serde_json::to_string(&AckPolicy::SettleOnSecond).unwrap();
        assert_eq!(json, "\"SettleOnSecond\"");
    }
}
