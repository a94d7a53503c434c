//! The pending-send table and the seen-id set.

use std::collections::HashSet;

use parley_protocol::MessageId;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::{AckPolicy, RetryConfig};
use crate::error::DeliveryError;

/// A sent message awaiting its CONFIRM.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub id: MessageId,
    /// Exact bytes that went on the wire; resent verbatim.
    pub bytes: Vec<u8>,
    pub last_sent_at: Instant,
    pub retries_remaining: u8,
    /// Set by the first acknowledgment under [`AckPolicy::SettleOnSecond`].
    pub acknowledged: bool,
}

/// A frame the caller must put back on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retransmit {
    pub id: MessageId,
    pub bytes: Vec<u8>,
    /// 1 for the first resend, 2 for the second, and so on.
    pub attempt: u8,
}

/// Outcome of [`ReliabilityEngine::acknowledge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgment {
    /// The entry is gone.
    Settled,
    /// First of two acknowledgments; the entry is kept but never resent.
    Marked,
    /// No entry with that id.
    Unknown,
}

/// At-least-once delivery with duplicate suppression over datagrams.
///
/// Owns the outbound pending table and the inbound seen-id set. Performs
/// no I/O: the caller transmits, then records the send with
/// [`track`](Self::track), and periodically calls [`tick`](Self::tick)
/// to learn what must be resent.
#[derive(Debug)]
pub struct ReliabilityEngine {
    config: RetryConfig,
    policy: AckPolicy,
    pending: Vec<PendingSend>,
    seen: HashSet<MessageId>,
}

impl ReliabilityEngine {
    pub fn new(config: RetryConfig, policy: AckPolicy) -> Self {
        Self {
            config,
            policy,
            pending: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn policy(&self) -> AckPolicy {
        self.policy
    }

    /// Records a message that was just transmitted.
    ///
    /// Ids are unique among live entries. Tracking an id that is still
    /// pending (possible only after the 16-bit counter wraps) replaces
    /// the old entry.
    pub fn track(&mut self, id: MessageId, bytes: Vec<u8>, now: Instant) {
        self.prune_acknowledged(now);
        let entry = PendingSend {
            id,
            bytes,
            last_sent_at: now,
            retries_remaining: self.config.max_retries,
            acknowledged: false,
        };
        if let Some(slot) = self.pending.iter_mut().find(|p| p.id == id) {
            warn!(%id, "id reused while still pending, replacing entry");
            *slot = entry;
        } else {
            trace!(%id, "tracking");
            self.pending.push(entry);
        }
    }

    /// Applies an acknowledgment for `ref_id` according to the policy.
    pub fn acknowledge(&mut self, ref_id: MessageId) -> Acknowledgment {
        let Some(index) = self.pending.iter().position(|p| p.id == ref_id) else {
            trace!(%ref_id, "acknowledgment for unknown id");
            return Acknowledgment::Unknown;
        };

        match self.policy {
            AckPolicy::SettleOnSecond if !self.pending[index].acknowledged => {
                self.pending[index].acknowledged = true;
                debug!(%ref_id, "acknowledged, awaiting settle");
                Acknowledgment::Marked
            }
            _ => {
                self.pending.remove(index);
                debug!(%ref_id, "settled");
                Acknowledgment::Settled
            }
        }
    }

    /// Collects the frames that have gone a full interval without an
    /// acknowledgment.
    ///
    /// An entry with no retries left is dropped and reported as
    /// [`DeliveryError::Exhausted`]; the session cannot continue.
    pub fn tick(&mut self, now: Instant) -> Result<Vec<Retransmit>, DeliveryError> {
        self.prune_acknowledged(now);
        let interval = self.config.interval;
        let max_retries = self.config.max_retries;
        let mut resend = Vec::new();
        let mut exhausted = None;

        for entry in self.pending.iter_mut().filter(|p| !p.acknowledged) {
            if now.saturating_duration_since(entry.last_sent_at) < interval {
                continue;
            }
            if entry.retries_remaining == 0 {
                exhausted = Some(entry.id);
                break;
            }
            entry.retries_remaining -= 1;
            entry.last_sent_at = now;
            let attempt = max_retries - entry.retries_remaining;
            debug!(id = %entry.id, attempt, "retransmitting");
            resend.push(Retransmit {
                id: entry.id,
                bytes: entry.bytes.clone(),
                attempt,
            });
        }

        if let Some(id) = exhausted {
            self.pending.retain(|p| p.id != id);
            warn!(%id, retries = max_retries, "delivery failed");
            return Err(DeliveryError::Exhausted {
                id,
                retries: max_retries,
            });
        }

        Ok(resend)
    }

    /// Drops marked entries whose settling acknowledgment is overdue.
    ///
    /// A request that only ever gets its CONFIRM would otherwise stay in
    /// the table for the rest of the session. The cutoff is
    /// [`RetryConfig::give_up_after`], measured from the last transmission.
    fn prune_acknowledged(&mut self, now: Instant) {
        let cutoff = self.config.give_up_after();
        self.pending.retain(|p| {
            let keep = !p.acknowledged || now.saturating_duration_since(p.last_sent_at) < cutoff;
            if !keep {
                trace!(id = %p.id, "settling acknowledgment never came, forgetting");
            }
            keep
        });
    }

    /// When the earliest unacknowledged entry becomes due for [`tick`](Self::tick).
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .iter()
            .filter(|p| !p.acknowledged)
            .map(|p| p.last_sent_at + self.config.interval)
            .min()
    }

    /// Records an inbound id. Returns `true` if it was seen before.
    pub fn dedup(&mut self, id: MessageId) -> bool {
        let duplicate = !self.seen.insert(id);
        if duplicate {
            warn!(%id, "duplicate message suppressed");
        }
        duplicate
    }

    /// Whether `id` is still awaiting its first acknowledgment.
    pub fn is_pending(&self, id: MessageId) -> bool {
        self.pending.iter().any(|p| p.id == id && !p.acknowledged)
    }

    /// Whether anything still needs the retransmission timer.
    pub fn has_pending(&self) -> bool {
        self.pending.iter().any(|p| !p.acknowledged)
    }

    /// Live entries, including those waiting for a settling acknowledgment.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
