//! Notices about finished damage events.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use quarry_common::EntityId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DEFAULT_NOTICE_CAPACITY;
use crate::report::DamageReport;
use crate::source::DamageType;

/// Message published after a damage event finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DamageNotice {
    /// Damage was applied to the target
    Applied(DamageReport),
    /// Event was cancelled before the reducer ran
    Cancelled {
        /// Target that was spared
        target: EntityId,
        /// Damage type of the source
        damage_type: DamageType,
    },
}

impl DamageNotice {
    /// Target of the event.
    #[must_use]
    pub fn target(&self) -> EntityId {
        match self {
            Self::Applied(report) => report.target,
            Self::Cancelled { target, .. } => *target,
        }
    }
}

/// Bounded notice channel. Publishing never blocks.
///
/// The bus is lossy: once `capacity` notices are pending, new ones are
/// dropped until someone drains it. Owners of a long-running pipeline should
/// call [`NoticeBus::drain`] or read from [`NoticeBus::receiver`] regularly.
#[derive(Debug)]
pub struct NoticeBus {
    sender: Sender<DamageNotice>,
    receiver: Receiver<DamageNotice>,
    capacity: usize,
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_CAPACITY)
    }
}

impl NoticeBus {
    /// Creates a new bus with the given capacity, raised to at least 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes a notice. Returns false if it was dropped.
    pub fn publish(&self, notice: DamageNotice) -> bool {
        match self.sender.try_send(notice) {
            Ok(()) => true,
            Err(TrySendError::Full(notice)) => {
                debug!("Notice bus full, dropping notice for {}", notice.target());
                false
            },
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Drains all pending notices.
    pub fn drain(&self) -> Vec<DamageNotice> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending notices.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a receiver handle for consuming notices elsewhere.
    #[must_use]
    pub fn receiver(&self) -> Receiver<DamageNotice> {
        self.receiver.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cancelled() -> DamageNotice {
        DamageNotice::Cancelled {
            target: EntityId::new(),
            damage_type: DamageType::Fall,
        }
    }

    #[test]
    fn test_publish_and_drain() {
        let bus = NoticeBus::new(4);
        let notice = cancelled();

        assert!(bus.publish(notice.clone()));
        assert_eq!(bus.pending_count(), 1);
        assert_eq!(bus.drain(), vec![notice]);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops() {
        let bus = NoticeBus::new(1);
        assert!(bus.publish(cancelled()));
        assert!(!bus.publish(cancelled()));
        assert_eq!(bus.drain().len(), 1);
        assert_eq!(bus.capacity(), 1);
    }

    #[test]
    fn test_zero_capacity_still_holds_one() {
        let bus = NoticeBus::new(0);
        assert_eq!(bus.capacity(), 1);
        assert!(bus.publish(cancelled()));
        assert!(!bus.publish(cancelled()));
        assert_eq!(bus.pending_count(), 1);
    }

    #[test]
    fn test_receiver_handle() {
        let bus = NoticeBus::default();
        let receiver = bus.receiver();
        bus.publish(cancelled());
        assert!(receiver.try_recv().is_ok());
        assert_eq!(bus.pending_count(), 0);
    }
}
