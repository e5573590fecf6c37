//! Per-Owner Power Client
//!
//! Each scene-owning entity (a connector's commit path, the write-back
//! path) holds one client. The client tracks which partitions the owner
//! holds and exposes a visible on/off status tied to the lowest
//! partition, independent of other holders' refcounts.

use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::manager::{PowerManager, PowerPolicy};
use crate::partition::{PartitionId, PartitionMask};
use crate::PowerError;

/// Per-owner wrapper over the power manager.
pub struct PowerClient {
    held: Mutex<PartitionMask>,
    on: AtomicBool,
    policy: PowerPolicy,
}

impl PowerClient {
    /// Create a client with its scene-derived policy tag.
    pub fn new(policy: PowerPolicy) -> Self {
        Self {
            held: Mutex::new(PartitionMask::EMPTY),
            on: AtomicBool::new(false),
            policy,
        }
    }

    /// Acquire `mask` on behalf of this owner.
    ///
    /// Flips the visible status to on exactly when the mask brings in the
    /// lowest partition.
    pub fn enable(&self, mgr: &PowerManager, mask: PartitionMask) -> Result<(), PowerError> {
        mgr.get(mask, self.policy)?;
        let mut held = self.held.lock();
        *held = held.union(mask);
        if mask.contains(PartitionId::LOWEST) {
            self.on.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Release `mask` on behalf of this owner.
    ///
    /// Flips the visible status to off exactly when the mask drops the
    /// lowest partition.
    pub fn disable(&self, mgr: &PowerManager, mask: PartitionMask) {
        mgr.put(mask);
        let mut held = self.held.lock();
        *held = PartitionMask::from_bits(held.bits() & !mask.bits());
        if mask.contains(PartitionId::LOWEST) {
            self.on.store(false, Ordering::Release);
        }
    }

    /// Whether the owning scene is visibly powered.
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Acquire)
    }

    /// Partitions currently held by this owner.
    pub fn held(&self) -> PartitionMask {
        *self.held.lock()
    }

    /// The client's policy tag.
    pub fn policy(&self) -> PowerPolicy {
        self.policy
    }
}
