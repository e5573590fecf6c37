//! Partition Identities and Masks
//!
//! Typed bit-sets over partition indices. The mask type replaces the raw
//! bitmask-as-set idiom with named accessors while keeping O(1)
//! membership and union.

use alloc::boxed::Box;
use core::fmt;

use prism_hal::power::{PartitionClock, Regulator};
use static_assertions::const_assert;

/// Capacity of [`PartitionMask`]; topologies may use fewer.
pub const MAX_PARTITIONS: usize = 8;

const_assert!(MAX_PARTITIONS <= u32::BITS as usize);

// =============================================================================
// Partition Id
// =============================================================================

/// Index of one power-gateable partition.
///
/// Index order is topological: a partition may only depend on partitions
/// with lower indices. Partition 0 is the lowest domain and additionally
/// carries the shared-domain rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId(u8);

impl PartitionId {
    /// Create a partition id.
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// The lowest partition, owner of the shared-domain rail.
    pub const LOWEST: Self = Self(0);

    /// Raw index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// Partition Mask
// =============================================================================

/// Fixed-capacity set of partitions.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct PartitionMask(u32);

impl PartitionMask {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Set containing a single partition.
    #[inline]
    pub const fn single(id: PartitionId) -> Self {
        Self(1 << id.0)
    }

    /// Set containing partitions `0..count`.
    #[inline]
    pub const fn first(count: usize) -> Self {
        if count == 0 {
            Self(0)
        } else {
            Self((1u32 << count) - 1)
        }
    }

    /// Build from a raw bit word.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & ((1 << MAX_PARTITIONS) - 1))
    }

    /// Raw bit word.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Membership test.
    #[inline]
    pub const fn contains(self, id: PartitionId) -> bool {
        self.0 & (1 << id.0) != 0
    }

    /// Set with `id` added.
    #[inline]
    #[must_use]
    pub const fn with(self, id: PartitionId) -> Self {
        Self(self.0 | (1 << id.0))
    }

    /// Set with `id` removed.
    #[inline]
    #[must_use]
    pub const fn without(self, id: PartitionId) -> Self {
        Self(self.0 & !(1 << id.0))
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True if the sets share any partition.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True if the set is empty.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of partitions in the set.
    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate members in ascending index order.
    pub fn iter_ascending(self) -> impl Iterator<Item = PartitionId> {
        (0..MAX_PARTITIONS as u8)
            .filter(move |i| self.0 & (1 << i) != 0)
            .map(PartitionId::new)
    }

    /// Iterate members in descending index order.
    pub fn iter_descending(self) -> impl Iterator<Item = PartitionId> {
        (0..MAX_PARTITIONS as u8)
            .rev()
            .filter(move |i| self.0 & (1 << i) != 0)
            .map(PartitionId::new)
    }
}

impl fmt::Debug for PartitionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartitionMask({:#010b})", self.0)
    }
}

// =============================================================================
// Topology
// =============================================================================

/// One-time init and teardown hooks run on partition edge transitions.
///
/// `hw_init` runs once per 0→1 refcount transition, after the rail is up;
/// `teardown` runs once per 1→0 transition, before the rail drops.
pub trait PartitionOps: Send + Sync {
    /// Hardware init after the partition powers on.
    fn hw_init(&self, id: PartitionId);

    /// Teardown before the partition powers off.
    fn teardown(&self, id: PartitionId);
}

/// Fixed topology row describing one partition.
///
/// `depends_on` is the precomputed transitive dependency closure and may
/// only name lower indices; the manager iterates it instead of recursing.
pub struct PartitionDesc {
    /// Partition this row describes.
    pub id: PartitionId,
    /// Transitive closure of the partitions this one needs powered.
    pub depends_on: PartitionMask,
    /// The partition's power rail.
    pub regulator: Box<dyn Regulator>,
    /// The partition's functional clock.
    pub clock: Box<dyn PartitionClock>,
}

impl PartitionDesc {
    /// True if the dependency closure only names lower indices.
    pub fn deps_are_topological(&self) -> bool {
        self.depends_on
            .iter_ascending()
            .all(|dep| dep.index() < self.id.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_membership() {
        let m = PartitionMask::EMPTY
            .with(PartitionId::new(0))
            .with(PartitionId::new(2));
        assert!(m.contains(PartitionId::new(0)));
        assert!(!m.contains(PartitionId::new(1)));
        assert!(m.contains(PartitionId::new(2)));
        assert_eq!(m.count(), 2);
    }

    #[test]
    fn test_mask_first() {
        assert_eq!(PartitionMask::first(3).bits(), 0b111);
        assert!(PartitionMask::first(0).is_empty());
    }

    #[test]
    fn test_mask_iteration_order() {
        let m = PartitionMask::from_bits(0b1011);
        let up: alloc::vec::Vec<usize> = m.iter_ascending().map(|p| p.index()).collect();
        let down: alloc::vec::Vec<usize> = m.iter_descending().map(|p| p.index()).collect();
        assert_eq!(up, [0, 1, 3]);
        assert_eq!(down, [3, 1, 0]);
    }

    #[test]
    fn test_mask_union_intersects() {
        let a = PartitionMask::from_bits(0b0011);
        let b = PartitionMask::from_bits(0b0110);
        assert_eq!(a.union(b).bits(), 0b0111);
        assert!(a.intersects(b));
        assert!(!a.intersects(PartitionMask::from_bits(0b1000)));
    }
}
