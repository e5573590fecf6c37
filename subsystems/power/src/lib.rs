//! # Prism Power
//!
//! Reference-counted power partition manager for the Prism display
//! pipeline.
//!
//! The pipeline's power-gateable domains ("partitions") form a fixed
//! dependency chain. This crate sequences regulator and clock bring-up in
//! dependency order, refcounts every partition, runs one-time hardware
//! init/teardown hooks on the edge transitions, and exposes a global
//! suspend gate. Per-owner visibility is modeled by [`PowerClient`].
//!
//! ## Modules
//!
//! - [`partition`] - Partition ids, typed bit-sets and topology rows
//! - [`manager`] - The sequencing manager (get/put, callbacks, suspend)
//! - [`client`] - Per-owner wrapper with a visible on/off status

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod client;
pub mod manager;
pub mod partition;

pub use client::PowerClient;
pub use manager::{PowerManager, PowerOffCallback, PowerPolicy};
pub use partition::{PartitionDesc, PartitionId, PartitionMask, PartitionOps, MAX_PARTITIONS};

use core::fmt;

/// Errors from power sequencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerError {
    /// New `get` calls are refused while suspended.
    Suspended,
    /// A regulator or clock refused to come up; the sequence aborted in
    /// place and earlier side effects were kept.
    EnableFailed(PartitionId),
    /// A power-off callback is already registered for this partition.
    CallbackExists(PartitionId),
    /// No callback registered for this partition.
    NoCallback(PartitionId),
    /// Partition id outside the constructed topology.
    BadPartition(PartitionId),
}

impl fmt::Display for PowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerError::Suspended => write!(f, "power manager is suspended"),
            PowerError::EnableFailed(id) => write!(f, "partition {} enable failed", id.index()),
            PowerError::CallbackExists(id) => {
                write!(f, "partition {} already has a power-off callback", id.index())
            }
            PowerError::NoCallback(id) => {
                write!(f, "partition {} has no power-off callback", id.index())
            }
            PowerError::BadPartition(id) => write!(f, "unknown partition {}", id.index()),
        }
    }
}
