//! # Prism Recovery
//!
//! Exception detection and recovery for the Prism display pipeline.
//!
//! Two detection paths feed this controller. Per-channel debug interrupts
//! capture a register snapshot and defer decoding to a depth-1 work item
//! per interrupt class. The underflow path acquires the power partitions,
//! dumps every hardware block, and soft-resets the scene-control block
//! with the timing generator stopped. Everything recovers and logs
//! locally; the only escalation is the indefinite freeze primitive that
//! blocks frame submission until an external policy releases it.
//!
//! ## Modules
//!
//! - [`dbg_irq`] - Interrupt classes, capture gates and the decode work
//! - [`dump`] - Full hardware status dump across named blocks
//! - [`forensic`] - Bounded-prefix plane capture for decode errors
//! - [`controller`] - The per-pipe controller tying the paths together

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod controller;
pub mod dbg_irq;
pub mod dump;
pub mod forensic;

pub use controller::{RecoveryController, RecoveryHal, UnderflowOutcome};
pub use dbg_irq::{DbgConditions, IrqClass};
pub use dump::HwStatusReport;
pub use forensic::{ForensicBuffer, PipeRenderState, PlaneBuffer, FORENSIC_PREFIX};

use core::sync::atomic::{AtomicU8, Ordering};

/// Index of a display pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipeId(pub u8);

/// Recovery state of one pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipeState {
    /// Nothing pending.
    Normal = 0,
    /// An exception was captured, decode not started.
    DumpPending = 1,
    /// A dump or reset is running.
    DumpInProgress = 2,
    /// Hardware was cleared this cycle.
    Cleared = 3,
    /// Frame submission is frozen pending external policy.
    Frozen = 4,
}

impl PipeState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => PipeState::DumpPending,
            2 => PipeState::DumpInProgress,
            3 => PipeState::Cleared,
            4 => PipeState::Frozen,
            _ => PipeState::Normal,
        }
    }
}

/// Atomic cell holding a [`PipeState`].
#[derive(Debug)]
pub(crate) struct PipeStateCell(AtomicU8);

impl PipeStateCell {
    pub(crate) const fn new(state: PipeState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> PipeState {
        PipeState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: PipeState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
