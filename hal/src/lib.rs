//! # Prism HAL
//!
//! Hardware abstraction seams for the Prism display pipeline core.
//!
//! Everything the resource and recovery core consumes from the board port
//! but does not implement itself lives here as a trait: regulators and
//! clocks, per-block capability interfaces, scene-control primitives, the
//! timing generator, and the deferred-work seam used by the recovery
//! controller. Board ports (and unit tests) supply the implementations.
//!
//! ## Modules
//!
//! - [`block`] - Per-hardware-block capability interface
//! - [`power`] - Regulator, partition clock and bus keepalive traits
//! - [`scene`] - Scene-control and timing-generator primitives
//! - [`sync`] - Completion channel and delay providers
//! - [`work`] - Deferred-work seam for diagnostic jobs

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod block;
pub mod power;
pub mod scene;
pub mod sync;
pub mod work;

use core::fmt;

/// Errors surfaced by HAL collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// Regulator refused to power on.
    RegulatorEnable,
    /// Regulator refused to power off.
    RegulatorDisable,
    /// Partition clock failed to start.
    ClockEnable,
    /// Software-clear primitive did not take effect.
    SwClearFailed,
    /// Bounded wait elapsed without completion.
    Timeout,
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalError::RegulatorEnable => write!(f, "regulator enable failed"),
            HalError::RegulatorDisable => write!(f, "regulator disable failed"),
            HalError::ClockEnable => write!(f, "clock enable failed"),
            HalError::SwClearFailed => write!(f, "software clear failed"),
            HalError::Timeout => write!(f, "wait timed out"),
        }
    }
}
