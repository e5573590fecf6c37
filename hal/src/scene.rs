//! Scene-Control and Timing Primitives
//!
//! Soft-reset and restart primitives the recovery controller drives on the
//! scene-control block, plus the timing generator bracketing a reset.

use crate::HalError;

/// Scene-control block primitives used during recovery.
pub trait SceneCtl: Send + Sync {
    /// Software-clear: soft-reset the scene-control block.
    ///
    /// Recovers from a detected hang without a power cycle. Failure is
    /// reported, not retried; escalation is the caller's problem.
    fn sw_clear(&self) -> Result<(), HalError>;

    /// Currently mounted read-channel mask.
    fn rd_mounts(&self) -> u32;

    /// Program the read-channel mount mask.
    fn set_rd_mounts(&self, mask: u32);

    /// Currently mounted write-channel mask.
    fn wr_mounts(&self) -> u32;

    /// Program the write-channel mount mask.
    fn set_wr_mounts(&self, mask: u32);

    /// Push the pending configuration towards the hardware latch point.
    fn cfg_ready_update(&self);

    /// Kick the first-frame start trigger.
    fn first_frame_start(&self);
}

/// Timing generator on/off control.
///
/// The generator is stopped across a software clear so the reset does not
/// race an in-flight scanout.
pub trait TimingGenerator: Send + Sync {
    /// Start pixel timing.
    fn enable(&self);

    /// Stop pixel timing.
    fn disable(&self);
}
