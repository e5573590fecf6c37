//! Regulator and Clock Seams
//!
//! Power-rail and clock handles consumed by the power domain manager.
//! The board port owns the actual register/firmware interface; the core
//! only sequences calls on these traits.

use crate::HalError;

/// A power rail that can be switched on and off.
///
/// One handle per partition, plus one shared-domain rail attached to the
/// lowest partition. Enable/disable are not refcounted here; the power
/// domain manager owns refcounting.
pub trait Regulator: Send + Sync {
    /// Power the rail on.
    fn enable(&self) -> Result<(), HalError>;

    /// Power the rail off.
    fn disable(&self) -> Result<(), HalError>;
}

/// A partition's functional clock.
///
/// The clock must be live before and while its rail powers on, so the
/// sequencer enables the clock first and disables it last.
pub trait PartitionClock: Send + Sync {
    /// Ungate the clock.
    fn enable(&self) -> Result<(), HalError>;

    /// Gate the clock.
    fn disable(&self);
}

/// Nestable bus-clock keepalive.
///
/// `active`/`deactive` calls nest; the implementor refcounts them. Held
/// around short multi-register critical sections so concurrent clock
/// gating cannot interrupt them. Distinct from partition refcounts.
pub trait BusClock: Send + Sync {
    /// Take a keepalive reference.
    fn active(&self);

    /// Drop a keepalive reference.
    fn deactive(&self);
}
