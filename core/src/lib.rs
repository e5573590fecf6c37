//! # Prism Subsystem Context
//!
//! Explicitly constructed context tying the resource and recovery
//! subsystems together. There are no globals: a board port builds one
//! [`DisplayCore`] from a [`DisplayHal`] bundle and threads it to every
//! caller that needs power, output-buffer slots or recovery.
//!
//! ## Components
//!
//! - [`DisplayHal`] — trait-object bundle a board port supplies
//! - [`DisplayCore`] — owns the power manager, the output-buffer
//!   arbiter and one recovery controller per pipe

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use prism_hal::power::{BusClock, Regulator};
use prism_obuf::{ObufArbiter, Scene};
use prism_power::{PartitionDesc, PartitionId, PartitionOps, PowerError, PowerManager, PowerPolicy};
use prism_recovery::{PipeId, RecoveryController, RecoveryHal};

// =============================================================================
// Errors
// =============================================================================

/// Context-level failures.
#[derive(Debug)]
pub enum CoreError {
    /// Topology rejected by the power manager.
    Power(PowerError),
    /// Teardown refused while a partition still holds references.
    Busy(PartitionId),
    /// Lifecycle call out of order.
    NotInitialized,
}

impl From<PowerError> for CoreError {
    fn from(err: PowerError) -> Self {
        Self::Power(err)
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Power(err) => write!(f, "power topology: {}", err),
            Self::Busy(id) => write!(f, "partition {:?} still referenced", id),
            Self::NotInitialized => write!(f, "context not initialized"),
        }
    }
}

// =============================================================================
// Board bundle
// =============================================================================

/// Everything a board port supplies to bring the subsystem up.
pub struct DisplayHal {
    /// Power partition topology, sorted by partition index.
    pub partitions: Vec<PartitionDesc>,
    /// Rail shared with blocks outside this subsystem.
    pub shared_rail: Box<dyn Regulator>,
    /// Partition init/teardown hooks.
    pub partition_ops: Arc<dyn PartitionOps>,
    /// Register-access bus clock.
    pub bus_clock: Arc<dyn BusClock>,
    /// Recovery seams, one bundle per display pipe.
    pub pipes: Vec<(PipeId, RecoveryHal)>,
}

// =============================================================================
// Context
// =============================================================================

/// Subsystem context owning every long-lived service object.
pub struct DisplayCore {
    power: PowerManager,
    obuf: ObufArbiter,
    pipes: Vec<RecoveryController>,
    scene_policy: AtomicU32,
    initialized: AtomicBool,
}

impl DisplayCore {
    /// Build the context from the board bundle. Cold path, runs once.
    pub fn new(hal: DisplayHal) -> Result<Self, CoreError> {
        let power = PowerManager::new(
            hal.partitions,
            hal.shared_rail,
            hal.partition_ops,
            hal.bus_clock,
        )?;
        let pipes = hal
            .pipes
            .into_iter()
            .map(|(pipe, seams)| RecoveryController::new(pipe, seams))
            .collect();
        Ok(Self {
            power,
            obuf: ObufArbiter::default(),
            pipes,
            scene_policy: AtomicU32::new(PowerPolicy::DEFAULT.0),
            initialized: AtomicBool::new(false),
        })
    }

    /// Bring the context into service.
    pub fn init(&self) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            log::warn!("Core: init called twice");
            return;
        }
        log::info!(
            "Core: display subsystem up, {} partitions, {} pipes",
            self.power.partition_count(),
            self.pipes.len()
        );
    }

    /// Take the context out of service.
    ///
    /// Refuses while any partition still holds references; a leaked get
    /// would otherwise strand its rail on across the teardown.
    pub fn deinit(&self) -> Result<(), CoreError> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(CoreError::NotInitialized);
        }
        for id in self.power.all_partitions().iter_ascending() {
            let refs = self.power.refcount(id);
            if refs != 0 {
                log::warn!("Core: deinit with partition {:?} at {} refs", id, refs);
                return Err(CoreError::Busy(id));
            }
        }
        self.initialized.store(false, Ordering::Release);
        log::info!("Core: display subsystem down");
        Ok(())
    }

    /// True between a successful `init` and `deinit`.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    // =========================================================================
    // Scene routing
    // =========================================================================

    /// Propagate a topology change to every scene consumer.
    ///
    /// Retargets the output-buffer arbiter and selects the power policy
    /// subsequent partition gets are tagged with. Returns that policy so
    /// the caller can thread it into its next `PowerManager::get`.
    pub fn scene_update(&self, scene: Scene) -> PowerPolicy {
        self.obuf.scene_trigger(scene);
        let policy = Self::policy_for(scene);
        self.scene_policy.store(policy.0, Ordering::Release);
        log::debug!("Core: scene row {} -> policy {}", scene.row(), policy.0);
        policy
    }

    /// Power policy tag for a scene. The tag is the scene-table row, so
    /// the power side can distinguish every topology the arbiter does.
    pub const fn policy_for(scene: Scene) -> PowerPolicy {
        PowerPolicy(scene.row() as u32)
    }

    /// Policy selected by the most recent scene update.
    pub fn scene_policy(&self) -> PowerPolicy {
        PowerPolicy(self.scene_policy.load(Ordering::Acquire))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Power domain manager.
    pub fn power(&self) -> &PowerManager {
        &self.power
    }

    /// Output-buffer arbiter.
    pub fn obuf(&self) -> &ObufArbiter {
        &self.obuf
    }

    /// Recovery controller for `pipe`, if the board registered it.
    pub fn pipe(&self, pipe: PipeId) -> Option<&RecoveryController> {
        self.pipes.iter().find(|ctrl| ctrl.pipe() == pipe)
    }

    /// All recovery controllers, board registration order.
    pub fn pipes(&self) -> &[RecoveryController] {
        &self.pipes
    }
}

// =============================================================================
// Tests
// =============================================================================
