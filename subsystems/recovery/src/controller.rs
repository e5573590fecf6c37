//! Per-Pipe Recovery Controller
//!
//! Owns the capture gates, the decode work items, and the soft-reset
//! path. The per-pipe commit lock serializes decode jobs against the
//! commit path's render-state updates. Nothing here returns a fatal
//! error; detection contexts have no caller to propagate to, so every
//! path recovers and logs locally and escalation runs through
//! [`RecoveryController::freeze_current_frame`].

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use prism_hal::block::{HwBlock, IntrCtl};
use prism_hal::scene::{SceneCtl, TimingGenerator};
use prism_hal::sync::{Completion, Delay};
use prism_hal::work::{Work, WorkQueue};
use prism_power::PowerManager;
use spin::Mutex;

use crate::dbg_irq::{CaptureRecord, CaptureSlot, DbgConditions, IrqClass};
use crate::dump::{dump_all, HwStatusReport};
use crate::forensic::{ForensicBuffer, PipeRenderState};
use crate::{PipeId, PipeState, PipeStateCell};

/// Bound on the paint-background-and-restart wait.
const RESTART_TIMEOUT_US: u64 = 100_000;
/// Poll step while waiting for the frame restart.
const RESTART_POLL_US: u32 = 100;
/// Poll interval of the freeze primitive.
const FREEZE_POLL_US: u32 = 1_000;

/// Outcome of the underflow/hang path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnderflowOutcome {
    /// The pipe is frozen; nothing was touched.
    Frozen,
    /// Power partitions could not be acquired; nothing was dumped.
    PowerUnavailable,
    /// The cfg-ready raw bit was already clear; treated as spurious.
    Spurious,
    /// Soft reset and frame restart succeeded.
    Recovered,
    /// Soft reset took, but the frame restart never signalled.
    RestartTimeout,
    /// The software-clear primitive failed; diagnostics are retained.
    ResetFailed,
}

/// Hardware seams one pipe's recovery controller drives.
pub struct RecoveryHal {
    /// Per-class DMA channel blocks, [`IrqClass`] index order.
    pub channel_blocks: [Arc<dyn HwBlock>; IrqClass::COUNT],
    /// Every block walked by a full status dump.
    pub dump_blocks: Vec<Arc<dyn HwBlock>>,
    /// Interrupt controller view.
    pub intr: Arc<dyn IntrCtl>,
    /// Scene-control primitives.
    pub scene_ctl: Arc<dyn SceneCtl>,
    /// Timing generator bracketing the soft reset.
    pub timing: Arc<dyn TimingGenerator>,
    /// Where decode jobs execute.
    pub queue: Arc<dyn WorkQueue>,
    /// Signalled by the first-frame interrupt after a restart.
    pub restart: Arc<Completion>,
}

/// State shared between the controller and its reusable work items.
struct Shared {
    pipe: PipeId,
    state: PipeStateCell,
    frozen: AtomicBool,
    auto_recovery: AtomicBool,
    slots: [CaptureSlot; IrqClass::COUNT],
    channel_blocks: [Arc<dyn HwBlock>; IrqClass::COUNT],
    render: Mutex<PipeRenderState>,
    forensics: [Mutex<Option<ForensicBuffer>>; IrqClass::COUNT],
}

impl Shared {
    /// Decode one captured record. Runs on the work queue.
    fn run_decode(&self, class: IrqClass) {
        self.state.store(PipeState::DumpInProgress);
        let record: CaptureRecord = *self.slots[class.index()].record.lock();

        let conds = DbgConditions::decode(record.snapshot.raw_status);
        log::error!(
            "Recovery: pipe {} {} raw {:#010x} err-status {:#010x}",
            self.pipe.0,
            class.name(),
            record.snapshot.raw_status,
            record.err_status
        );
        for (name, _) in conds.iter_names() {
            log::error!("Recovery: pipe {} {} condition {}", self.pipe.0, class.name(), name);
        }
        for (i, reg) in record.snapshot.dbg_regs.iter().enumerate() {
            log::debug!("Recovery: {} dbg[{}] = {:#010x}", class.name(), i, reg);
        }

        if conds.has_decode_error() {
            // Commit lock held so the planes cannot change mid-copy.
            let render = self.render.lock();
            let capture = ForensicBuffer::capture(class, &render);
            log::warn!(
                "Recovery: {} decode error, captured {} plane prefixes",
                class.name(),
                capture.planes.len()
            );
            *self.forensics[class.index()].lock() = Some(capture);
        }

        let block = &self.channel_blocks[class.index()];
        block.dbg_irq_clear();
        block.dbg_irq_enable(true);

        // Re-arm capture for this class last; a firing between the clear
        // above and this store only costs one extra raw clear.
        self.slots[class.index()]
            .complete_print
            .store(true, Ordering::Release);
        self.state.store(PipeState::Cleared);
        self.state.store(PipeState::Normal);
    }
}

/// Work item for one interrupt class, allocated once and reused forever.
struct DbgIrqWork {
    class: IrqClass,
    shared: Arc<Shared>,
}

impl Work for DbgIrqWork {
    fn run(&self) {
        self.shared.run_decode(self.class);
    }
}

/// Exception and recovery controller for one display pipe.
pub struct RecoveryController {
    shared: Arc<Shared>,
    works: [Arc<DbgIrqWork>; IrqClass::COUNT],
    queue: Arc<dyn WorkQueue>,
    dump_blocks: Vec<Arc<dyn HwBlock>>,
    intr: Arc<dyn IntrCtl>,
    scene_ctl: Arc<dyn SceneCtl>,
    timing: Arc<dyn TimingGenerator>,
    restart: Arc<Completion>,
    last_dump: Mutex<Option<HwStatusReport>>,
}

impl RecoveryController {
    /// Build the controller for one pipe.
    pub fn new(pipe: PipeId, hal: RecoveryHal) -> Self {
        let shared = Arc::new(Shared {
            pipe,
            state: PipeStateCell::new(PipeState::Normal),
            frozen: AtomicBool::new(false),
            auto_recovery: AtomicBool::new(false),
            slots: core::array::from_fn(|_| CaptureSlot::new()),
            channel_blocks: hal.channel_blocks,
            render: Mutex::new(PipeRenderState::default()),
            forensics: core::array::from_fn(|_| Mutex::new(None)),
        });
        let works = IrqClass::ALL.map(|class| {
            Arc::new(DbgIrqWork {
                class,
                shared: Arc::clone(&shared),
            })
        });
        Self {
            shared,
            works,
            queue: hal.queue,
            dump_blocks: hal.dump_blocks,
            intr: hal.intr,
            scene_ctl: hal.scene_ctl,
            timing: hal.timing,
            restart: hal.restart,
            last_dump: Mutex::new(None),
        }
    }

    /// The pipe this controller serves.
    pub fn pipe(&self) -> PipeId {
        self.shared.pipe
    }

    /// Current recovery state.
    pub fn state(&self) -> PipeState {
        self.shared.state.load()
    }

    // =========================================================================
    // Debug-interrupt path
    // =========================================================================

    /// Entry point for a per-channel debug interrupt.
    ///
    /// Disarms the one-shot class, snapshots its registers and enqueues
    /// the class's work item. A repeat firing before the previous decode
    /// finishes clears the raw status and enqueues nothing. Returns true
    /// if a work item was enqueued.
    pub fn on_dbg_irq(&self, class: IrqClass) -> bool {
        if self.shared.frozen.load(Ordering::Acquire) {
            return false;
        }
        let idx = class.index();
        let block = &self.shared.channel_blocks[idx];
        block.dbg_irq_enable(false);

        let slot = &self.shared.slots[idx];
        if !slot.complete_print.swap(false, Ordering::AcqRel) {
            // Previous decode still in flight: depth stays at one.
            block.dbg_irq_clear();
            log::debug!("Recovery: {} refired before decode finished", class.name());
            return false;
        }

        *slot.record.lock() = CaptureRecord {
            snapshot: block.dbg_irq_dump(),
            err_status: self.intr.err_status(),
        };
        self.shared.state.store(PipeState::DumpPending);

        let work: Arc<dyn Work> = self.works[idx].clone();
        if !self.queue.queue(work) {
            log::warn!("Recovery: {} decode queue refused work", class.name());
            slot.complete_print.store(true, Ordering::Release);
            return false;
        }
        true
    }

    /// Forensic capture from the last decode error of `class`, if any.
    pub fn take_forensic(&self, class: IrqClass) -> Option<ForensicBuffer> {
        self.shared.forensics[class.index()].lock().take()
    }

    /// Update the pipe's render state under the commit lock.
    pub fn update_render_state<F: FnOnce(&mut PipeRenderState)>(&self, f: F) {
        let mut render = self.shared.render.lock();
        f(&mut render);
    }

    // =========================================================================
    // Underflow / hang path
    // =========================================================================

    /// Recover from a detected underflow.
    ///
    /// Acquires every power partition for register access, verifies the
    /// hang via the cfg-ready raw bit, dumps all blocks, and soft-resets
    /// the scene-control block with the timing generator stopped. On a
    /// successful reset, paints background and restarts the frame with a
    /// bounded wait.
    pub fn handle_underflow(&self, power: &PowerManager, delay: &dyn Delay) -> UnderflowOutcome {
        if self.shared.frozen.load(Ordering::Acquire) {
            log::warn!("Recovery: underflow while frozen, ignoring");
            return UnderflowOutcome::Frozen;
        }
        let all = power.all_partitions();
        if let Err(e) = power.get_helper(all, power.policy()) {
            log::error!("Recovery: cannot power up for dump: {}", e);
            return UnderflowOutcome::PowerUnavailable;
        }
        let outcome = self.underflow_powered(delay);
        power.put_helper(all);
        outcome
    }

    fn underflow_powered(&self, delay: &dyn Delay) -> UnderflowOutcome {
        if !self.intr.cfg_ready_pending() {
            log::info!(
                "Recovery: pipe {} cfg-ready clear, spurious underflow",
                self.shared.pipe.0
            );
            return UnderflowOutcome::Spurious;
        }

        self.shared.state.store(PipeState::DumpInProgress);
        let report = dump_all(&self.dump_blocks);
        log::error!(
            "Recovery: pipe {} dumped {} registers across {} blocks",
            self.shared.pipe.0,
            report.reg_count(),
            report.blocks.len()
        );
        *self.last_dump.lock() = Some(report);

        // The reset must not race an in-flight scanout.
        self.timing.disable();
        let cleared = self.scene_ctl.sw_clear();
        self.timing.enable();

        match cleared {
            Err(e) => {
                log::error!("Recovery: software clear failed: {}", e);
                UnderflowOutcome::ResetFailed
            }
            Ok(()) => {
                self.intr.clear_cfg_ready();
                // Paint background: no channels mounted on the restart
                // frame, so the first frame out is a known-clean one.
                self.scene_ctl.set_rd_mounts(0);
                self.scene_ctl.set_wr_mounts(0);
                self.restart.reset();
                self.scene_ctl.cfg_ready_update();
                self.scene_ctl.first_frame_start();

                if self
                    .restart
                    .wait_timeout(delay, RESTART_TIMEOUT_US, RESTART_POLL_US)
                {
                    log::info!("Recovery: pipe {} restarted", self.shared.pipe.0);
                    self.shared.state.store(PipeState::Cleared);
                    self.shared.state.store(PipeState::Normal);
                    UnderflowOutcome::Recovered
                } else {
                    log::error!("Recovery: pipe {} frame restart timed out", self.shared.pipe.0);
                    UnderflowOutcome::RestartTimeout
                }
            }
        }
    }

    /// Retained report from the last full status dump.
    pub fn last_dump(&self) -> Option<HwStatusReport> {
        self.last_dump.lock().clone()
    }

    /// Completion the first-frame interrupt signals after a restart.
    pub fn restart_completion(&self) -> &Completion {
        &self.restart
    }

    // =========================================================================
    // Freeze primitive
    // =========================================================================

    /// Refuse further frame submission until external policy releases us.
    ///
    /// Blocks the calling (commit) thread, polling at a fixed interval,
    /// until [`RecoveryController::set_auto_recovery`] is called with
    /// true. Deliberately has no timeout and no cancellation.
    pub fn freeze_current_frame(&self, delay: &dyn Delay) {
        self.shared.frozen.store(true, Ordering::Release);
        self.shared.state.store(PipeState::Frozen);
        log::warn!(
            "Recovery: pipe {} frozen awaiting external policy",
            self.shared.pipe.0
        );
        while !self.shared.auto_recovery.load(Ordering::Acquire) {
            delay.delay_us(FREEZE_POLL_US);
        }
        self.shared.auto_recovery.store(false, Ordering::Release);
        self.shared.frozen.store(false, Ordering::Release);
        self.shared.state.store(PipeState::Normal);
        log::info!("Recovery: pipe {} released", self.shared.pipe.0);
    }

    /// External-policy hook releasing a frozen pipe.
    pub fn set_auto_recovery(&self, enable: bool) {
        self.shared.auto_recovery.store(enable, Ordering::Release);
    }

    /// True while the pipe refuses frame submission.
    pub fn is_frozen(&self) -> bool {
        self.shared.frozen.load(Ordering::Acquire)
    }
}
