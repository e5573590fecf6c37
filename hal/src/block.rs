//! Per-Block Capability Interface
//!
//! Every dumpable hardware block of the pipeline implements [`HwBlock`].
//! The recovery controller walks these during a full status dump and uses
//! the debug-irq calls on the per-channel DMA blocks.

use alloc::vec::Vec;

/// Identity of a dumpable hardware block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Pipeline control top.
    CtlTop,
    /// Scene control block.
    SceneCtl,
    /// Post-processing pipe.
    PostPipe,
    /// Write-back top.
    WbTop,
    /// Layer mixer.
    Mixer,
    /// Interrupt controller.
    IntrCtl,
    /// Read-DMA channel.
    RdmaCh(u8),
    /// Write-DMA channel.
    WdmaCh(u8),
}

impl BlockKind {
    /// Human-readable block name for dump logs.
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::CtlTop => "ctl-top",
            BlockKind::SceneCtl => "scene-ctl",
            BlockKind::PostPipe => "post-pipe",
            BlockKind::WbTop => "wb-top",
            BlockKind::Mixer => "mixer",
            BlockKind::IntrCtl => "intr-ctl",
            BlockKind::RdmaCh(_) => "rdma-ch",
            BlockKind::WdmaCh(_) => "wdma-ch",
        }
    }
}

/// One register captured during a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegSnapshot {
    /// Register offset within the block.
    pub offset: u32,
    /// Captured value.
    pub value: u32,
}

/// Captured status of one block.
#[derive(Debug, Clone)]
pub struct BlockStatus {
    /// Which block this came from.
    pub kind: BlockKind,
    /// Captured registers.
    pub regs: Vec<RegSnapshot>,
}

/// Snapshot taken when a per-channel debug interrupt fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DbgIrqSnapshot {
    /// Raw interrupt status word.
    pub raw_status: u32,
    /// Channel debug registers.
    pub dbg_regs: [u32; 4],
}

/// Capability interface implemented per hardware block.
pub trait HwBlock: Send + Sync {
    /// Which block this is.
    fn kind(&self) -> BlockKind;

    /// Capture the block's status registers.
    fn status_dump(&self) -> BlockStatus;

    /// Clear latched status bits.
    fn status_clear(&self);

    /// Capture the debug-irq registers.
    fn dbg_irq_dump(&self) -> DbgIrqSnapshot;

    /// Clear raw debug-irq status.
    fn dbg_irq_clear(&self);

    /// Arm or disarm the one-shot debug irq.
    fn dbg_irq_enable(&self, enable: bool);
}

/// Interrupt-controller view used by the hang-detection path.
pub trait IntrCtl: Send + Sync {
    /// Global error-status word.
    fn err_status(&self) -> u32;

    /// Raw bit of the configuration-latched interrupt.
    ///
    /// Still pending means the last submitted configuration never took
    /// effect, the primary hang symptom.
    fn cfg_ready_pending(&self) -> bool;

    /// Clear the configuration-latched raw bit.
    fn clear_cfg_ready(&self);
}
