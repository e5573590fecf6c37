//! Full Hardware Status Dump
//!
//! Walks every registered block and captures its status registers,
//! logging each line for the operator and retaining the structured report
//! for the out-of-scope hardware-reset path.

use alloc::sync::Arc;
use alloc::vec::Vec;

use prism_hal::block::{BlockStatus, HwBlock};

/// Retained result of one full status dump.
#[derive(Debug, Clone, Default)]
pub struct HwStatusReport {
    /// Captured status per block, registration order.
    pub blocks: Vec<BlockStatus>,
}

impl HwStatusReport {
    /// Total registers captured across all blocks.
    pub fn reg_count(&self) -> usize {
        self.blocks.iter().map(|b| b.regs.len()).sum()
    }
}

/// Dump every block's status, logging each captured register.
pub fn dump_all(blocks: &[Arc<dyn HwBlock>]) -> HwStatusReport {
    let mut report = HwStatusReport::default();
    for block in blocks {
        let status = block.status_dump();
        for reg in &status.regs {
            log::error!(
                "Recovery: {} +{:#06x} = {:#010x}",
                status.kind.name(),
                reg.offset,
                reg.value
            );
        }
        // Latched bits are consumed by the capture; the next dump starts
        // from a clean slate.
        block.status_clear();
        report.blocks.push(status);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};
    use prism_hal::block::{BlockKind, DbgIrqSnapshot, RegSnapshot};

    struct FixedBlock(BlockKind, AtomicU32);

    impl HwBlock for FixedBlock {
        fn kind(&self) -> BlockKind {
            self.0
        }
        fn status_dump(&self) -> BlockStatus {
            BlockStatus {
                kind: self.0,
                regs: alloc::vec![
                    RegSnapshot { offset: 0x0, value: 0x1 },
                    RegSnapshot { offset: 0x4, value: 0x2 },
                ],
            }
        }
        fn status_clear(&self) {
            self.1.fetch_add(1, Ordering::Relaxed);
        }
        fn dbg_irq_dump(&self) -> DbgIrqSnapshot {
            DbgIrqSnapshot::default()
        }
        fn dbg_irq_clear(&self) {}
        fn dbg_irq_enable(&self, _enable: bool) {}
    }

    #[test]
    fn test_dump_covers_all_blocks() {
        let mixer = Arc::new(FixedBlock(BlockKind::Mixer, AtomicU32::new(0)));
        let blocks: Vec<Arc<dyn HwBlock>> = alloc::vec![
            Arc::new(FixedBlock(BlockKind::CtlTop, AtomicU32::new(0))),
            mixer.clone(),
            Arc::new(FixedBlock(BlockKind::RdmaCh(0), AtomicU32::new(0))),
        ];
        let report = dump_all(&blocks);
        assert_eq!(report.blocks.len(), 3);
        assert_eq!(report.reg_count(), 6);
        assert_eq!(report.blocks[1].kind, BlockKind::Mixer);
        // Latched bits cleared once after capture.
        assert_eq!(mixer.1.load(Ordering::Relaxed), 1);
    }
}
