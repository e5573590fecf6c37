//! Forensic Plane Capture
//!
//! When a debug interrupt reports a decode error, the decode job copies a
//! bounded prefix of every active plane's backing buffer for offline
//! comparison against the submitted content. The copy runs under the
//! per-pipe commit lock so the render state cannot change mid-capture.

use alloc::vec::Vec;

use crate::dbg_irq::IrqClass;

/// Bytes captured from the head of each plane buffer.
pub const FORENSIC_PREFIX: usize = 4096;

/// One active plane's backing storage.
#[derive(Debug, Clone)]
pub struct PlaneBuffer {
    /// Plane index within the pipe.
    pub plane: u8,
    /// Backing pixel data.
    pub backing: Vec<u8>,
}

/// Render state of one pipe, guarded by the commit lock.
#[derive(Debug, Default)]
pub struct PipeRenderState {
    /// Planes active in the last committed frame.
    pub planes: Vec<PlaneBuffer>,
}

/// Captured forensic copy for one interrupt class.
#[derive(Debug, Clone)]
pub struct ForensicBuffer {
    /// Class whose decode error triggered the capture.
    pub class: IrqClass,
    /// Bounded-prefix copies, one per active plane.
    pub planes: Vec<Vec<u8>>,
}

impl ForensicBuffer {
    /// Copy the bounded prefix of every active plane.
    pub fn capture(class: IrqClass, render: &PipeRenderState) -> Self {
        let planes = render
            .planes
            .iter()
            .map(|p| {
                let len = p.backing.len().min(FORENSIC_PREFIX);
                p.backing[..len].to_vec()
            })
            .collect();
        Self { class, planes }
    }
}
