//! Completion and Delay Primitives
//!
//! A bounded-wait completion channel used by the frame-restart recovery
//! path, plus the delay providers its polling loops run on.

use core::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// Delay
// =============================================================================

/// Source of short busy delays for polling loops.
pub trait Delay: Send + Sync {
    /// Delay for at least `us` microseconds.
    fn delay_us(&self, us: u32);
}

/// Delay by spinning on the CPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinDelay;

impl Delay for SpinDelay {
    fn delay_us(&self, us: u32) {
        // Calibration is the board port's problem; one hint per cycle is
        // enough for the recovery paths that poll through this.
        for _ in 0..us {
            core::hint::spin_loop();
        }
    }
}

/// Delay by sleeping the current thread.
#[cfg(feature = "std")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepDelay;

#[cfg(feature = "std")]
impl Delay for SleepDelay {
    fn delay_us(&self, us: u32) {
        std::thread::sleep(core::time::Duration::from_micros(us as u64));
    }
}

// =============================================================================
// Completion
// =============================================================================

/// One-shot completion channel with a bounded polling wait.
///
/// The signalling side calls [`Completion::complete`] from interrupt
/// context; the waiting side polls with a fixed step until completion or
/// timeout. Reusable after [`Completion::reset`].
#[derive(Debug)]
pub struct Completion {
    done: AtomicBool,
}

impl Completion {
    /// Create an unsignalled completion.
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
        }
    }

    /// Signal completion.
    pub fn complete(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Re-arm for the next wait.
    pub fn reset(&self) {
        self.done.store(false, Ordering::Release);
    }

    /// Check without waiting.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Poll until signalled or until `timeout_us` elapses.
    ///
    /// Returns true if the completion was signalled within the bound.
    pub fn wait_timeout(&self, delay: &dyn Delay, timeout_us: u64, step_us: u32) -> bool {
        let step = step_us.max(1);
        let mut waited: u64 = 0;
        loop {
            if self.is_done() {
                return true;
            }
            if waited >= timeout_us {
                return false;
            }
            delay.delay_us(step);
            waited += step as u64;
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}
