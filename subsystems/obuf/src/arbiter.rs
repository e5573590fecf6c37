//! Three-Phase Slot Arbiter
//!
//! `check` decides whether a client may move to its scene allocation,
//! `cmt` marks that hardware was programmed with the new masks, and
//! `done` runs from the hardware-confirmation path once the switch has
//! latched. The split keeps a delayed or aborted commit from ever tearing
//! the global slot occupancy.
//!
//! One spinlock guards the occupancy word and every client's allocation;
//! no critical section here blocks.

use spin::Mutex;

use crate::scene::{ObufClient, PlugState, PortMode, Scene, SlotMask, CLIENT_COUNT};

/// Per-client allocation state.
///
/// Tagged so "pending but already equal to desired" is unrepresentable:
/// a commit to the current mask never leaves `Held`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Allocation {
    /// Slots currently latched in hardware.
    Held(SlotMask),
    /// A switch was committed but has not latched yet.
    Pending {
        /// Slots still occupied until the switch latches.
        old: SlotMask,
        /// Slots the hardware was programmed to take.
        desired: SlotMask,
    },
}

impl Allocation {
    /// The client's contribution to global occupancy.
    fn occupied(self) -> SlotMask {
        match self {
            Allocation::Held(m) => m,
            Allocation::Pending { old, .. } => old,
        }
    }
}

/// Result of the check phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObufCheck {
    /// The mask the active scene grants this client.
    pub desired: SlotMask,
    /// True when switching to `desired` is safe in this commit.
    pub needs_update: bool,
}

struct ArbiterState {
    scene: Scene,
    occupied: SlotMask,
    clients: [Allocation; CLIENT_COUNT],
}

/// Shared output-buffer arbiter.
pub struct ObufArbiter {
    state: Mutex<ArbiterState>,
}

impl ObufArbiter {
    /// Create an arbiter with no slots claimed.
    ///
    /// Clients start empty-handed; the first check per client drives the
    /// initial allocation through the normal handshake.
    pub fn new(initial_scene: Scene) -> Self {
        Self {
            state: Mutex::new(ArbiterState {
                scene: initial_scene,
                occupied: SlotMask::EMPTY,
                clients: [Allocation::Held(SlotMask::EMPTY); CLIENT_COUNT],
            }),
        }
    }

    /// Check phase: may `client` move to its scene allocation now?
    ///
    /// `needs_update` is false when the client already holds its
    /// allocation, and also when some other client still occupies any of
    /// the wanted slots; the caller retries on a later commit, there is
    /// no queue.
    pub fn check_obufen(&self, client: ObufClient) -> ObufCheck {
        let state = self.state.lock();
        let desired = state.scene.allocation(client);
        let held = state.clients[client.index()].occupied();
        if desired == held {
            return ObufCheck {
                desired,
                needs_update: false,
            };
        }
        let others = state.occupied.minus(held);
        let needs_update = !desired.intersects(others);
        if !needs_update {
            log::debug!(
                "Obuf: {} wants {:?}, blocked by occupancy {:?}",
                client.name(),
                desired,
                others
            );
        }
        ObufCheck {
            desired,
            needs_update,
        }
    }

    /// The mask to program into hardware this commit.
    ///
    /// Returns the about-to-latch mask while a switch is pending, else
    /// the held mask, so the commit that decided to switch can program
    /// registers with the new value.
    pub fn get_obufen(&self, client: ObufClient) -> SlotMask {
        let state = self.state.lock();
        match state.clients[client.index()] {
            Allocation::Held(m) => m,
            Allocation::Pending { desired, .. } => desired,
        }
    }

    /// Commit phase: hardware config for the scene allocation was written.
    ///
    /// `updated = true` opens a pending switch (a commit to the already
    /// held mask stays `Held`); `updated = false` cancels one.
    pub fn update_obufen_cmt(&self, client: ObufClient, updated: bool) {
        let mut state = self.state.lock();
        let desired = state.scene.allocation(client);
        let slot = &mut state.clients[client.index()];
        if updated {
            if let Allocation::Held(old) = *slot {
                if old != desired {
                    *slot = Allocation::Pending { old, desired };
                    log::debug!(
                        "Obuf: {} commit {:?} -> {:?}",
                        client.name(),
                        old,
                        desired
                    );
                }
            }
        } else if let Allocation::Pending { old, .. } = *slot {
            *slot = Allocation::Held(old);
            log::debug!("Obuf: {} commit cancelled", client.name());
        }
    }

    /// Done phase: the switch latched in hardware.
    ///
    /// Atomically releases the old slots and claims the new ones in the
    /// global occupancy. No-op unless a commit preceded it since the last
    /// done.
    pub fn update_obufen_done(&self, client: ObufClient) {
        let mut state = self.state.lock();
        if let Allocation::Pending { old, desired } = state.clients[client.index()] {
            debug_assert!(
                !state.occupied.minus(old).intersects(desired),
                "latched switch overlaps another client"
            );
            state.occupied = state.occupied.minus(old).union(desired);
            state.clients[client.index()] = Allocation::Held(desired);
            log::debug!("Obuf: {} latched {:?}", client.name(), desired);
        }
    }

    /// Swap the active scene row.
    ///
    /// Does not reallocate anything itself; the next check per client
    /// sees the mismatch and drives reallocation through the handshake.
    pub fn scene_trigger(&self, scene: Scene) {
        let mut state = self.state.lock();
        if state.scene != scene {
            log::info!("Obuf: scene {:?} -> {:?}", state.scene, scene);
            state.scene = scene;
        }
    }

    /// The active scene.
    pub fn scene(&self) -> Scene {
        self.state.lock().scene
    }

    /// Slots currently claimed by any client.
    pub fn occupancy(&self) -> SlotMask {
        self.state.lock().occupied
    }
}

impl Default for ObufArbiter {
    fn default() -> Self {
        Self::new(Scene {
            ports: PortMode::Single,
            plug: PlugState::Unplugged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(ports: PortMode, plug: PlugState) -> Scene {
        Scene { ports, plug }
    }

    /// Drive one client through a full handshake.
    fn settle(arb: &ObufArbiter, client: ObufClient) -> bool {
        let check = arb.check_obufen(client);
        if !check.needs_update {
            return false;
        }
        arb.update_obufen_cmt(client, true);
        assert_eq!(arb.get_obufen(client), check.desired);
        arb.update_obufen_done(client);
        true
    }

    #[test]
    fn test_initial_check_claims_full_allocation() {
        let arb = ObufArbiter::default();
        let check = arb.check_obufen(ObufClient::Dsi0);
        assert_eq!(check.desired.bits(), 0b1111);
        assert!(check.needs_update);
    }

    #[test]
    fn test_settled_client_needs_no_update() {
        let arb = ObufArbiter::default();
        assert!(settle(&arb, ObufClient::Dsi0));
        let check = arb.check_obufen(ObufClient::Dsi0);
        assert!(!check.needs_update);
        assert_eq!(arb.occupancy().bits(), 0b1111);
    }

    #[test]
    fn test_check_refuses_overlap_until_owner_releases() {
        let arb = ObufArbiter::default();
        assert!(settle(&arb, ObufClient::Dsi0));

        // Plug event: DP now wants slots DSI0 still occupies.
        arb.scene_trigger(scene(PortMode::Single, PlugState::Plugged));
        let dp = arb.check_obufen(ObufClient::Dp);
        assert_eq!(dp.desired.bits(), 0b1100);
        assert!(!dp.needs_update);

        // DSI0 shrinks first, then DP fits.
        assert!(settle(&arb, ObufClient::Dsi0));
        assert_eq!(arb.occupancy().bits(), 0b0011);
        assert!(settle(&arb, ObufClient::Dp));
        assert_eq!(arb.occupancy().bits(), 0b1111);
    }

    #[test]
    fn test_done_is_noop_without_commit() {
        let arb = ObufArbiter::default();
        arb.update_obufen_done(ObufClient::Dsi0);
        assert!(arb.occupancy().is_empty());
        assert_eq!(arb.get_obufen(ObufClient::Dsi0), SlotMask::EMPTY);
    }

    #[test]
    fn test_done_consumes_one_commit() {
        let arb = ObufArbiter::default();
        arb.update_obufen_cmt(ObufClient::Dsi0, true);
        arb.update_obufen_done(ObufClient::Dsi0);
        assert_eq!(arb.occupancy().bits(), 0b1111);
        // A second done without a new commit changes nothing.
        arb.update_obufen_done(ObufClient::Dsi0);
        assert_eq!(arb.occupancy().bits(), 0b1111);
    }

    #[test]
    fn test_cancelled_commit_restores_held() {
        let arb = ObufArbiter::default();
        assert!(settle(&arb, ObufClient::Dsi0));
        arb.scene_trigger(scene(PortMode::Single, PlugState::Plugged));

        arb.update_obufen_cmt(ObufClient::Dsi0, true);
        assert_eq!(arb.get_obufen(ObufClient::Dsi0).bits(), 0b0011);
        arb.update_obufen_cmt(ObufClient::Dsi0, false);
        assert_eq!(arb.get_obufen(ObufClient::Dsi0).bits(), 0b1111);
        arb.update_obufen_done(ObufClient::Dsi0);
        assert_eq!(arb.occupancy().bits(), 0b1111);
    }

    #[test]
    fn test_commit_to_equal_mask_stays_held() {
        let arb = ObufArbiter::default();
        assert!(settle(&arb, ObufClient::Dsi0));
        arb.update_obufen_cmt(ObufClient::Dsi0, true);
        // No pending state was opened, so done is a no-op.
        arb.update_obufen_done(ObufClient::Dsi0);
        assert_eq!(arb.occupancy().bits(), 0b1111);
        assert_eq!(arb.get_obufen(ObufClient::Dsi0).bits(), 0b1111);
    }

    #[test]
    fn test_scene_trigger_idempotent() {
        let arb = ObufArbiter::default();
        assert!(settle(&arb, ObufClient::Dsi0));
        let s = scene(PortMode::Single, PlugState::Unplugged);
        arb.scene_trigger(s);
        arb.scene_trigger(s);
        for client in ObufClient::ALL {
            let before = arb.check_obufen(client);
            arb.scene_trigger(s);
            let after = arb.check_obufen(client);
            assert_eq!(before, after);
        }
    }

    #[test]
    fn test_dual_plugged_full_reallocation() {
        let arb = ObufArbiter::default();
        assert!(settle(&arb, ObufClient::Dsi0));
        arb.scene_trigger(scene(PortMode::Dual, PlugState::Plugged));

        // DSI1 and DP want slots DSI0 occupies; DSI0 must shrink first.
        assert!(!arb.check_obufen(ObufClient::Dsi1).needs_update);
        assert!(!arb.check_obufen(ObufClient::Dp).needs_update);
        assert!(settle(&arb, ObufClient::Dsi0));
        assert!(settle(&arb, ObufClient::Dsi1));
        assert!(settle(&arb, ObufClient::Dp));
        assert_eq!(arb.occupancy().bits(), 0b1111);
    }
}
