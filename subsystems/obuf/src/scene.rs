//! Scenes and the Static Allocation Table
//!
//! A scene classifies the current display topology; each scene row fixes
//! which slots every client is entitled to. Rows are pairwise disjoint
//! per client, checked at compile time.

use core::fmt;

use static_assertions::const_assert;

/// Number of bit-addressable output-buffer slots.
pub const SLOT_COUNT: usize = 8;

/// Number of competing clients.
pub const CLIENT_COUNT: usize = 3;

// =============================================================================
// Clients
// =============================================================================

/// A display read path competing for output-buffer slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObufClient {
    /// Primary DSI port.
    Dsi0,
    /// Secondary DSI port.
    Dsi1,
    /// External DisplayPort path.
    Dp,
}

impl ObufClient {
    /// All clients, table order.
    pub const ALL: [Self; CLIENT_COUNT] = [Self::Dsi0, Self::Dsi1, Self::Dp];

    /// Table index of this client.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            ObufClient::Dsi0 => 0,
            ObufClient::Dsi1 => 1,
            ObufClient::Dp => 2,
        }
    }

    /// Name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            ObufClient::Dsi0 => "dsi0",
            ObufClient::Dsi1 => "dsi1",
            ObufClient::Dp => "dp",
        }
    }
}

// =============================================================================
// Slot Mask
// =============================================================================

/// Set of output-buffer slots.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotMask(u16);

impl SlotMask {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Build from a raw bit word.
    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & ((1 << SLOT_COUNT) - 1))
    }

    /// Raw bit word.
    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True if the sets share any slot.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Set difference.
    #[inline]
    #[must_use]
    pub const fn minus(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// True if no slots are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for SlotMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotMask({:#010b})", self.0)
    }
}

// =============================================================================
// Scenes
// =============================================================================

/// Panel port topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortMode {
    /// One DSI port drives the panel.
    Single,
    /// Both DSI ports drive the panel.
    Dual,
}

/// External display plug state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlugState {
    /// No external display.
    Unplugged,
    /// External display connected.
    Plugged,
}

/// Classification of the current display topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scene {
    /// Panel port topology.
    pub ports: PortMode,
    /// External plug state.
    pub plug: PlugState,
}

impl Scene {
    /// Scene table row index.
    #[inline]
    pub const fn row(self) -> usize {
        let port = match self.ports {
            PortMode::Single => 0,
            PortMode::Dual => 1,
        };
        let plug = match self.plug {
            PlugState::Unplugged => 0,
            PlugState::Plugged => 1,
        };
        port * 2 + plug
    }

    /// Slots this scene grants to `client`.
    #[inline]
    pub const fn allocation(self, client: ObufClient) -> SlotMask {
        SCENE_TABLE[self.row()][client.index()]
    }
}

/// Number of scene rows.
pub const SCENE_COUNT: usize = 4;

/// Static slot partition per scene, one row per [`Scene::row`] value,
/// columns in [`ObufClient::ALL`] order.
///
/// A single unplugged panel concentrates its bandwidth in the lower
/// slot half; plugging an external display carves the upper slots of
/// that half out for DP; dual-port panels split the half between the
/// two DSI paths.
const SCENE_TABLE: [[SlotMask; CLIENT_COUNT]; SCENE_COUNT] = [
    // Single / Unplugged
    [
        SlotMask::from_bits(0b0000_1111),
        SlotMask::EMPTY,
        SlotMask::EMPTY,
    ],
    // Single / Plugged
    [
        SlotMask::from_bits(0b0000_0011),
        SlotMask::EMPTY,
        SlotMask::from_bits(0b0000_1100),
    ],
    // Dual / Unplugged
    [
        SlotMask::from_bits(0b0000_0011),
        SlotMask::from_bits(0b0000_1100),
        SlotMask::EMPTY,
    ],
    // Dual / Plugged
    [
        SlotMask::from_bits(0b0000_0011),
        SlotMask::from_bits(0b0000_0100),
        SlotMask::from_bits(0b0000_1000),
    ],
];

/// Within any one row, all client masks must be pairwise disjoint.
const fn table_is_disjoint() -> bool {
    let mut row = 0;
    while row < SCENE_COUNT {
        let mut a = 0;
        while a < CLIENT_COUNT {
            let mut b = a + 1;
            while b < CLIENT_COUNT {
                if SCENE_TABLE[row][a].intersects(SCENE_TABLE[row][b]) {
                    return false;
                }
                b += 1;
            }
            a += 1;
        }
        row += 1;
    }
    true
}

const_assert!(table_is_disjoint());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_pairwise_disjoint() {
        // Exhaustive runtime mirror of the compile-time check.
        for row in 0..SCENE_COUNT {
            for a in 0..CLIENT_COUNT {
                for b in (a + 1)..CLIENT_COUNT {
                    assert!(
                        !SCENE_TABLE[row][a].intersects(SCENE_TABLE[row][b]),
                        "row {} clients {} and {} overlap",
                        row,
                        a,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn test_row_indices_distinct() {
        let scenes = [
            Scene { ports: PortMode::Single, plug: PlugState::Unplugged },
            Scene { ports: PortMode::Single, plug: PlugState::Plugged },
            Scene { ports: PortMode::Dual, plug: PlugState::Unplugged },
            Scene { ports: PortMode::Dual, plug: PlugState::Plugged },
        ];
        for (i, s) in scenes.iter().enumerate() {
            assert_eq!(s.row(), i);
        }
    }

    #[test]
    fn test_single_unplugged_gives_dsi0_four_slots() {
        let scene = Scene {
            ports: PortMode::Single,
            plug: PlugState::Unplugged,
        };
        assert_eq!(scene.allocation(ObufClient::Dsi0).bits(), 0b1111);
        assert!(scene.allocation(ObufClient::Dsi1).is_empty());
        assert!(scene.allocation(ObufClient::Dp).is_empty());
    }

    #[test]
    fn test_slot_mask_ops() {
        let a = SlotMask::from_bits(0b0011);
        let b = SlotMask::from_bits(0b0110);
        assert_eq!(a.union(b).bits(), 0b0111);
        assert_eq!(a.minus(b).bits(), 0b0001);
        assert!(a.intersects(b));
    }
}
