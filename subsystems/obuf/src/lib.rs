//! # Prism Obuf
//!
//! Arbitration of the shared output line-buffer across display clients.
//!
//! The output buffer is a scarce hardware resource divided into
//! bit-addressable slots. Slots are statically partitioned per scene
//! (panel port topology and external-display plug state) across the DSI
//! and DP read paths. Because a slot may only move between clients once
//! the prior owner has finished scanning out of it, reallocation runs a
//! check/commit/done three-phase handshake that decouples "software
//! decided" from "hardware switched".
//!
//! ## Modules
//!
//! - [`scene`] - Scenes, slot masks and the static allocation table
//! - [`arbiter`] - The three-phase arbiter

#![cfg_attr(not(feature = "std"), no_std)]

pub mod arbiter;
pub mod scene;

pub use arbiter::{ObufArbiter, ObufCheck};
pub use scene::{ObufClient, PlugState, PortMode, Scene, SlotMask, CLIENT_COUNT, SLOT_COUNT};
