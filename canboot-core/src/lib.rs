// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Core logic for the CAN field firmware-update system.
//!
//! One node on the bus (the programmer) discovers its peers, selects
//! targets and streams a firmware image to them in 4 KiB blocks; every
//! other node runs the bootloader side, which verifies each block,
//! commits it to flash and decides on the next boot whether to run the
//! application or stay resident.
//!
//! This crate supports both `no_std` (embedded) and `std` (host)
//! environments:
//! - Default: `no_std` mode for embedded targets
//! - `std` feature: enables `std` support for host tools
//!
//! Hardware is never touched directly. The CAN controller, the flash
//! peripheral, the boot-record storage and the millisecond timer are
//! reached through the [`bus::FrameBus`], [`flash::FlashDevice`],
//! [`boot_record::ByteStore`] and [`bus::Clock`] traits, so the whole
//! protocol runs unmodified under host-side tests.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod boot_record;
pub mod bus;
pub mod flash;
pub mod frame;
pub mod integrity;
pub mod programmer;
pub mod runtime;
pub mod sector;
pub mod session;

// Re-export commonly used types
pub use boot_record::{BootRecordStore, BootVectors, ByteStore};
pub use bus::{Clock, FrameBus};
pub use flash::{DataBlock, FlashDevice, FlashError, FlashOp};
pub use frame::{CanFrame, Message, OutcomeFlags};
pub use programmer::{DiscoverError, NodeList, ProgramError, Programmer, ProgrammerConfig};
pub use runtime::{Handoff, NodeConfig, NodeRuntime};
pub use sector::{map_logical, PhysicalLocation, BLOCK_SIZE};
pub use session::{NodeAction, TransferSession};
