// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Virtual-to-physical flash sector mapping.
//!
//! The wire protocol addresses flash in 4 KiB logical sectors, decoupled
//! from the hardware erase geometry: physical sectors 0..16 are 4 KiB
//! (1:1 with logical), physical sectors 16 and up are 32 KiB and hold
//! eight logical blocks each.

/// One transferred block: the unit of integrity checking and flashing.
pub const BLOCK_SIZE: usize = 4096;

/// Highest addressable logical sector.
pub const LOGICAL_SECTOR_MAX: u8 = 127;

/// Logical sectors at and above this hold the bootloader's own code and
/// must never be programmed by a remote request.
pub const PROTECTED_SECTOR_START: u8 = 120;

/// Where a logical sector lands in hardware flash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhysicalLocation {
    /// Hardware erase unit.
    pub sector: u8,
    /// Byte offset of the logical block within that erase unit.
    pub offset: u32,
}

impl PhysicalLocation {
    /// Erase and blank-check run only for the first logical block landing
    /// in a physical sector; erasing on every write would destroy blocks
    /// already written to the same 32 KiB sector.
    pub fn is_first_in_sector(&self) -> bool {
        self.offset == 0
    }
}

/// Map a logical sector to its physical location. `None` for logical
/// sectors outside [0, 127].
pub fn map_logical(logical: u8) -> Option<PhysicalLocation> {
    if logical > LOGICAL_SECTOR_MAX {
        return None;
    }
    if logical < 16 {
        Some(PhysicalLocation {
            sector: logical,
            offset: 0,
        })
    } else {
        Some(PhysicalLocation {
            sector: (logical - 16) / 8 + 16,
            offset: (logical % 8) as u32 * BLOCK_SIZE as u32,
        })
    }
}

/// True for logical sectors inside the bootloader's protected range.
pub fn is_protected(logical: u8) -> bool {
    logical >= PROTECTED_SECTOR_START
}
