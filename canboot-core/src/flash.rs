// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash programming: the commit sequence for one logical block.
//!
//! The hardware flash controller is reached through [`FlashDevice`]; the
//! core never touches peripheral registers. A commit runs
//! prepare -> (erase -> blank-check -> prepare, first block only) ->
//! write -> compare. The second prepare is required because an erase
//! de-prepares the sector. Compare is the sole attestation that the
//! write took: the hardware does not verify writes on its own.

use crate::sector::{self, BLOCK_SIZE};

/// Result of a single flash device operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashOp {
    Success,
    /// The sector or offset does not exist on this device.
    AddressInvalid,
    /// The device reported a write, blank-check or compare mismatch.
    OperationFailed,
}

/// Why a block commit was aborted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashError {
    /// Sector out of range, or an address the device rejected.
    InvalidAddress,
    /// The request targeted the bootloader's own protected sector range.
    BootloaderSector,
    /// A write, blank-check or read-back compare failed; likely hardware
    /// degradation rather than something a retry will fix.
    CompareFailure,
}

/// The flash peripheral, physical-sector addressed.
///
/// Erase and write block the whole node on real hardware (interrupts
/// disabled for the duration); implementations must not be re-entered.
pub trait FlashDevice {
    /// Unlock a physical sector for the next erase or write. Idempotent.
    /// Any erase or write de-prepares the sector again.
    fn prepare(&mut self, sector: u8) -> FlashOp;

    /// Fill a physical sector with the erased value. Destructive; must
    /// never be reordered after `write`.
    fn erase(&mut self, sector: u8) -> FlashOp;

    /// Confirm a physical sector reads back fully erased.
    fn check_blank(&mut self, sector: u8) -> FlashOp;

    /// Copy one block into flash at `offset` within the sector. Requires
    /// a fresh `prepare`.
    fn write(&mut self, data: &[u8; BLOCK_SIZE], sector: u8, offset: u32) -> FlashOp;

    /// Read back and byte-compare one block.
    fn compare(&mut self, data: &[u8; BLOCK_SIZE], sector: u8, offset: u32) -> FlashOp;
}

/// One 4 KiB firmware block plus its logical sector. Owned by the node's
/// transfer session and reused across transfers, never reallocated.
pub struct DataBlock {
    pub data: [u8; BLOCK_SIZE],
    pub sector: u8,
}

impl DataBlock {
    pub fn new() -> Self {
        Self {
            data: [0u8; BLOCK_SIZE],
            sector: 0,
        }
    }
}

impl Default for DataBlock {
    fn default() -> Self {
        Self::new()
    }
}

fn step(op: FlashOp) -> Result<(), FlashError> {
    match op {
        FlashOp::Success => Ok(()),
        FlashOp::AddressInvalid => Err(FlashError::InvalidAddress),
        FlashOp::OperationFailed => Err(FlashError::CompareFailure),
    }
}

/// Commit one received block to flash.
///
/// Protected-range and mapping checks run before the device is touched;
/// a rejected request performs zero flash operations.
pub fn commit_block<F: FlashDevice>(dev: &mut F, block: &DataBlock) -> Result<(), FlashError> {
    if sector::is_protected(block.sector) {
        return Err(FlashError::BootloaderSector);
    }
    let loc = sector::map_logical(block.sector).ok_or(FlashError::InvalidAddress)?;

    step(dev.prepare(loc.sector))?;

    if loc.is_first_in_sector() {
        step(dev.erase(loc.sector))?;
        step(dev.check_blank(loc.sector))?;
        // Erase de-prepared the sector
        step(dev.prepare(loc.sector))?;
    }

    step(dev.write(&block.data, loc.sector, loc.offset))?;
    step(dev.compare(&block.data, loc.sector, loc.offset))?;

    Ok(())
}
