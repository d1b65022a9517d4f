// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot record persistence and the reset-redirect trick.
//!
//! The boot record is the application's (entry pointer, initial stack
//! pointer) pair, persisted at a fixed location so the bootloader can
//! hand off control after its boot window expires.
//!
//! When logical sector 0 — the boot-vector sector — is programmed, the
//! incoming image carries the application's own vectors in its first
//! eight bytes. Those are captured into the store and the outgoing block
//! is rewritten to carry the bootloader's vectors instead, before the
//! block ever reaches the flash controller. After any reset the processor
//! therefore vectors into the bootloader first, never directly into the
//! application.

use crate::flash::DataBlock;

/// Byte-addressed non-volatile storage (external EEPROM or a reserved
/// flash word); the driver behind it is an external collaborator.
pub trait ByteStore {
    fn save_byte(&mut self, addr: u16, byte: u8);
    fn load_byte(&self, addr: u16) -> u8;
}

/// Fixed boot record layout: stack pointer first, entry pointer second,
/// matching the Cortex-M vector table order. Little-endian.
const STACK_POINTER_ADDR: u16 = 0;
const START_POINTER_ADDR: u16 = 4;

/// A reset-entry / initial-stack pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootVectors {
    pub start: u32,
    pub stack: u32,
}

/// Persists the application's boot vectors.
pub struct BootRecordStore<S: ByteStore> {
    store: S,
}

impl<S: ByteStore> BootRecordStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Persist both pointers at their fixed addresses.
    pub fn save(&mut self, start: u32, stack: u32) {
        self.write_u32(START_POINTER_ADDR, start);
        self.write_u32(STACK_POINTER_ADDR, stack);
    }

    pub fn load_start(&self) -> u32 {
        self.read_u32(START_POINTER_ADDR)
    }

    pub fn load_stack(&self) -> u32 {
        self.read_u32(STACK_POINTER_ADDR)
    }

    /// Capture the incoming application's vectors from a sector-0 block
    /// and redirect the block to the bootloader's own vectors.
    ///
    /// Must run before the block is handed to the flash controller.
    pub fn capture_and_redirect(&mut self, block: &mut DataBlock, bootloader: BootVectors) {
        let stack = u32::from_le_bytes([block.data[0], block.data[1], block.data[2], block.data[3]]);
        let start = u32::from_le_bytes([block.data[4], block.data[5], block.data[6], block.data[7]]);
        self.save(start, stack);

        block.data[0..4].copy_from_slice(&bootloader.stack.to_le_bytes());
        block.data[4..8].copy_from_slice(&bootloader.start.to_le_bytes());
    }

    fn write_u32(&mut self, addr: u16, value: u32) {
        for (i, byte) in value.to_le_bytes().iter().enumerate() {
            self.store.save_byte(addr + i as u16, *byte);
        }
    }

    fn read_u32(&self, addr: u16) -> u32 {
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.store.load_byte(addr + i as u16);
        }
        u32::from_le_bytes(bytes)
    }
}
