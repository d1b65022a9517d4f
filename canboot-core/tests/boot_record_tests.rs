// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Unit tests for boot record persistence and the sector-0 redirect.

use canboot_core::boot_record::{BootRecordStore, BootVectors, ByteStore};
use canboot_core::flash::DataBlock;

/// Byte-addressed storage backed by a plain array, standing in for the
/// external EEPROM.
struct ArrayStore {
    bytes: [u8; 64],
}

impl ArrayStore {
    fn new() -> Self {
        // Fresh non-volatile storage reads as the erased value
        Self { bytes: [0xFF; 64] }
    }
}

impl ByteStore for ArrayStore {
    fn save_byte(&mut self, addr: u16, byte: u8) {
        self.bytes[addr as usize] = byte;
    }
    fn load_byte(&self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }
}

#[test]
fn test_save_load_roundtrip() {
    let mut store = BootRecordStore::new(ArrayStore::new());
    store.save(0x0000_1234, 0x2000_8000);
    assert_eq!(store.load_start(), 0x0000_1234);
    assert_eq!(store.load_stack(), 0x2000_8000);
}

#[test]
fn test_roundtrip_extremes() {
    for (start, stack) in [
        (0x0000_0000u32, 0x0000_0000u32),
        (0xFFFF_FFFF, 0xFFFF_FFFF),
        (0x0000_0000, 0xFFFF_FFFF),
        (0xFFFF_FFFF, 0x0000_0000),
    ] {
        let mut store = BootRecordStore::new(ArrayStore::new());
        store.save(start, stack);
        assert_eq!((store.load_start(), store.load_stack()), (start, stack));
    }
}

#[test]
fn test_save_overwrites_previous_record() {
    let mut store = BootRecordStore::new(ArrayStore::new());
    store.save(0x1111_1111, 0x2222_2222);
    store.save(0x3333_3333, 0x4444_4444);
    assert_eq!(store.load_start(), 0x3333_3333);
    assert_eq!(store.load_stack(), 0x4444_4444);
}

#[test]
fn test_capture_and_redirect_sector_zero_block() {
    let mut store = BootRecordStore::new(ArrayStore::new());
    let bootloader = BootVectors {
        start: 0x0000_00C1,
        stack: 0x1000_8000,
    };

    let mut block = DataBlock::new();
    block.sector = 0;
    // Incoming image: initial SP first, reset vector second (vector
    // table order), little-endian
    block.data[0..4].copy_from_slice(&0x2000u32.to_le_bytes());
    block.data[4..8].copy_from_slice(&0x1000u32.to_le_bytes());
    block.data[8] = 0xEE; // rest of the block untouched

    store.capture_and_redirect(&mut block, bootloader);

    // The application's vectors went to the store...
    assert_eq!(store.load_start(), 0x1000);
    assert_eq!(store.load_stack(), 0x2000);

    // ...and the outgoing block carries the bootloader's own vectors
    assert_eq!(&block.data[0..4], &0x1000_8000u32.to_le_bytes());
    assert_eq!(&block.data[4..8], &0x0000_00C1u32.to_le_bytes());
    assert_eq!(block.data[8], 0xEE);
}
