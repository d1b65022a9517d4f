// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the node control loop: boot window, residency, reset and
//! block servicing.

use std::cell::Cell;
use std::collections::VecDeque;

use canboot_core::boot_record::{BootVectors, ByteStore};
use canboot_core::bus::{Clock, FrameBus};
use canboot_core::flash::{FlashDevice, FlashOp};
use canboot_core::frame::{CanFrame, Message, OutcomeFlags};
use canboot_core::integrity::block_digest;
use canboot_core::runtime::{Handoff, NodeConfig, NodeRuntime};
use canboot_core::sector::BLOCK_SIZE;

const SERIAL: u32 = 0x0000_0042;

const BOOTLOADER_VECTORS: BootVectors = BootVectors {
    start: 0x0000_00C1,
    stack: 0x1000_8000,
};

/// Pre-scripted incoming traffic plus a capture of everything sent.
struct ScriptedBus {
    incoming: VecDeque<CanFrame>,
    sent: Vec<CanFrame>,
}

impl ScriptedBus {
    fn new(messages: &[Message]) -> Self {
        Self {
            incoming: messages.iter().map(|m| m.encode()).collect(),
            sent: Vec::new(),
        }
    }
}

impl FrameBus for &mut ScriptedBus {
    fn try_recv(&mut self) -> Option<CanFrame> {
        self.incoming.pop_front()
    }
    fn send(&mut self, frame: &CanFrame) {
        self.sent.push(*frame);
    }
}

/// Advances one millisecond per observation.
struct TickClock {
    now: Cell<u64>,
}

impl TickClock {
    fn new() -> Self {
        Self { now: Cell::new(0) }
    }
}

impl Clock for TickClock {
    fn now_ms(&self) -> u64 {
        let t = self.now.get();
        self.now.set(t + 1);
        t
    }
}

struct MemFlash {
    sectors: Vec<Vec<u8>>,
    prepared: Option<u8>,
}

impl MemFlash {
    fn new() -> Self {
        Self {
            sectors: (0..30u8)
                .map(|s| vec![0xFF; if s < 16 { 4096 } else { 32 * 1024 }])
                .collect(),
            prepared: None,
        }
    }
}

impl FlashDevice for &mut MemFlash {
    fn prepare(&mut self, sector: u8) -> FlashOp {
        if sector >= 30 {
            return FlashOp::AddressInvalid;
        }
        self.prepared = Some(sector);
        FlashOp::Success
    }
    fn erase(&mut self, sector: u8) -> FlashOp {
        if self.prepared != Some(sector) {
            return FlashOp::OperationFailed;
        }
        self.sectors[sector as usize].fill(0xFF);
        self.prepared = None;
        FlashOp::Success
    }
    fn check_blank(&mut self, sector: u8) -> FlashOp {
        if self.sectors[sector as usize].iter().all(|&b| b == 0xFF) {
            FlashOp::Success
        } else {
            FlashOp::OperationFailed
        }
    }
    fn write(&mut self, data: &[u8; BLOCK_SIZE], sector: u8, offset: u32) -> FlashOp {
        if self.prepared != Some(sector) {
            return FlashOp::OperationFailed;
        }
        self.sectors[sector as usize][offset as usize..offset as usize + BLOCK_SIZE]
            .copy_from_slice(data);
        self.prepared = None;
        FlashOp::Success
    }
    fn compare(&mut self, data: &[u8; BLOCK_SIZE], sector: u8, offset: u32) -> FlashOp {
        if &self.sectors[sector as usize][offset as usize..offset as usize + BLOCK_SIZE]
            == data
        {
            FlashOp::Success
        } else {
            FlashOp::OperationFailed
        }
    }
}

struct ArrayStore {
    bytes: [u8; 64],
}

impl ByteStore for &mut ArrayStore {
    fn save_byte(&mut self, addr: u16, byte: u8) {
        self.bytes[addr as usize] = byte;
    }
    fn load_byte(&self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }
}

fn config() -> NodeConfig {
    NodeConfig {
        boot_wait_ms: 50,
        bootloader_vectors: BOOTLOADER_VECTORS,
    }
}

/// Build the frame sequence for one complete block transfer.
fn block_transfer(sector: u8, payload: &[u8; BLOCK_SIZE]) -> Vec<Message> {
    let mut msgs = vec![
        Message::SelectNode { serial: SERIAL },
        Message::BeginBlock { sector },
    ];
    for chunk in payload.chunks(8) {
        let mut data = [0u8; 8];
        data.copy_from_slice(chunk);
        msgs.push(Message::DataChunk { data });
    }
    msgs.push(Message::IntegrityCheck {
        digest: block_digest(payload),
    });
    msgs
}

fn outcomes(sent: &[CanFrame]) -> Vec<OutcomeFlags> {
    sent.iter()
        .filter_map(|f| match Message::decode(f) {
            Some(Message::BlockOutcome { flags, .. }) => Some(flags),
            _ => None,
        })
        .collect()
}

#[test]
fn test_boot_window_expiry_hands_off_to_stored_vectors() {
    let mut bus = ScriptedBus::new(&[]);
    let mut dev = MemFlash::new();
    let mut store = ArrayStore { bytes: [0xFF; 64] };
    // Pre-existing boot record from an earlier campaign
    canboot_core::boot_record::BootRecordStore::new(&mut store).save(0x0000_1000, 0x2000_4000);

    let mut node = NodeRuntime::new(
        SERIAL,
        &mut bus,
        &mut dev,
        &mut store,
        TickClock::new(),
        config(),
    );

    assert_eq!(
        node.run(),
        Handoff::Application {
            start: 0x0000_1000,
            stack: 0x2000_4000,
        }
    );
}

#[test]
fn test_enter_bootloader_keeps_node_resident_until_reset() {
    // Far more clock ticks pass than the boot window allows; the node
    // must still be listening when the reset finally arrives.
    let mut msgs = vec![Message::EnterBootloader];
    for _ in 0..200 {
        msgs.push(Message::IdentifyRequest);
    }
    msgs.push(Message::ResetNode);

    let mut bus = ScriptedBus::new(&msgs);
    let mut dev = MemFlash::new();
    let mut store = ArrayStore { bytes: [0xFF; 64] };

    let mut node = NodeRuntime::new(
        SERIAL,
        &mut bus,
        &mut dev,
        &mut store,
        TickClock::new(),
        config(),
    );

    assert_eq!(node.run(), Handoff::Reset);
    // It kept answering identify requests the whole time
    assert!(bus.sent.len() >= 200);
}

#[test]
fn test_block_is_flashed_and_acknowledged() {
    let payload = [0xABu8; BLOCK_SIZE];
    let mut msgs = vec![Message::EnterBootloader];
    msgs.extend(block_transfer(9, &payload));
    msgs.push(Message::ResetNode);

    let mut bus = ScriptedBus::new(&msgs);
    let mut dev = MemFlash::new();
    let mut store = ArrayStore { bytes: [0xFF; 64] };

    let mut node = NodeRuntime::new(
        SERIAL,
        &mut bus,
        &mut dev,
        &mut store,
        TickClock::new(),
        config(),
    );
    assert_eq!(node.run(), Handoff::Reset);

    let flags = outcomes(&bus.sent);
    assert_eq!(flags.len(), 1);
    assert!(flags[0].is_success());
    assert!(dev.sectors[9].iter().all(|&b| b == 0xAB));
}

#[test]
fn test_sector_zero_commit_redirects_vectors() {
    let mut payload = [0x00u8; BLOCK_SIZE];
    payload[0..4].copy_from_slice(&0x2000u32.to_le_bytes()); // app stack
    payload[4..8].copy_from_slice(&0x1000u32.to_le_bytes()); // app entry

    let mut msgs = vec![Message::EnterBootloader];
    msgs.extend(block_transfer(0, &payload));
    msgs.push(Message::ResetNode);

    let mut bus = ScriptedBus::new(&msgs);
    let mut dev = MemFlash::new();
    let mut store = ArrayStore { bytes: [0xFF; 64] };

    let mut node = NodeRuntime::new(
        SERIAL,
        &mut bus,
        &mut dev,
        &mut store,
        TickClock::new(),
        config(),
    );
    assert_eq!(node.run(), Handoff::Reset);
    assert!(outcomes(&bus.sent)[0].is_success());

    // Flash holds the bootloader's vectors, never the application's
    assert_eq!(
        &dev.sectors[0][0..4],
        &BOOTLOADER_VECTORS.stack.to_le_bytes()
    );
    assert_eq!(
        &dev.sectors[0][4..8],
        &BOOTLOADER_VECTORS.start.to_le_bytes()
    );

    // The application's vectors were persisted for the next handoff
    let mut bus2 = ScriptedBus::new(&[]);
    let mut dev2 = MemFlash::new();
    let mut node2 = NodeRuntime::new(
        SERIAL,
        &mut bus2,
        &mut dev2,
        &mut store,
        TickClock::new(),
        config(),
    );
    assert_eq!(
        node2.run(),
        Handoff::Application {
            start: 0x1000,
            stack: 0x2000,
        }
    );
}

#[test]
fn test_protected_sector_block_is_nacked_without_flashing() {
    let payload = [0x5Au8; BLOCK_SIZE];
    let mut msgs = vec![Message::EnterBootloader];
    msgs.extend(block_transfer(125, &payload));
    msgs.push(Message::ResetNode);

    let mut bus = ScriptedBus::new(&msgs);
    let mut dev = MemFlash::new();
    let mut store = ArrayStore { bytes: [0xFF; 64] };

    let mut node = NodeRuntime::new(
        SERIAL,
        &mut bus,
        &mut dev,
        &mut store,
        TickClock::new(),
        config(),
    );
    assert_eq!(node.run(), Handoff::Reset);

    let flags = outcomes(&bus.sent);
    assert_eq!(flags.len(), 1);
    assert!(flags[0].integrity_ok);
    assert!(!flags[0].flash_ok);
    // Nothing was written anywhere
    assert!(dev
        .sectors
        .iter()
        .all(|s| s.iter().all(|&b| b == 0xFF)));
}
