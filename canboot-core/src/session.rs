// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Node-side protocol state machine.
//!
//! One [`TransferSession`] per node, created at protocol init and reused
//! for every transfer. It owns the single data block, a bounds-checked
//! receive cursor and the integrity accumulator; no concurrent sessions
//! exist. Selection persists until a reset or power cycle; the sector,
//! cursor and accumulator are reset by every `BeginBlock`.

use crate::bus::FrameBus;
use crate::flash::{DataBlock, FlashError};
use crate::frame::{Message, OutcomeFlags};
use crate::integrity::BlockIntegrity;
use crate::sector::BLOCK_SIZE;

/// What the enclosing control loop must do after a handled message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeAction {
    /// Nothing further.
    None,
    /// Latch the resident flag: stay in the bootloader past the boot window.
    EnterBootloader,
    /// A block verified clean and is ready to be committed to flash.
    BlockReady,
    /// Perform a controlled reset.
    ResetRequested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReceiveState {
    /// No block in flight; waiting for `BeginBlock`.
    Idle,
    /// Accumulating data chunks for the current block.
    AwaitingData,
}

/// Per-transfer session state on the bootloader side.
pub struct TransferSession {
    serial: u32,
    selected: bool,
    state: ReceiveState,
    cursor: usize,
    block: DataBlock,
    integrity: BlockIntegrity,
}

impl TransferSession {
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            selected: false,
            state: ReceiveState::Idle,
            cursor: 0,
            block: DataBlock::new(),
            integrity: BlockIntegrity::new(),
        }
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// The verified block, valid after `handle` returned `BlockReady`.
    pub fn block_mut(&mut self) -> &mut DataBlock {
        &mut self.block
    }

    /// Consume one received message and advance the session.
    pub fn handle<B: FrameBus>(&mut self, msg: &Message, bus: &mut B) -> NodeAction {
        match *msg {
            Message::EnterBootloader => NodeAction::EnterBootloader,

            Message::IdentifyRequest => {
                bus.send(
                    &Message::IdentifyResponse {
                        serial: self.serial,
                    }
                    .encode(),
                );
                NodeAction::None
            }

            Message::SelectNode { serial } => {
                // First selection wins; a mismatched ID cannot steal an
                // already-selected session.
                if serial == self.serial {
                    self.selected = true;
                }
                NodeAction::None
            }

            Message::BeginBlock { sector } => {
                if !self.selected {
                    return NodeAction::None;
                }
                // An incomplete in-flight block is discarded unconditionally.
                self.block.sector = sector;
                self.cursor = 0;
                self.integrity.begin_block();
                self.state = ReceiveState::AwaitingData;
                NodeAction::None
            }

            Message::DataChunk { data } => {
                if !self.selected || self.state != ReceiveState::AwaitingData {
                    return NodeAction::None;
                }
                if self.cursor + data.len() > BLOCK_SIZE {
                    // More data than the block can hold: frames were
                    // dropped or duplicated somewhere upstream.
                    self.report_desync(bus);
                    return NodeAction::None;
                }
                self.block.data[self.cursor..self.cursor + data.len()].copy_from_slice(&data);
                self.cursor += data.len();
                self.integrity.update(&data);
                NodeAction::None
            }

            Message::IntegrityCheck { digest } => {
                if !self.selected {
                    return NodeAction::None;
                }
                if self.cursor != BLOCK_SIZE {
                    // The digest arrived before the expected byte count;
                    // the transfer restarts at the next BeginBlock.
                    self.report_desync(bus);
                    return NodeAction::None;
                }
                self.state = ReceiveState::Idle;
                if self.integrity.verify(digest) {
                    NodeAction::BlockReady
                } else {
                    self.send_outcome(
                        OutcomeFlags {
                            integrity_ok: false,
                            flash_ok: false,
                            desync: false,
                        },
                        bus,
                    );
                    NodeAction::None
                }
            }

            Message::ResetNode => NodeAction::ResetRequested,

            // Initiator-bound traffic from other nodes; not ours to act on.
            Message::IdentifyResponse { .. } | Message::BlockOutcome { .. } => NodeAction::None,
        }
    }

    /// Send the single reply frame for a completed block attempt.
    pub fn report_outcome<B: FrameBus>(&mut self, flash: &Result<(), FlashError>, bus: &mut B) {
        self.send_outcome(
            OutcomeFlags {
                integrity_ok: true,
                flash_ok: flash.is_ok(),
                desync: false,
            },
            bus,
        );
    }

    /// Protocol desync: reset the session to idle (selection kept) and
    /// report it, instead of halting and waiting for the watchdog.
    fn report_desync<B: FrameBus>(&mut self, bus: &mut B) {
        self.state = ReceiveState::Idle;
        self.cursor = 0;
        self.integrity.begin_block();
        self.send_outcome(
            OutcomeFlags {
                integrity_ok: false,
                flash_ok: false,
                desync: true,
            },
            bus,
        );
    }

    fn send_outcome<B: FrameBus>(&self, flags: OutcomeFlags, bus: &mut B) {
        bus.send(
            &Message::BlockOutcome {
                serial: self.serial,
                flags,
            }
            .encode(),
        );
    }
}
