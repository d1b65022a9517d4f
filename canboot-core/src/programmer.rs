// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Initiator side of the update protocol.
//!
//! The programmer forces the network into update mode, discovers peers,
//! selects targets and streams the image block by block, tallying one
//! outcome frame per selected node after each block. Selection is
//! fire-and-forget: whether a target took its selection shows up in
//! whether it answers the later block outcomes.

use heapless::Vec;

use crate::bus::{Clock, FrameBus};
use crate::frame::Message;
use crate::integrity::block_digest;
use crate::sector::{BLOCK_SIZE, LOGICAL_SECTOR_MAX};

/// Hard cap on discovered nodes. There is no dynamic growth on the
/// embedded programmer; exceeding this is an error, not a reallocation.
pub const MAX_NODES: usize = 512;

/// The serials discovered in one round, in registration order.
pub type NodeList = Vec<u32, MAX_NODES>;

/// Timing and retry policy for one programming campaign.
#[derive(Clone, Copy, Debug)]
pub struct ProgrammerConfig {
    /// How long to spam `EnterBootloader` so running applications drop
    /// back into update mode.
    pub enter_window_ms: u64,
    /// How long to wait for identify responses; re-armed on every reply.
    pub discover_window_ms: u64,
    /// How long to wait for block outcomes; re-armed on every reply.
    pub reply_timeout_ms: u64,
    /// Whole-block attempts before a block is declared failed. There is
    /// no partial retransmission; a retry resends the block from the top.
    pub block_attempts: u8,
}

impl Default for ProgrammerConfig {
    fn default() -> Self {
        Self {
            enter_window_ms: 2000,
            discover_window_ms: 20,
            reply_timeout_ms: 500,
            block_attempts: 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscoverError {
    /// More nodes registered than the fixed node table can hold.
    TooManyNodes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramError {
    /// The image runs past the last addressable logical sector.
    ImageTooLarge,
    /// A block was not acknowledged clean by every target within the
    /// attempt limit.
    BlockFailed { sector: u8 },
}

/// Driver for one programming campaign.
pub struct Programmer<B: FrameBus, C: Clock> {
    bus: B,
    clock: C,
    config: ProgrammerConfig,
}

impl<B: FrameBus, C: Clock> Programmer<B, C> {
    pub fn new(bus: B, clock: C, config: ProgrammerConfig) -> Self {
        Self { bus, clock, config }
    }

    /// Discover the bootloaders on the bus.
    ///
    /// Spams `EnterBootloader` for the configured window, drains stale
    /// traffic, then broadcasts one identify request and collects
    /// responses until the reply window lapses, deduplicating by serial.
    pub fn discover(&mut self) -> Result<NodeList, DiscoverError> {
        let enter = Message::EnterBootloader.encode();
        let deadline = self.clock.now_ms() + self.config.enter_window_ms;
        while self.clock.now_ms() < deadline {
            self.bus.send(&enter);
        }

        // Drop everything received up to now
        while self.bus.try_recv().is_some() {}

        self.bus.send(&Message::IdentifyRequest.encode());

        let mut list = NodeList::new();
        let mut deadline = self.clock.now_ms() + self.config.discover_window_ms;
        while self.clock.now_ms() < deadline {
            let Some(frame) = self.bus.try_recv() else {
                continue;
            };
            if let Some(Message::IdentifyResponse { serial }) = Message::decode(&frame) {
                if !list.contains(&serial) {
                    if list.push(serial).is_err() {
                        return Err(DiscoverError::TooManyNodes);
                    }
                    deadline = self.clock.now_ms() + self.config.discover_window_ms;
                }
            }
        }

        Ok(list)
    }

    /// Select every listed node for programming. No acknowledgement is
    /// defined for selection.
    pub fn select_targets(&mut self, list: &NodeList) {
        for &serial in list {
            self.bus.send(&Message::SelectNode { serial }.encode());
        }
    }

    /// Transmit one block to the selected nodes and await their verdicts.
    ///
    /// Returns true iff every listed node acknowledged the block with
    /// both the integrity and the flash bit set, within the attempt
    /// limit. Outcomes are attributed per serial, not merely counted.
    pub fn send_block(&mut self, list: &NodeList, sector: u8, payload: &[u8; BLOCK_SIZE]) -> bool {
        for _ in 0..self.config.block_attempts.max(1) {
            if self.attempt_block(list, sector, payload) {
                return true;
            }
        }
        false
    }

    fn attempt_block(&mut self, list: &NodeList, sector: u8, payload: &[u8; BLOCK_SIZE]) -> bool {
        // Stale outcomes from an earlier attempt must not count here
        while self.bus.try_recv().is_some() {}

        self.bus.send(&Message::BeginBlock { sector }.encode());

        for chunk in payload.chunks(8) {
            let mut data = [0u8; 8];
            data.copy_from_slice(chunk);
            self.bus.send(&Message::DataChunk { data }.encode());
        }

        let digest = block_digest(payload);
        self.bus.send(&Message::IntegrityCheck { digest }.encode());

        let mut pending: NodeList = list.clone();
        let mut deadline = self.clock.now_ms() + self.config.reply_timeout_ms;
        while self.clock.now_ms() < deadline && !pending.is_empty() {
            let Some(frame) = self.bus.try_recv() else {
                continue;
            };
            let Some(Message::BlockOutcome { serial, flags }) = Message::decode(&frame) else {
                continue;
            };
            let Some(pos) = pending.iter().position(|&s| s == serial) else {
                continue;
            };
            if !flags.is_success() {
                // An explicit negative verdict fails the attempt; the
                // caller retries the whole block from the top.
                return false;
            }
            pending.swap_remove(pos);
            deadline = self.clock.now_ms() + self.config.reply_timeout_ms;
        }

        pending.is_empty()
    }

    /// Program a whole image starting at a logical sector. The tail block
    /// is padded with 0xFF, the erased value.
    pub fn program_image(
        &mut self,
        list: &NodeList,
        start_sector: u8,
        image: &[u8],
    ) -> Result<(), ProgramError> {
        // Programming zero nodes is really fast
        if list.is_empty() {
            return Ok(());
        }

        let mut block = [0xFFu8; BLOCK_SIZE];
        for (i, chunk) in image.chunks(BLOCK_SIZE).enumerate() {
            let sector = start_sector as usize + i;
            if sector > LOGICAL_SECTOR_MAX as usize {
                return Err(ProgramError::ImageTooLarge);
            }
            let sector = sector as u8;

            block.fill(0xFF);
            block[..chunk.len()].copy_from_slice(chunk);

            if !self.send_block(list, sector, &block) {
                return Err(ProgramError::BlockFailed { sector });
            }
        }
        Ok(())
    }

    /// Broadcast a reset; no acknowledgement is awaited.
    pub fn reset_network(&mut self) {
        self.bus.send(&Message::ResetNode.encode());
    }
}
