// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Block integrity engine.
//!
//! CRC-32/ISO-HDLC over one 4 KiB block, folded in one frame at a time so
//! verification is finished by the time the last frame arrives instead of
//! needing a second pass over the buffer. The accumulator is
//! order-sensitive: replaying the same bytes in a different frame order
//! produces a different digest.
//!
//! A mismatch is not fatal. It is reported to the peer in the block
//! outcome, the accumulated data is not committed to flash, and the
//! sender retransmits the whole block from the top.

use crc::{Crc, Digest, CRC_32_ISO_HDLC};

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Running digest over the frames of one block.
pub struct BlockIntegrity {
    digest: Digest<'static, u32>,
}

impl BlockIntegrity {
    pub fn new() -> Self {
        Self {
            digest: CRC32.digest(),
        }
    }

    /// Reset the accumulator for a new block.
    pub fn begin_block(&mut self) {
        self.digest = CRC32.digest();
    }

    /// Fold one received frame payload into the running digest, in
    /// arrival order.
    pub fn update(&mut self, chunk: &[u8]) {
        self.digest.update(chunk);
    }

    /// Return the digest of everything folded in since the last
    /// `begin_block`. Consumes the running state; the accumulator is
    /// reset afterwards.
    pub fn finalize(&mut self) -> u32 {
        core::mem::replace(&mut self.digest, CRC32.digest()).finalize()
    }

    /// Compare the running digest against the candidate received over the
    /// bus. Resets the accumulator either way.
    pub fn verify(&mut self, candidate: u32) -> bool {
        self.finalize() == candidate
    }
}

impl Default for BlockIntegrity {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot digest over a full buffer. The programmer side uses this to
/// compute the digest it announces after streaming a block.
pub fn block_digest(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}
