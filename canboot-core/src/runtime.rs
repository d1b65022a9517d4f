// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Node control loop: mode decision and block servicing.
//!
//! Single-threaded and cooperative. Each iteration polls the bus once;
//! flash commits run to completion inside the iteration (flashing is not
//! interruptible and shares the node with nothing else). After the boot
//! window expires the loop hands off to the stored application vectors,
//! unless `EnterBootloader` latched the resident flag.

use crate::boot_record::{BootRecordStore, BootVectors, ByteStore};
use crate::bus::{Clock, FrameBus};
use crate::flash::{self, FlashDevice};
use crate::frame::Message;
use crate::session::{NodeAction, TransferSession};

/// Node-side configuration.
#[derive(Clone, Copy, Debug)]
pub struct NodeConfig {
    /// How long to listen for an `EnterBootloader` before booting the
    /// application.
    pub boot_wait_ms: u64,
    /// The bootloader's own reset/stack vectors, written into every
    /// sector-0 block in place of the application's.
    pub bootloader_vectors: BootVectors,
}

/// How the control loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handoff {
    /// Jump to the stored application vectors.
    Application { start: u32, stack: u32 },
    /// A `ResetNode` was received: the caller performs a controlled
    /// hardware reset (watchdog or SCB), not a mere flag clear.
    Reset,
}

/// Service a block the session verified clean: sector-0 vector capture,
/// flash commit, and exactly one outcome report.
pub fn service_block<F, S, B>(
    session: &mut TransferSession,
    dev: &mut F,
    store: &mut BootRecordStore<S>,
    bootloader_vectors: BootVectors,
    bus: &mut B,
) where
    F: FlashDevice,
    S: ByteStore,
    B: FrameBus,
{
    let block = session.block_mut();
    if block.sector == 0 {
        store.capture_and_redirect(block, bootloader_vectors);
    }
    let result = flash::commit_block(dev, session.block_mut());
    session.report_outcome(&result, bus);
}

/// The long-lived node context: session plus injected collaborators.
pub struct NodeRuntime<B, F, S, C>
where
    B: FrameBus,
    F: FlashDevice,
    S: ByteStore,
    C: Clock,
{
    session: TransferSession,
    bus: B,
    dev: F,
    store: BootRecordStore<S>,
    clock: C,
    config: NodeConfig,
    resident: bool,
}

impl<B, F, S, C> NodeRuntime<B, F, S, C>
where
    B: FrameBus,
    F: FlashDevice,
    S: ByteStore,
    C: Clock,
{
    pub fn new(serial: u32, bus: B, dev: F, store: S, clock: C, config: NodeConfig) -> Self {
        Self {
            session: TransferSession::new(serial),
            bus,
            dev,
            store: BootRecordStore::new(store),
            clock,
            config,
            resident: false,
        }
    }

    /// Run until the boot window expires or a reset is requested.
    pub fn run(&mut self) -> Handoff {
        let deadline = self.clock.now_ms() + self.config.boot_wait_ms;

        while self.clock.now_ms() < deadline || self.resident {
            if let Some(handoff) = self.poll_once() {
                return handoff;
            }
        }

        Handoff::Application {
            start: self.store.load_start(),
            stack: self.store.load_stack(),
        }
    }

    /// One control-loop iteration: poll the bus, advance the session,
    /// service any completed block.
    fn poll_once(&mut self) -> Option<Handoff> {
        let frame = self.bus.try_recv()?;
        let msg = Message::decode(&frame)?;

        match self.session.handle(&msg, &mut self.bus) {
            NodeAction::None => None,
            NodeAction::EnterBootloader => {
                self.resident = true;
                None
            }
            NodeAction::BlockReady => {
                service_block(
                    &mut self.session,
                    &mut self.dev,
                    &mut self.store,
                    self.config.bootloader_vectors,
                    &mut self.bus,
                );
                None
            }
            NodeAction::ResetRequested => Some(Handoff::Reset),
        }
    }
}
