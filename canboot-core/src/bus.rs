// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Transport and timing collaborators injected into the protocol core.

use crate::frame::CanFrame;

/// A CAN transport. Receive is a non-blocking poll: the lower layer owns
/// all waiting (interrupt-fed ring buffer or status-flag polling); the
/// protocol state machines never suspend.
pub trait FrameBus {
    /// Return the next pending frame, or `None` if nothing arrived.
    fn try_recv(&mut self) -> Option<CanFrame>;

    /// Queue one frame for transmission.
    fn send(&mut self, frame: &CanFrame);
}

/// A monotonic millisecond clock. Timeouts in this crate are cooperative
/// polling loops bounded by this clock, never preemptive.
pub trait Clock {
    fn now_ms(&self) -> u64;
}
