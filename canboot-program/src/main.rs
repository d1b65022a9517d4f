// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Field programming tool for canboot nodes via an SLCAN adapter.
//!
//! Usage:
//!   canboot-program --port /dev/ttyUSB0 scan
//!   canboot-program --port /dev/ttyUSB0 flash firmware.bin --start-sector 0
//!   canboot-program --port /dev/ttyUSB0 reset

mod cli;
mod commands;
mod transport;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
