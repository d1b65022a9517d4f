// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use canboot_core::programmer::{Programmer, ProgrammerConfig};

use crate::commands;
use crate::transport::{self, SlcanTransport, StdClock};

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "canboot-program")]
#[command(about = "Field programming tool for canboot nodes")]
pub struct Cli {
    /// Serial port of the SLCAN adapter (e.g., /dev/ttyUSB0)
    #[arg(short, long)]
    pub port: String,

    /// CAN bitrate (125k, 250k, 500k, 800k, 1M)
    #[arg(long, default_value = "500k")]
    pub bitrate: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Force the network into update mode and list responding nodes
    Scan,

    /// Flash a firmware image to every responding node
    Flash {
        /// Firmware binary file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Logical sector the image starts at
        #[arg(short, long, default_value = "0")]
        start_sector: u8,
    },

    /// Reset all nodes out of the bootloader
    Reset,
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let bitrate = transport::bitrate_code(&cli.bitrate)?;
    let bus = SlcanTransport::open(&cli.port, bitrate)?;
    let mut prog = Programmer::new(bus, StdClock::new(), ProgrammerConfig::default());

    match cli.command {
        Commands::Scan => commands::scan(&mut prog),
        Commands::Flash { file, start_sector } => commands::flash(&mut prog, &file, start_sector),
        Commands::Reset => commands::reset(&mut prog),
    }
}
