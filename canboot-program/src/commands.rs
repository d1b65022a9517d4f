// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for node programming operations.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use crc::{Crc, CRC_32_ISO_HDLC};
use indicatif::{ProgressBar, ProgressStyle};

use canboot_core::bus::{Clock, FrameBus};
use canboot_core::programmer::{DiscoverError, NodeList, Programmer};
use canboot_core::sector::{BLOCK_SIZE, LOGICAL_SECTOR_MAX};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Force the network into update mode and list responding nodes.
pub fn scan<B: FrameBus, C: Clock>(prog: &mut Programmer<B, C>) -> Result<()> {
    print!("Entering update mode and scanning... ");
    std::io::stdout().flush()?;

    let nodes = discover(prog)?;
    println!("done");
    println!();

    if nodes.is_empty() {
        println!("No nodes responded.");
        return Ok(());
    }

    println!("{} node(s) responding:", nodes.len());
    for serial in &nodes {
        println!("  {:>10}  (0x{:08x})", serial, serial);
    }
    println!();
    println!("Nodes stay in update mode until a reset command.");

    Ok(())
}

/// Flash a firmware image to every responding node.
pub fn flash<B: FrameBus, C: Clock>(
    prog: &mut Programmer<B, C>,
    file: &Path,
    start_sector: u8,
) -> Result<()> {
    let image = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    if image.is_empty() {
        bail!("{} is empty", file.display());
    }

    let blocks = image.len().div_ceil(BLOCK_SIZE);
    let last_sector = start_sector as usize + blocks - 1;
    if last_sector > LOGICAL_SECTOR_MAX as usize {
        bail!(
            "Image needs sectors {}..={} but the last addressable sector is {}",
            start_sector,
            last_sector,
            LOGICAL_SECTOR_MAX
        );
    }

    println!(
        "Firmware: {} ({} bytes, CRC32: 0x{:08x})",
        file.display(),
        image.len(),
        CRC32.checksum(&image)
    );
    println!(
        "Target:   logical sectors {}..={} ({} block(s))",
        start_sector, last_sector, blocks
    );
    println!();

    print!("Entering update mode and scanning... ");
    std::io::stdout().flush()?;
    let nodes = discover(prog)?;
    println!("done");

    if nodes.is_empty() {
        bail!("No nodes responded; nothing to program");
    }
    println!("Programming {} node(s).", nodes.len());

    prog.select_targets(&nodes);

    let pb = ProgressBar::new(image.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let mut block = [0xFFu8; BLOCK_SIZE];
    let mut written = 0u64;
    for (i, chunk) in image.chunks(BLOCK_SIZE).enumerate() {
        let sector = start_sector + i as u8;
        block.fill(0xFF);
        block[..chunk.len()].copy_from_slice(chunk);

        if !prog.send_block(&nodes, sector, &block) {
            pb.abandon();
            bail!("Sector {} was not acknowledged clean by every node", sector);
        }

        written += chunk.len() as u64;
        pb.set_position(written);
    }
    pb.finish_with_message("Flash complete");
    println!();

    print!("Resetting nodes... ");
    std::io::stdout().flush()?;
    prog.reset_network();
    println!("OK");
    println!();
    println!("Firmware programmed to {} node(s) successfully.", nodes.len());

    Ok(())
}

/// Reset all nodes out of the bootloader.
pub fn reset<B: FrameBus, C: Clock>(prog: &mut Programmer<B, C>) -> Result<()> {
    print!("Resetting nodes... ");
    std::io::stdout().flush()?;
    prog.reset_network();
    println!("OK");
    Ok(())
}

fn discover<B: FrameBus, C: Clock>(prog: &mut Programmer<B, C>) -> Result<NodeList> {
    prog.discover().map_err(|e| match e {
        DiscoverError::TooManyNodes => {
            anyhow::anyhow!("More nodes responded than the node table can hold")
        }
    })
}
