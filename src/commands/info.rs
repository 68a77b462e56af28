//! Info command implementation

use dflash_core::family::Firmware;

use super::{format_size, Session};
use crate::config::Target;

/// Print family, geometry, budgets and unique ID
pub fn run_info(target: &Target) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(target)?;
    let flash = session.flash();

    let family = flash.family().clone();
    let geometry = *flash.geometry();
    let budgets = flash.budgets();

    println!("Data Flash Information");
    println!("======================");
    println!();
    println!("Family:          {}", family.name);
    println!(
        "Size:            {} bytes ({})",
        geometry.size,
        format_size(geometry.size)
    );
    println!(
        "Blocks:          {} x {}",
        geometry.block_count(),
        format_size(geometry.block_size)
    );
    println!("Program unit:    {} bytes", geometry.program_unit);
    match family.firmware {
        Firmware::NotRequired => println!("FCU firmware:    not required"),
        Firmware::Required { rom, ram, len, .. } => println!(
            "FCU firmware:    {} copied from 0x{:08X} to 0x{:08X}",
            format_size(len),
            rom,
            ram
        ),
    }
    println!(
        "FCLK:            {} Hz (allowed {} - {} Hz)",
        target.fclk_hz, family.fclk_min_hz, family.fclk_max_hz
    );
    println!();
    println!("Timeout budgets:");
    println!("  Program unit:  {} us", budgets.write_us);
    println!("  Block erase:   {} us", budgets.erase_us);
    println!("  Blank check:   {} us", budgets.blank_check_us);
    println!();

    let ids = flash.unique_ids();
    if ids.is_empty() {
        println!("Unique ID:       not supported");
    } else {
        let words: Vec<String> = ids.iter().map(|w| format!("{:08X}", w)).collect();
        println!("Unique ID:       {}", words.join(" "));
    }
    println!("Image:           {}", target.image.display());

    Ok(())
}
