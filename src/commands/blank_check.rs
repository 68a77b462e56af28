//! Blank check command implementation

use super::{create_block_bar, Session};
use crate::config::Target;

/// Blank-check one block, or every block when `block` is `None`
pub fn run_blank_check(
    target: &Target,
    block: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(target)?;
    let flash = session.flash();

    if let Some(block) = block {
        let blank = flash.erase_check(block)?;
        println!(
            "Block {}: {}",
            block,
            if blank { "blank" } else { "programmed" }
        );
        return Ok(());
    }

    let count = flash.geometry().block_count();
    let pb = create_block_bar(count as u64, "Checking")?;
    let mut programmed = Vec::new();
    for block in 0..count {
        if !flash.erase_check(block)? {
            programmed.push(block);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if programmed.is_empty() {
        println!("All {} blocks are blank", count);
    } else {
        println!("{} of {} blocks are programmed:", programmed.len(), count);
        for block in programmed {
            println!(
                "  block {:>4} at 0x{:08X}",
                block,
                flash.block_address(block)
            );
        }
    }
    Ok(())
}
