//! Erase command implementation

use std::time::Duration;

use indicatif::ProgressBar;

use super::{create_spinner_style, Session};
use crate::config::Target;

/// Erase one block, or every block when `block` is `None`
pub fn run_erase(target: &Target, block: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(target)?;
    let flash = session.flash();

    match block {
        Some(block) => {
            flash.erase(block)?;
            println!(
                "Erased block {} (0x{:08X} - 0x{:08X})",
                block,
                flash.block_address(block),
                flash.block_address(block) + flash.geometry().block_size - 1
            );
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(create_spinner_style()?);
            pb.set_message(format!(
                "Erasing {} blocks...",
                flash.geometry().block_count()
            ));
            pb.enable_steady_tick(Duration::from_millis(100));

            let result = flash.erase_all();
            pb.finish_and_clear();
            result?;
            println!("Data flash erase complete");
        }
    }

    session.save()?;
    Ok(())
}
