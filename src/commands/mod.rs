//! CLI command implementations
//!
//! Every command runs the real driver against the emulator. The emulated
//! array is loaded from the image file at the start of a command and, for
//! commands that modify it, saved back at the end.

mod blank_check;
mod erase;
mod info;
mod list;
mod read;
mod write;

pub use blank_check::run_blank_check;
pub use erase::run_erase;
pub use info::run_info;
pub use list::list_families;
pub use read::run_read;
pub use write::run_write;

use std::path::PathBuf;

use dflash_core::bus::StdDelay;
use dflash_core::{DataFlash, FlashConfig};
use dflash_sim::SimFlash;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{CliError, Target};

/// Driver type used by every command
pub type Flash = DataFlash<SimFlash, StdDelay>;

/// A started driver bound to an image file
pub struct Session {
    flash: Flash,
    image: PathBuf,
}

impl Session {
    /// Load the image (or start erased) and bring the driver up
    pub fn open(target: &Target) -> Result<Self, CliError> {
        let family = target.family.clone();
        let sim = if target.image.is_file() {
            SimFlash::load(family.clone(), &target.image)
                .map_err(|e| CliError::io(&target.image, e))?
        } else {
            log::info!(
                "{} not found, starting from an erased array",
                target.image.display()
            );
            SimFlash::new(family.clone())
        };

        let mut flash = DataFlash::new(sim, StdDelay, family, FlashConfig::new(target.fclk_hz));
        flash.start()?;

        Ok(Self {
            flash,
            image: target.image.clone(),
        })
    }

    pub fn flash(&mut self) -> &mut Flash {
        &mut self.flash
    }

    /// Persist the array to the image file
    pub fn save(self) -> Result<(), CliError> {
        let (sim, _) = self.flash.release();
        sim.save(&self.image)
            .map_err(|e| CliError::io(&self.image, e))?;
        log::info!("Saved {} bytes to {}", sim.data().len(), self.image.display());
        Ok(())
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// Format a size with a binary unit
pub fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

/// Create a byte progress bar with a phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Create a block-count progress bar with a phase message
fn create_block_bar(total: u64, phase: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} blocks {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Create a standard spinner style
fn create_spinner_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(64), "64 B");
        assert_eq!(format_size(32 * 1024), "32 KiB");
        assert_eq!(format_size(2 * 1024 * 1024), "2 MiB");
    }
}
