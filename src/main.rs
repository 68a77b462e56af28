//! dflash - Data flash tool
//!
//! Drives the data flash controller driver against the FCU emulator, with the
//! emulated array persisted in an image file. Useful for exercising the
//! driver, preparing data flash images and inspecting family definitions.

mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::{Cli, Commands, TargetArgs};
use config::{load_family_database, FileConfig, Target};
use dflash_core::family::FamilyDatabase;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let file_config = FileConfig::load(cli.config.as_deref())?;
    let family_db = cli.family_db.as_deref().or(file_config.family_db.as_deref());
    let db = match load_family_database(family_db) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load family database: {}", e);
            std::process::exit(1);
        }
    };

    log::debug!("{} flash families available", db.len());

    let resolve =
        |args: &TargetArgs, db: &FamilyDatabase| Target::resolve(args, &file_config, db);

    match cli.command {
        Commands::Info { target } => commands::run_info(&resolve(&target, &db)?),
        Commands::ListFamilies => {
            commands::list_families(&db);
            Ok(())
        }
        Commands::Read {
            target,
            output,
            start,
            length,
        } => commands::run_read(&resolve(&target, &db)?, &output, start, length),
        Commands::Write {
            target,
            input,
            start,
            no_erase,
            no_verify,
        } => commands::run_write(
            &resolve(&target, &db)?,
            &input,
            start,
            !no_erase,
            !no_verify,
        ),
        Commands::Erase { target, block, all } => {
            let block = if all { None } else { block };
            commands::run_erase(&resolve(&target, &db)?, block)
        }
        Commands::BlankCheck { target, block } => {
            commands::run_blank_check(&resolve(&target, &db)?, block)
        }
    }
}
