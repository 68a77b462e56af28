//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "dflash")]
#[command(author, version, about = "Data flash tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (TOML). Defaults to ./dflash.toml if present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Extra family definitions (a .ron file or a directory of them)
    #[arg(long, global = true)]
    pub family_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Target selection shared across commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Flash family (e.g. rx62n)
    #[arg(short, long)]
    pub family: Option<String>,

    /// Flash peripheral clock in Hz (hex or decimal)
    #[arg(long, value_parser = parse_hex_u32)]
    pub fclk: Option<u32>,

    /// Image file backing the emulated data flash
    #[arg(long)]
    pub image: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show family, geometry, timeout budgets and unique ID
    Info {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// List known flash families
    ListFamilies,

    /// Read data flash contents to a file
    Read {
        #[command(flatten)]
        target: TargetArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Start offset (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Number of bytes to read (defaults to the rest of the array)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Write a file to data flash
    Write {
        #[command(flatten)]
        target: TargetArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start offset (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Don't erase the affected blocks before writing
        #[arg(long)]
        no_erase: bool,

        /// Skip read-back verification
        #[arg(long)]
        no_verify: bool,
    },

    /// Erase one block or the whole data flash
    Erase {
        #[command(flatten)]
        target: TargetArgs,

        /// Block index to erase
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        block: Option<u32>,

        /// Erase every block
        #[arg(long)]
        all: bool,
    },

    /// Blank-check one block or every block
    BlankCheck {
        #[command(flatten)]
        target: TargetArgs,

        /// Block index to check (defaults to all blocks)
        #[arg(long)]
        block: Option<u32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x800"), Ok(0x800));
        assert_eq!(parse_hex_u32("0X10"), Ok(16));
        assert_eq!(parse_hex_u32("2048"), Ok(2048));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("-1").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "dflash", "-v", "erase", "--family", "rx62n", "--block", "3",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Erase { target, block, all } => {
                assert_eq!(target.family.as_deref(), Some("rx62n"));
                assert_eq!(block, Some(3));
                assert!(!all);
            }
            _ => panic!("expected erase"),
        }
    }

    #[test]
    fn test_erase_needs_target() {
        assert!(Cli::try_parse_from(["dflash", "erase"]).is_err());
        assert!(Cli::try_parse_from(["dflash", "erase", "--all", "--block", "1"]).is_err());
    }
}
