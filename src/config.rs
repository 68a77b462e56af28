//! Configuration file and target resolution
//!
//! An optional TOML file supplies defaults that command-line flags override:
//!
//! ```toml
//! family = "rx62n"
//! fclk_hz = 50000000
//! image = "dflash.bin"
//! family_db = "families/"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use dflash_core::family::{FamilyDatabase, FamilyDbError};
use dflash_core::FlashFamily;

use crate::cli::{parse_hex_u32, TargetArgs};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG: &str = "dflash.toml";
/// Default image file backing the emulator
pub const DEFAULT_IMAGE: &str = "dflash.bin";

/// Errors of the command-line tool
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// File could not be read or written
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Configuration file is malformed
    #[error("{}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// Family database failed to load
    #[error("family database: {0}")]
    FamilyDb(#[from] FamilyDbError),
    /// No family given on the command line or in the config
    #[error("no flash family selected (use --family or set `family` in dflash.toml)")]
    MissingFamily,
    /// Family name not found
    #[error("unknown flash family '{0}' (see list-families)")]
    UnknownFamily(String),
    /// The driver reported an error
    #[error("flash: {0}")]
    Flash(#[from] dflash_core::Error),
    /// Input does not fit into the array
    #[error("{len} bytes at {start:#x} do not fit into {size} bytes of data flash")]
    OutOfRange { start: u32, len: usize, size: u32 },
    /// Read-back differs from what was written
    #[error("verification failed at offset {0:#x}")]
    VerifyFailed(u32),
}

impl CliError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Contents of the TOML configuration file
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub family: Option<String>,
    #[serde(default, deserialize_with = "deserialize_hex_u32")]
    pub fclk_hz: Option<u32>,
    pub image: Option<PathBuf>,
    pub family_db: Option<PathBuf>,
}

/// Deserialize an optional u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(Some(n)),
        HexOrInt::Str(s) => parse_hex_u32(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl FileConfig {
    /// Parse a configuration from a TOML string
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, CliError> {
        toml::from_str(content).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the given file, or `dflash.toml` if it exists
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = fs::read_to_string(&path).map_err(|e| CliError::io(&path, e))?;
        let config = Self::from_toml(&content, &path)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Load the built-in families plus any from `path`
pub fn load_family_database(path: Option<&Path>) -> Result<FamilyDatabase, CliError> {
    let mut db = FamilyDatabase::with_builtins();

    if let Some(path) = path {
        let count = if path.is_dir() {
            db.load_dir(path)?
        } else {
            db.load_file(path)?
        };
        log::debug!("Loaded {} families from {}", count, path.display());
    }

    Ok(db)
}

/// Fully resolved target of a command
#[derive(Debug, Clone)]
pub struct Target {
    pub family: FlashFamily,
    pub fclk_hz: u32,
    pub image: PathBuf,
}

impl Target {
    /// Merge command-line flags over the configuration file
    pub fn resolve(
        args: &TargetArgs,
        config: &FileConfig,
        db: &FamilyDatabase,
    ) -> Result<Self, CliError> {
        let name = args
            .family
            .as_deref()
            .or(config.family.as_deref())
            .ok_or(CliError::MissingFamily)?;
        let family = db
            .find(name)
            .cloned()
            .ok_or_else(|| CliError::UnknownFamily(name.to_string()))?;

        // Fastest allowed clock gives the tightest budgets
        let fclk_hz = args
            .fclk
            .or(config.fclk_hz)
            .unwrap_or(family.fclk_max_hz);
        let image = args
            .image
            .clone()
            .or_else(|| config.image.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE));

        Ok(Self {
            family,
            fclk_hz,
            image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = FileConfig::from_toml(
            r#"
            family = "rx64m"
            fclk_hz = "0x2FAF080"
            image = "data.bin"
            "#,
            Path::new("test.toml"),
        )
        .unwrap();
        assert_eq!(config.family.as_deref(), Some("rx64m"));
        assert_eq!(config.fclk_hz, Some(50_000_000));
        assert_eq!(config.image, Some(PathBuf::from("data.bin")));
        assert_eq!(config.family_db, None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = FileConfig::from_toml("famliy = \"rx62n\"", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_flags_override_config() {
        let db = FamilyDatabase::with_builtins();
        let config = FileConfig {
            family: Some("rx62n".into()),
            fclk_hz: Some(32_000_000),
            ..Default::default()
        };
        let args = TargetArgs {
            family: Some("RX24T".into()),
            ..Default::default()
        };

        let target = Target::resolve(&args, &config, &db).unwrap();
        assert_eq!(target.family.name.as_str(), "RX24T");
        assert_eq!(target.fclk_hz, 32_000_000);
        assert_eq!(target.image, PathBuf::from(DEFAULT_IMAGE));
    }

    #[test]
    fn test_defaults_and_errors() {
        let db = FamilyDatabase::with_builtins();
        let args = TargetArgs {
            family: Some("rx62n".into()),
            ..Default::default()
        };
        let target = Target::resolve(&args, &FileConfig::default(), &db).unwrap();
        assert_eq!(target.fclk_hz, 50_000_000);

        assert!(matches!(
            Target::resolve(&TargetArgs::default(), &FileConfig::default(), &db),
            Err(CliError::MissingFamily)
        ));
        let args = TargetArgs {
            family: Some("z80".into()),
            ..Default::default()
        };
        assert!(matches!(
            Target::resolve(&args, &FileConfig::default(), &db),
            Err(CliError::UnknownFamily(_))
        ));
    }
}
