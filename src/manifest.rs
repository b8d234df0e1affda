//! Session manifests
//!
//! A manifest describes a whole programming session in TOML so a board's
//! image set can be kept next to the images:
//!
//! ```toml
//! [session]
//! erase = true
//! verify = true
//! expected_id = "EF4014"
//!
//! [[image]]
//! file = "gateware.bin"
//! offset = 0x000000
//!
//! [[image]]
//! file = "rom.gb"
//! offset = "0x100000"
//! ```
//!
//! Relative image paths are resolved against the manifest's directory.

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use tgbprog_core::chip::JedecId;
use thiserror::Error;

/// Errors raised while loading a manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid TOML or has unknown keys
    #[error("Invalid manifest: {0}")]
    Parse(#[from] toml::de::Error),

    /// `expected_id` is not three hex bytes
    #[error("Invalid expected_id '{0}': expected 3 hex bytes such as \"EF4014\"")]
    InvalidId(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    session: SessionSection,
    #[serde(default, rename = "image")]
    images: Vec<ImageEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionSection {
    #[serde(default)]
    erase: bool,
    #[serde(default)]
    verify: bool,
    expected_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImageEntry {
    file: PathBuf,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    offset: u32,
}

/// One image listed in a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    /// Image path, already resolved
    pub file: PathBuf,
    /// Flash offset
    pub offset: u32,
}

/// A loaded session manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Erase the chip before programming
    pub erase: bool,
    /// Verify every image after programming
    pub verify: bool,
    /// Identity the flash must report, if overridden
    pub expected_id: Option<JedecId>,
    /// Images in programming order
    pub images: Vec<ImageSpec>,
}

impl Manifest {
    /// Load a manifest from disk
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&text, base)
    }

    /// Parse manifest text, resolving relative image paths against `base`
    pub fn parse(text: &str, base: &Path) -> Result<Self, ManifestError> {
        let file: ManifestFile = toml::from_str(text)?;

        let expected_id = match file.session.expected_id {
            Some(s) => Some(JedecId::parse(&s).ok_or(ManifestError::InvalidId(s))?),
            None => None,
        };

        let images = file
            .images
            .into_iter()
            .map(|entry| ImageSpec {
                file: if entry.file.is_absolute() {
                    entry.file
                } else {
                    base.join(entry.file)
                },
                offset: entry.offset,
            })
            .collect();

        Ok(Self {
            erase: file.session.erase,
            verify: file.session.verify,
            expected_id,
            images,
        })
    }
}

/// Deserialize a u32 from either an integer or a hex string
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => crate::cli::parse_hex_u32(&s).map_err(serde::de::Error::custom),
    }
}
