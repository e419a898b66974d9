use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Default cap on a single encoded record: 64 MiB.
pub const DEFAULT_MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Per-record payload compression. Recorded in the stream header, so readers
/// never need to be told.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Zstd { level: i32 },
}

impl Compression {
    /// Zstd at its usual default level.
    pub const fn zstd() -> Self {
        Self::Zstd { level: 3 }
    }
}

/// Configuration for writing (and bounding the reading of) package streams.
///
/// ```toml
/// max_record_size = 1048576
///
/// [compression.zstd]
/// level = 9
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Compression applied to every record payload.
    pub compression: Compression,
    /// Largest encoded record payload accepted, in bytes.
    pub max_record_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

impl CodecConfig {
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_max_record_size(mut self, max_record_size: usize) -> Self {
        self.max_record_size = max_record_size;
        self
    }

    pub fn from_toml_str(s: &str) -> CodecResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| CodecError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> CodecResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> CodecResult<()> {
        if self.max_record_size == 0 {
            return Err(CodecError::Config("max_record_size must be positive".into()));
        }
        if self.max_record_size > u32::MAX as usize {
            return Err(CodecError::Config(format!(
                "max_record_size must not exceed {}",
                u32::MAX
            )));
        }
        if let Compression::Zstd { level } = self.compression {
            let range = zstd::compression_level_range();
            if !range.contains(&level) {
                return Err(CodecError::Config(format!(
                    "zstd level {level} outside {}..={}",
                    range.start(),
                    range.end()
                )));
            }
        }
        Ok(())
    }
}
