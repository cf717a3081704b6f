//! Configuration for the query engine.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the drought query engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root of the cube archive (`<root>/<value space>/<index>.zarr`).
    pub archive_dir: PathBuf,

    /// Directory holding persisted grid indices and the admin artifacts.
    pub grid_index_dir: PathBuf,

    /// Geographic grid resolution in degrees.
    pub resolution: f64,

    /// Memory budget for the chunk cache in megabytes.
    pub chunk_cache_size_mb: usize,

    /// Number of query results kept in the LRU result cache.
    pub result_cache_capacity: usize,

    /// Time budget for one correlation field.
    pub correlation_timeout_secs: u64,

    /// Cell size of the equal-area grid in meters.
    pub equal_area_cell_m: f64,

    /// Optional JSON file overriding the display-range table.
    pub range_table: Option<PathBuf>,

    /// Time-chunk length used when writing cubes.
    pub time_chunk: usize,

    /// Compression codec for written cubes.
    pub compression: ZarrCompression,

    /// Compression level (1-9).
    pub compression_level: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            archive_dir: PathBuf::from("data/archive"),
            grid_index_dir: PathBuf::from("data/grid_index"),
            resolution: 0.25,
            chunk_cache_size_mb: 512,
            result_cache_capacity: 2,
            correlation_timeout_secs: 60,
            equal_area_cell_m: 25_000.0,
            range_table: None,
            time_chunk: 12,
            compression: ZarrCompression::BloscZstd,
            compression_level: 1,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("DROUGHT_ARCHIVE_DIR") {
            config.archive_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("DROUGHT_GRID_INDEX_DIR") {
            config.grid_index_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("DROUGHT_RESOLUTION") {
            if let Ok(res) = val.parse() {
                config.resolution = res;
            }
        }

        if let Ok(val) = std::env::var("DROUGHT_CHUNK_CACHE_MB") {
            if let Ok(size) = val.parse() {
                config.chunk_cache_size_mb = size;
            }
        }

        if let Ok(val) = std::env::var("DROUGHT_RESULT_CACHE_CAPACITY") {
            if let Ok(cap) = val.parse() {
                config.result_cache_capacity = cap;
            }
        }

        if let Ok(val) = std::env::var("DROUGHT_CORRELATION_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.correlation_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("DROUGHT_EQUAL_AREA_CELL_M") {
            if let Ok(cell) = val.parse() {
                config.equal_area_cell_m = cell;
            }
        }

        if let Ok(val) = std::env::var("DROUGHT_RANGE_TABLE") {
            if !val.is_empty() {
                config.range_table = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("DROUGHT_TIME_CHUNK") {
            if let Ok(chunk) = val.parse() {
                config.time_chunk = chunk;
            }
        }

        if let Ok(val) = std::env::var("DROUGHT_COMPRESSION") {
            config.compression = ZarrCompression::from_str(&val);
        }

        if let Ok(val) = std::env::var("DROUGHT_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.compression_level = level;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.resolution > 0.0) {
            return Err("resolution must be > 0".to_string());
        }

        if self.chunk_cache_size_mb == 0 {
            return Err("chunk_cache_size_mb must be > 0".to_string());
        }

        if self.result_cache_capacity == 0 {
            return Err("result_cache_capacity must be > 0".to_string());
        }

        if self.correlation_timeout_secs == 0 {
            return Err("correlation_timeout_secs must be > 0".to_string());
        }

        if !(self.equal_area_cell_m > 0.0) {
            return Err("equal_area_cell_m must be > 0".to_string());
        }

        if self.time_chunk == 0 {
            return Err("time_chunk must be > 0".to_string());
        }

        if self.compression_level == 0 || self.compression_level > 9 {
            return Err("compression_level must be 1-9".to_string());
        }

        Ok(())
    }

    /// Get the chunk cache size in bytes.
    pub fn chunk_cache_size_bytes(&self) -> usize {
        self.chunk_cache_size_mb * 1024 * 1024
    }

    pub fn correlation_timeout(&self) -> Duration {
        Duration::from_secs(self.correlation_timeout_secs)
    }
}

/// Compression codec for written cubes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd.
    BloscZstd,
}

impl Default for ZarrCompression {
    fn default() -> Self {
        Self::BloscZstd
    }
}

impl ZarrCompression {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => Self::None,
            "lz4" | "blosc_lz4" => Self::BloscLz4,
            "zstd" | "blosc_zstd" => Self::BloscZstd,
            _ => Self::BloscZstd,
        }
    }

    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.resolution, 0.25);
        assert_eq!(config.result_cache_capacity, 2);
        assert_eq!(config.compression, ZarrCompression::BloscZstd);
        assert!(config.range_table.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.result_cache_capacity = 0;
        assert!(config.validate().is_err());

        config = EngineConfig::default();
        config.resolution = -0.25;
        assert!(config.validate().is_err());

        config = EngineConfig::default();
        config.equal_area_cell_m = f64::NAN;
        assert!(config.validate().is_err());

        config = EngineConfig::default();
        config.compression_level = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zarr_compression_from_str() {
        assert_eq!(ZarrCompression::from_str("none"), ZarrCompression::None);
        assert_eq!(ZarrCompression::from_str("LZ4"), ZarrCompression::BloscLz4);
        assert_eq!(ZarrCompression::from_str("blosc_zstd"), ZarrCompression::BloscZstd);
        assert_eq!(ZarrCompression::from_str("invalid"), ZarrCompression::BloscZstd);
    }

    #[test]
    fn test_timeout_duration() {
        let config = EngineConfig {
            correlation_timeout_secs: 5,
            ..EngineConfig::default()
        };
        assert_eq!(config.correlation_timeout(), Duration::from_secs(5));
    }
}
