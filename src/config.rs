//! Solver configuration.
//!
//! ```toml
//! block_size = 64
//! threads = 8
//! kernel = "vectorized"   # or "scalar"
//! padding = "pad"         # or "strict"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kernel::KernelKind;

/// What to do when the block size does not divide the vertex count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingPolicy {
    /// Add unreachable padding vertices up to the next multiple.
    #[default]
    Pad,
    /// Reject with [`Error::BlockSizeMismatch`].
    Strict,
}

/// Tuning parameters of a solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Side length L of a block. Three L×L blocks should fit in the cache
    /// level you are targeting.
    pub block_size: usize,
    /// Worker threads in the pool.
    pub threads: usize,
    pub kernel: KernelKind,
    pub padding: PaddingPolicy,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            block_size: 64,
            threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            kernel: KernelKind::default(),
            padding: PaddingPolicy::default(),
        }
    }
}

impl SolverConfig {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_kernel(mut self, kernel: KernelKind) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_padding(mut self, padding: PaddingPolicy) -> Self {
        self.padding = padding;
        self
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Reject settings that can never run.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::ZeroBlockSize);
        }
        if self.threads == 0 {
            return Err(Error::ZeroThreads);
        }
        Ok(())
    }

    /// Largest power-of-two block size whose three working blocks of `T`
    /// fit into `cache_bytes`. At least 1.
    pub fn suggested_block_size<T>(cache_bytes: usize) -> usize {
        let per_block = cache_bytes / (3 * std::mem::size_of::<T>().max(1));
        let mut l = 1;
        while (2 * l) * (2 * l) <= per_block {
            l *= 2;
        }
        l
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SolverConfig::from_toml_str("block_size = 16\nkernel = \"scalar\"").unwrap();
        assert_eq!(config.block_size, 16);
        assert_eq!(config.kernel, KernelKind::Scalar);
        assert_eq!(config.padding, PaddingPolicy::Pad);
        assert_eq!(config.threads, SolverConfig::default().threads);
    }

    #[test]
    fn unknown_keys_and_zero_values_are_rejected() {
        assert!(matches!(SolverConfig::from_toml_str("blocksize = 4"), Err(Error::Config(_))));
        assert!(matches!(SolverConfig::from_toml_str("block_size = 0"), Err(Error::ZeroBlockSize)));
        assert!(matches!(SolverConfig::from_toml_str("threads = 0"), Err(Error::ZeroThreads)));
        assert!(matches!(SolverConfig::from_toml_str("kernel = \"gpu\""), Err(Error::Config(_))));
    }

    #[test]
    fn suggested_block_size_fits_three_blocks() {
        // 32 KiB L1, f32: 3 * 32 * 32 * 4 = 12 KiB, 3 * 64 * 64 * 4 = 48 KiB
        assert_eq!(SolverConfig::suggested_block_size::<f32>(32 * 1024), 32);
        // 1 MiB L2, f64: 3 * 128 * 128 * 8 = 384 KiB, 3 * 256 * 256 * 8 = 1.5 MiB
        assert_eq!(SolverConfig::suggested_block_size::<f64>(1024 * 1024), 128);
        assert_eq!(SolverConfig::suggested_block_size::<u64>(0), 1);
    }

    #[test]
    fn builder_setters() {
        let config = SolverConfig::default()
            .with_block_size(8)
            .with_threads(2)
            .with_kernel(KernelKind::Scalar)
            .with_padding(PaddingPolicy::Strict);
        assert_eq!(
            config,
            SolverConfig { block_size: 8, threads: 2, kernel: KernelKind::Scalar, padding: PaddingPolicy::Strict }
        );
        assert!(config.validate().is_ok());
    }
}
