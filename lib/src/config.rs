//! Defines the configuration of a store: where it lives and the two thresholds that
//! govern the write-back cache and shard splitting.

use crate::consts::{CONFIG_FILE, DEFAULT_CACHE_THRESHOLD, DEFAULT_SPLIT_THRESHOLD};
use anyhow::Result;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

fn default_cache_threshold() -> usize {
    DEFAULT_CACHE_THRESHOLD
}

fn default_split_threshold() -> usize {
    DEFAULT_SPLIT_THRESHOLD
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct StoreConfig {
    /// Store root. Not serialized: a config file always describes the directory it sits in.
    #[serde(skip)]
    pub root: PathBuf,
    /// Number of distinct shards held in the cache before it is flushed.
    #[builder(default = "DEFAULT_CACHE_THRESHOLD")]
    #[serde(default = "default_cache_threshold")]
    pub cache_threshold: usize,
    /// Number of lines a shard may hold before a flush tries to split it.
    #[builder(default = "DEFAULT_SPLIT_THRESHOLD")]
    #[serde(default = "default_split_threshold")]
    pub split_threshold: usize,
}

impl StoreConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.root.is_none() {
            return Err("root must be set".to_string());
        }
        if let Some(0) = self.cache_threshold {
            return Err("cache_threshold must be greater than zero".to_string());
        }
        if let Some(0) = self.split_threshold {
            return Err("split_threshold must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Config for `root` with default thresholds.
    pub fn new(root: PathBuf) -> Self {
        StoreConfig {
            root,
            cache_threshold: DEFAULT_CACHE_THRESHOLD,
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn save_to_file(&self, file: &Path) -> Result<()> {
        let config_str = serde_json::to_string_pretty(&self)?;
        let mut file = std::fs::File::create(file)?;
        file.write_all(config_str.as_bytes())?;
        Ok(())
    }

    /// Reads a config file; the root is taken to be the directory containing it.
    pub fn from_file(file: &Path) -> Result<Self> {
        let reader = BufReader::new(std::fs::File::open(file)?);
        let mut config: StoreConfig = serde_json::from_reader(reader)?;
        config.root = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Uses `root/quince.json` when present, defaults otherwise.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let file = root.join(CONFIG_FILE);
        if file.exists() {
            let mut config = Self::from_file(&file)?;
            config.root = root.to_path_buf();
            Ok(config)
        } else {
            Ok(Self::new(root.to_path_buf()))
        }
    }

    /// Prints out the current config for command line output.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  Root: {}", self.root.display());
        println!("  Cache Threshold: {}", self.cache_threshold);
        println!("  Split Threshold: {}", self.split_threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_builder_defaults() {
        let config = StoreConfig::builder()
            .root(PathBuf::from("/tmp/store"))
            .build()
            .unwrap();
        assert_eq!(config.cache_threshold, DEFAULT_CACHE_THRESHOLD);
        assert_eq!(config.split_threshold, DEFAULT_SPLIT_THRESHOLD);
    }

    #[test]
    fn test_builder_rejects_zero_thresholds() {
        let result = StoreConfig::builder()
            .root(PathBuf::from("/tmp/store"))
            .split_threshold(0usize)
            .build();
        assert!(result.is_err());
        assert!(StoreConfig::builder().build().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new("quince-config").unwrap();
        let config = StoreConfig::builder()
            .root(dir.path().to_path_buf())
            .cache_threshold(10usize)
            .split_threshold(5usize)
            .build()
            .unwrap();
        config.save_to_file(&config.config_path()).unwrap();

        let loaded = StoreConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new("quince-config").unwrap();
        let loaded = StoreConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded, StoreConfig::new(dir.path().to_path_buf()));
    }
}
