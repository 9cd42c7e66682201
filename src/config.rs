// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::harvest::paginate::PagingCfg;

pub const ENV_CONFIG_PATH: &str = "HARVEST_CONFIG_PATH";
pub const ENV_FIXTURE_PATH: &str = "HARVEST_FIXTURE_PATH";
pub const DEFAULT_FIXTURE_PATH: &str = "config/sources.json";

/// Page cap and courtesy delay for one reporting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeConfig {
    pub page_cap: usize,
    pub delay_ms: u64,
}

impl ModeConfig {
    pub fn paging(&self) -> PagingCfg {
        PagingCfg {
            page_cap: self.page_cap.max(1),
            delay: Duration::from_millis(self.delay_ms),
        }
    }
}

impl From<PagingCfg> for ModeConfig {
    fn from(p: PagingCfg) -> Self {
        Self {
            page_cap: p.page_cap,
            delay_ms: p.delay.as_millis() as u64,
        }
    }
}

/// A mode table as written on disk; missing keys keep that mode's own defaults.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModeOverrides {
    page_cap: Option<usize>,
    delay_ms: Option<u64>,
}

impl ModeOverrides {
    fn over(self, base: PagingCfg) -> ModeConfig {
        let base = ModeConfig::from(base);
        ModeConfig {
            page_cap: self.page_cap.unwrap_or(base.page_cap),
            delay_ms: self.delay_ms.unwrap_or(base.delay_ms),
        }
    }
}

fn batch_mode<'de, D: Deserializer<'de>>(d: D) -> Result<ModeConfig, D::Error> {
    Ok(ModeOverrides::deserialize(d)?.over(PagingCfg::BATCH))
}

fn streaming_mode<'de, D: Deserializer<'de>>(d: D) -> Result<ModeConfig, D::Error> {
    Ok(ModeOverrides::deserialize(d)?.over(PagingCfg::STREAMING))
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarvestConfig {
    #[serde(deserialize_with = "batch_mode")]
    pub batch: ModeConfig,
    #[serde(deserialize_with = "streaming_mode")]
    pub streaming: ModeConfig,
    pub fixture_path: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            batch: PagingCfg::BATCH.into(),
            streaming: PagingCfg::STREAMING.into(),
            fixture_path: PathBuf::from(DEFAULT_FIXTURE_PATH),
        }
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<HarvestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading harvest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "json" => serde_json::from_str(&content).context("parsing harvest config json"),
        _ => toml::from_str(&content).context("parsing harvest config toml"),
    }
}

/// Load config using env var + fallbacks:
/// 1) $HARVEST_CONFIG_PATH
/// 2) config/harvest.toml
/// 3) config/harvest.json
/// 4) built-in defaults
///
/// `$HARVEST_FIXTURE_PATH` overrides `fixture_path` in every case.
pub fn load_config_default() -> Result<HarvestConfig> {
    let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("HARVEST_CONFIG_PATH points to non-existent path"));
        }
        load_config_from(&pb)?
    } else {
        let toml_p = PathBuf::from("config/harvest.toml");
        let json_p = PathBuf::from("config/harvest.json");
        if toml_p.exists() {
            load_config_from(&toml_p)?
        } else if json_p.exists() {
            load_config_from(&json_p)?
        } else {
            HarvestConfig::default()
        }
    };

    if let Ok(p) = std::env::var(ENV_FIXTURE_PATH) {
        if !p.trim().is_empty() {
            cfg.fixture_path = PathBuf::from(p);
        }
    }
    Ok(cfg)
}
