//! Configuration loading.
//!
//! Layering (later wins): built-in defaults ← TOML file ← `HARVEST_*`
//! environment variables. Nested keys use `__`, e.g.
//! `HARVEST_VISUAL__STAGE_COUNT=8`.
//!
//! ```toml
//! liveness_timeout_ticks = 4
//! reentry_cooldown_ticks = 2
//!
//! [visual]
//! stage_count = 10
//! pace = 1.0
//!
//! [durations.reinforced_deepslate]
//! ticks = 1100
//! family = "mining"
//! ```

use crate::error::{HarvestError, Result};
use crate::types::HarvestConfig;
use config::{Config, Environment, File, FileFormat};
use log::warn;
use std::path::Path;

pub const ENV_PREFIX: &str = "HARVEST";

/// Smallest usable liveness timeout. Signals are recorded between ticks, so a
/// healthy actor is always seen one tick late.
pub const MIN_LIVENESS_TIMEOUT_TICKS: u64 = 2;

pub fn load_config(path: Option<&Path>) -> Result<HarvestConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }
    finish(builder)
}

/// Same layering as [`load_config`], with the file given inline.
pub fn load_config_str(toml: &str) -> Result<HarvestConfig> {
    finish(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
}

fn finish(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<HarvestConfig> {
    let config: HarvestConfig = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &HarvestConfig) -> Result<()> {
    if !(config.tick_rate_hz.is_finite() && config.tick_rate_hz > 0.0) {
        return Err(HarvestError::InvalidConfig(format!(
            "tick_rate_hz must be positive, got {}",
            config.tick_rate_hz
        )));
    }
    if config.liveness_timeout_ticks < MIN_LIVENESS_TIMEOUT_TICKS {
        return Err(HarvestError::InvalidConfig(format!(
            "liveness_timeout_ticks must be at least {}, got {}",
            MIN_LIVENESS_TIMEOUT_TICKS, config.liveness_timeout_ticks
        )));
    }
    if config.monitor_interval_ticks == 0 {
        return Err(HarvestError::InvalidConfig(
            "monitor_interval_ticks must be at least 1".into(),
        ));
    }
    if config.visual.stage_count == 0 {
        return Err(HarvestError::InvalidConfig(
            "visual.stage_count must be at least 1".into(),
        ));
    }
    if !(config.visual.pace.is_finite() && config.visual.pace > 0.0) {
        return Err(HarvestError::InvalidConfig(format!(
            "visual.pace must be positive, got {}",
            config.visual.pace
        )));
    }
    if config.default_duration_ticks == 0 {
        return Err(HarvestError::InvalidConfig(
            "default_duration_ticks must be at least 1".into(),
        ));
    }
    if let Some((name, _)) = config.durations.iter().find(|(_, d)| d.ticks == 0) {
        return Err(HarvestError::InvalidConfig(format!(
            "duration for '{}' must be at least 1 tick",
            name
        )));
    }

    // A stalled actor should be caught before the next stage shows.
    let default_stage = config.default_duration_ticks as f64 * config.visual.pace
        / f64::from(config.visual.stage_count);
    if (config.liveness_timeout_ticks as f64) >= default_stage {
        warn!(
            "liveness_timeout_ticks ({}) is not shorter than the default stage interval ({:.1} ticks)",
            config.liveness_timeout_ticks, default_stage
        );
    }

    Ok(())
}
