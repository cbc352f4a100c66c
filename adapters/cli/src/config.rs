use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Timing of a scripted session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct EngineConfig {
    /// Simulation ticks per second of game time.
    pub(crate) ticks_per_second: u32,
    /// Upper bound on ticks a session may run.
    pub(crate) max_ticks: u32,
    /// Ticks an animation plays before the presenter acknowledges it.
    pub(crate) animation_ticks: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 30,
            max_ticks: 10_000,
            animation_ticks: 4,
        }
    }
}

impl EngineConfig {
    /// Reads the configuration at `path`, or the defaults when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid engine config at {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).context("failed to parse engine config toml contents")?;
        if config.ticks_per_second == 0 {
            bail!("ticks_per_second must be positive");
        }
        if config.max_ticks == 0 {
            bail!("max_ticks must be positive");
        }
        if config.animation_ticks == 0 {
            bail!("animation_ticks must be positive");
        }
        Ok(config)
    }

    /// Game time covered by one tick.
    pub(crate) fn tick_duration(&self) -> Duration {
        Duration::from_secs(1) / self.ticks_per_second.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = EngineConfig::parse("max_ticks = 120").expect("valid config");
        assert_eq!(
            config,
            EngineConfig {
                max_ticks: 120,
                ..EngineConfig::default()
            }
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = EngineConfig::parse("tick_rate = 60").expect_err("unknown key");
        assert!(format!("{error:#}").contains("tick_rate"));
    }

    #[test]
    fn zero_rates_are_rejected() {
        assert!(EngineConfig::parse("ticks_per_second = 0").is_err());
        assert!(EngineConfig::parse("animation_ticks = 0").is_err());
    }

    #[test]
    fn tick_duration_divides_a_second() {
        let config = EngineConfig {
            ticks_per_second: 50,
            ..EngineConfig::default()
        };
        assert_eq!(config.tick_duration(), Duration::from_millis(20));
    }
}
