//! # Simulation Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an
//! empty file is a valid configuration.
//!
//! ```toml
//! [activity]
//! idle_after_frames = 60
//! sweep_interval_frames = 600
//! tracked_kinds = ["item_acceptor", "item_ejector", "item_processor"]
//!
//! [dispatch]
//! parallel_phases = true
//! tick_rate = 60
//! slow_tick_warn_ms = 33
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::ComponentKind;
use crate::error::{CoreError, CoreResult};

/// Frames a blocked subject may wait before it is idled.
pub const DEFAULT_IDLE_AFTER_FRAMES: u32 = 60;

/// Frames between dangling-edge sweeps.
pub const DEFAULT_SWEEP_INTERVAL_FRAMES: u64 = 600;

/// Activity tracker settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivityConfig {
    /// A subject blocked for more than this many consecutive frames is idled.
    pub idle_after_frames: u32,
    /// Frames between dangling-edge sweeps. Zero disables the sweep.
    pub sweep_interval_frames: u64,
    /// Component kinds that get their own activity container.
    pub tracked_kinds: Vec<ComponentKind>,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            idle_after_frames: DEFAULT_IDLE_AFTER_FRAMES,
            sweep_interval_frames: DEFAULT_SWEEP_INTERVAL_FRAMES,
            tracked_kinds: vec![
                ComponentKind::ItemAcceptor,
                ComponentKind::ItemEjector,
                ComponentKind::ItemProcessor,
                ComponentKind::Storage,
                ComponentKind::UndergroundBelt,
                ComponentKind::Miner,
            ],
        }
    }
}

impl ActivityConfig {
    /// Settings for tests: short idle threshold, no periodic sweep.
    #[must_use]
    pub fn with_threshold(idle_after_frames: u32) -> Self {
        Self {
            idle_after_frames,
            sweep_interval_frames: 0,
            ..Self::default()
        }
    }
}

/// Update dispatch settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Run systems of the same phase on scoped threads when all allow it.
    pub parallel_phases: bool,
    /// Target ticks per second.
    pub tick_rate: u32,
    /// Ticks slower than this are logged as warnings.
    pub slow_tick_warn_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            parallel_phases: false,
            tick_rate: 60,
            slow_tick_warn_ms: 33,
        }
    }
}

/// Complete simulation configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Activity tracker settings.
    pub activity: ActivityConfig,
    /// Update dispatch settings.
    pub dispatch: DispatchConfig,
}

impl SimulationConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigParse` for malformed TOML or unknown keys, and
    /// `InvalidConfig` when validation fails.
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| CoreError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigIo` if the file cannot be read, otherwise as
    /// [`SimulationConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CoreError::ConfigIo {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the offending field.
    pub fn validate(&self) -> CoreResult<()> {
        if self.dispatch.tick_rate == 0 {
            return Err(CoreError::InvalidConfig(
                "dispatch.tick_rate must be greater than zero".to_string(),
            ));
        }
        let mut seen = crate::ecs::ComponentMask::EMPTY;
        for kind in &self.activity.tracked_kinds {
            if !seen.insert(*kind) {
                return Err(CoreError::InvalidConfig(format!(
                    "activity.tracked_kinds lists {kind:?} twice"
                )));
            }
        }
        Ok(())
    }
}
