//! Joint configuration
//!
//! Loaded from a TOML file; every field has a default so a partial file (or
//! none at all) is valid.
//!
//! ```toml
//! strategy = "vector"
//! debug = true
//! history_capacity = 3
//! settling_delay_secs = 2.0
//! tick_period_secs = 1.0
//! attach_timeout_secs = 5.0
//! command_min = 31
//! command_max = 255
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::command::{CommandMapper, DEFAULT_COMMAND_MAX, DEFAULT_COMMAND_MIN};
use crate::error::{JointError, JointResult};
use crate::flexion::FlexionStrategy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointConfig {
    /// Flexion strategy, fixed for the run
    pub strategy: FlexionStrategy,
    /// Log every flexion estimate and dispatched command
    pub debug: bool,
    /// Samples kept per sensor channel
    pub history_capacity: usize,
    /// Wait between attaching sensors and capturing the reference pose
    pub settling_delay_secs: f64,
    /// Control loop period
    pub tick_period_secs: f64,
    /// Bounded wait for each sensor to attach
    pub attach_timeout_secs: f64,
    pub command_min: u8,
    pub command_max: u8,
}

impl Default for JointConfig {
    fn default() -> Self {
        Self {
            strategy: FlexionStrategy::Vector,
            debug: false,
            history_capacity: 3,
            settling_delay_secs: 2.0,
            tick_period_secs: 1.0,
            attach_timeout_secs: 5.0,
            command_min: DEFAULT_COMMAND_MIN,
            command_max: DEFAULT_COMMAND_MAX,
        }
    }
}

impl JointConfig {
    pub fn from_toml_str(contents: &str) -> JointResult<Self> {
        let config: JointConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> JointResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded joint configuration from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> JointResult<()> {
        if self.history_capacity == 0 {
            return Err(JointError::Config("history_capacity must be at least 1".into()));
        }
        check_duration("settling_delay_secs", self.settling_delay_secs, true)?;
        check_duration("tick_period_secs", self.tick_period_secs, false)?;
        check_duration("attach_timeout_secs", self.attach_timeout_secs, false)?;
        if self.command_min > self.command_max {
            return Err(JointError::Config(format!(
                "command_min {} exceeds command_max {}",
                self.command_min, self.command_max
            )));
        }
        Ok(())
    }

    pub fn settling_delay(&self) -> Duration {
        Duration::from_secs_f64(self.settling_delay_secs)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(self.tick_period_secs)
    }

    pub fn attach_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.attach_timeout_secs)
    }

    pub fn command_mapper(&self) -> CommandMapper {
        CommandMapper::new(self.command_min, self.command_max)
    }
}

fn check_duration(name: &str, secs: f64, allow_zero: bool) -> JointResult<()> {
    let valid = secs.is_finite() && (secs > 0.0 || (allow_zero && secs == 0.0));
    if valid {
        Ok(())
    } else {
        Err(JointError::Config(format!("{} out of range: {}", name, secs)))
    }
}
