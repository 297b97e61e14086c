//! Configuration of the drivetrain.
//!
//! The configuration is loaded from TOML. Every value has a default, so a configuration file only
//! needs to contain the values that differ from the defaults. The defaults describe a square
//! drive base with a 28 inch track width and a maximum wheel speed of 14.5 feet per second.

extern crate nalgebra as na;

use std::{fs::read_to_string, path::Path, time::Duration};

use log::debug;
use na::Vector2;
use serde::{Deserialize, Serialize};

use crate::estimation::prediction::DEFAULT_LOOKAHEAD_SECONDS;
use crate::estimation::vision::VisionPolicy;
use crate::hardware::HardwareBackend;
use crate::{Error, MODULE_COUNT};

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

/// Half of the track width of the default drive base, in meters.
const DEFAULT_HALF_TRACK_WIDTH: f64 = 0.3556;

/// The configuration of a [Drivetrain](crate::drivetrain::Drivetrain).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct DrivetrainConfig {
    /// The period of the control loop in seconds.
    pub control_period_seconds: f64,

    /// The rate at which the module positions are sampled.
    pub odometry_frequency_hz: f64,

    /// The number of samples kept per module between two control cycles.
    pub sample_queue_capacity: usize,

    /// The maximum wheel speed in meters per second.
    pub max_linear_speed_mps: f64,

    /// The offsets `[x, y]` of the modules from the center of the chassis in meters, in the
    /// order front left, front right, back left, back right.
    pub module_offsets: Vec<[f64; 2]>,

    /// The default time, in seconds, the pose is predicted ahead.
    pub lookahead_seconds: f64,

    /// Indicates whether the drive speed is scaled by the cosine of the steering error.
    pub cosine_compensation: bool,

    /// The hardware the drivetrain uses.
    pub backend: HardwareBackend,

    /// The vision correction policy.
    pub vision: VisionPolicy,
}

impl Default for DrivetrainConfig {
    fn default() -> Self {
        Self {
            control_period_seconds: 0.02,
            odometry_frequency_hz: 250.0,
            sample_queue_capacity: 20,
            max_linear_speed_mps: 4.4196,
            module_offsets: vec![
                [DEFAULT_HALF_TRACK_WIDTH, DEFAULT_HALF_TRACK_WIDTH],
                [DEFAULT_HALF_TRACK_WIDTH, -DEFAULT_HALF_TRACK_WIDTH],
                [-DEFAULT_HALF_TRACK_WIDTH, DEFAULT_HALF_TRACK_WIDTH],
                [-DEFAULT_HALF_TRACK_WIDTH, -DEFAULT_HALF_TRACK_WIDTH],
            ],
            lookahead_seconds: DEFAULT_LOOKAHEAD_SECONDS,
            cosine_compensation: true,
            backend: HardwareBackend::default(),
            vision: VisionPolicy::default(),
        }
    }
}

fn invalid(field: &str, reason: String) -> Error {
    Error::InvalidConfiguration {
        field: field.to_string(),
        reason,
    }
}

fn require_positive(field: &str, value: f64) -> Result<(), Error> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("expected a positive number, got {}", value),
        ))
    }
}

impl DrivetrainConfig {
    /// Parses a configuration from TOML and validates it.
    ///
    /// ## Parameters
    ///
    /// * 'content' - The TOML text.
    ///
    /// ## Errors
    ///
    /// * [Error::FailedToParseConfiguration] - Returned when the text is not valid TOML or does
    ///   not match the configuration layout.
    /// * Any error returned by [DrivetrainConfig::validate].
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let config: DrivetrainConfig =
            toml::from_str(content).map_err(|err| Error::FailedToParseConfiguration {
                reason: err.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file and validates it.
    ///
    /// ## Parameters
    ///
    /// * 'path' - The path of the configuration file.
    ///
    /// ## Errors
    ///
    /// * [Error::FailedToReadConfiguration] - Returned when the file cannot be read.
    /// * Any error returned by [DrivetrainConfig::from_toml_str].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = read_to_string(path).map_err(|err| Error::FailedToReadConfiguration {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;

        debug!("Loading the drivetrain configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Returns the module offsets as vectors.
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidModuleCount] - Returned when there are not exactly four offsets.
    pub fn module_offset_vectors(&self) -> Result<[Vector2<f64>; MODULE_COUNT], Error> {
        if self.module_offsets.len() != MODULE_COUNT {
            return Err(Error::InvalidModuleCount {
                count: self.module_offsets.len(),
            });
        }

        let mut offsets = [Vector2::zeros(); MODULE_COUNT];
        for (offset, [x, y]) in offsets.iter_mut().zip(self.module_offsets.iter()) {
            *offset = Vector2::new(*x, *y);
        }

        Ok(offsets)
    }

    /// Checks that all values are within their allowed range.
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when a value is outside of its allowed range.
    /// * [Error::InvalidModuleCount] - Returned when there are not exactly four module offsets.
    pub fn validate(&self) -> Result<(), Error> {
        require_positive("control_period_seconds", self.control_period_seconds)?;
        require_positive("odometry_frequency_hz", self.odometry_frequency_hz)?;
        if let Err(err) = Duration::try_from_secs_f64(1.0 / self.odometry_frequency_hz) {
            return Err(invalid(
                "odometry_frequency_hz",
                format!(
                    "the sampling period of {} Hz is {}",
                    self.odometry_frequency_hz, err
                ),
            ));
        }
        require_positive("max_linear_speed_mps", self.max_linear_speed_mps)?;
        require_positive("vision.history_seconds", self.vision.history_seconds)?;

        if self.sample_queue_capacity == 0 {
            return Err(invalid(
                "sample_queue_capacity",
                "expected at least one sample".to_string(),
            ));
        }

        if self.vision.queue_capacity == 0 {
            return Err(invalid(
                "vision.queue_capacity",
                "expected at least one measurement".to_string(),
            ));
        }

        if !self.lookahead_seconds.is_finite() || self.lookahead_seconds < 0.0 {
            return Err(invalid(
                "lookahead_seconds",
                format!(
                    "expected a non-negative number, got {}",
                    self.lookahead_seconds
                ),
            ));
        }

        if !(self.vision.max_gain > 0.0 && self.vision.max_gain < 1.0) {
            return Err(invalid(
                "vision.max_gain",
                format!("expected a value in (0, 1), got {}", self.vision.max_gain),
            ));
        }

        if self
            .vision
            .state_std_devs
            .iter()
            .any(|value| !value.is_finite() || *value < 0.0)
        {
            return Err(invalid(
                "vision.state_std_devs",
                format!(
                    "expected non-negative numbers, got {:?}",
                    self.vision.state_std_devs
                ),
            ));
        }

        self.module_offset_vectors()?;
        Ok(())
    }
}
