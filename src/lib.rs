#![warn(missing_docs)]

//! Odometry sampling, pose fusion and velocity command handling for a swerve (4 wheel steering
//! and 4 wheel drive) vehicle.
//!
//! Wheel positions are sampled by a background producer at a rate higher than the control loop.
//! Every control cycle the [drivetrain::Drivetrain] drains those samples, replays them in time
//! order through three pose estimators (combined, wheel-only and vision-only) and turns velocity
//! requests into optimized per-module setpoints.

use thiserror::Error;

/// The number of swerve modules on the vehicle.
pub const MODULE_COUNT: usize = 4;

/// Loading and validation of the drivetrain configuration.
pub mod config;

/// Assembly of the modules, the odometry sampler and the pose fusion into a single drivetrain.
pub mod drivetrain;

/// Pose estimators, the pose fusion engine and pose prediction.
pub mod estimation;

/// Planar geometry types: angles, poses and twists.
pub mod geometry;

/// Interfaces for the module and gyro hardware, and the built-in simulated backends.
pub mod hardware;

/// Conversions between chassis motion and per-module motion.
pub mod kinematics;

/// The per-wheel module facade.
pub mod module;

/// Background sampling of the module position signals.
pub mod odometry;

/// Defines the different errors for the swerve drive odometry crate.
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The configuration could not be parsed.
    #[error("Failed to parse the drivetrain configuration: {reason}")]
    FailedToParseConfiguration {
        /// The parser message.
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read the drivetrain configuration from {path}: {reason}")]
    FailedToReadConfiguration {
        /// The path of the configuration file.
        path: String,
        /// The I/O error message.
        reason: String,
    },

    /// The background odometry sampler thread could not be started.
    #[error("Failed to start the odometry sampler: {reason}")]
    FailedToStartOdometrySampler {
        /// The reason the thread could not be started.
        reason: String,
    },

    /// A configuration value is outside of its allowed range.
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfiguration {
        /// The name of the configuration field.
        field: String,
        /// The reason the value was rejected.
        reason: String,
    },

    /// The module offsets do not describe a valid swerve geometry.
    #[error("Invalid module geometry: {reason}")]
    InvalidGeometry {
        /// The reason the geometry was rejected.
        reason: String,
    },

    /// The number of modules differs from [MODULE_COUNT].
    #[error("Expected {} modules but got {count}", MODULE_COUNT)]
    InvalidModuleCount {
        /// The number of modules that was provided.
        count: usize,
    },

    /// A module index outside of the range [0, [MODULE_COUNT]).
    #[error("Invalid module index {index}")]
    InvalidModuleIndex {
        /// The index that was provided.
        index: usize,
    },

    /// The odometry sampler was asked to start while it was already running.
    #[error("The odometry sampler is already running")]
    OdometrySamplerAlreadyRunning,
}
