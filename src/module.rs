//! The facade for a single swerve module.
//!
//! A [Module] wraps the [ModuleIo] of one wheel. Once per control cycle it refreshes the
//! instantaneous inputs and takes the position samples the odometry sampler captured for it
//! since the previous cycle. Setpoints are optimized before they are sent to the hardware.

use log::trace;

use crate::hardware::module_io::{ModuleInputs, ModuleIo};
use crate::kinematics::module_state::{ModulePosition, ModuleState};
use crate::odometry::sample_buffer::{DrainedSamples, SampleChannel};
use crate::{Error, MODULE_COUNT};

#[cfg(test)]
#[path = "module_tests.rs"]
mod module_tests;

/// A single swerve module.
pub struct Module {
    /// The position of the module in the module order.
    index: usize,

    /// The hardware of the module.
    io: Box<dyn ModuleIo>,

    /// The latest values read from the hardware.
    inputs: ModuleInputs,

    /// The sample channel of the module, if the hardware provides a position signal.
    channel: Option<SampleChannel>,

    /// The positions drained in the last cycle, oldest first.
    odometry_positions: Vec<ModulePosition>,

    /// The capture times of [Module::odometry_positions].
    odometry_timestamps: Vec<f64>,

    /// Indicates whether the drive speed is scaled by the cosine of the steering error.
    cosine_compensation: bool,

    /// The last optimized setpoint, if any.
    last_setpoint: Option<ModuleState>,
}

impl Module {
    /// Returns the latest steering angle in radians.
    pub fn angle(&self) -> f64 {
        self.inputs.turn_angle
    }

    /// Returns the position of the module in the module order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the last optimized setpoint sent to the hardware.
    pub fn last_setpoint(&self) -> Option<ModuleState> {
        self.last_setpoint
    }

    /// Creates a new [Module] instance.
    ///
    /// ## Parameters
    ///
    /// * 'index' - The position of the module in the module order
    /// * 'io' - The hardware of the module
    /// * 'channel' - The sample channel that holds the positions of the module
    /// * 'cosine_compensation' - Indicates whether the drive speed should be scaled by the
    ///   cosine of the steering error
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidModuleIndex] - Returned when the index is not a valid module index.
    pub fn new(
        index: usize,
        io: Box<dyn ModuleIo>,
        channel: Option<SampleChannel>,
        cosine_compensation: bool,
    ) -> Result<Self, Error> {
        if index >= MODULE_COUNT {
            return Err(Error::InvalidModuleIndex { index });
        }

        Ok(Self {
            index,
            io,
            inputs: ModuleInputs::default(),
            channel,
            odometry_positions: Vec::new(),
            odometry_timestamps: Vec::new(),
            cosine_compensation,
            last_setpoint: None,
        })
    }

    /// Returns the positions drained in the last cycle, oldest first.
    pub fn odometry_positions(&self) -> &[ModulePosition] {
        &self.odometry_positions
    }

    /// Returns the capture times of the positions drained in the last cycle, oldest first.
    pub fn odometry_timestamps(&self) -> &[f64] {
        &self.odometry_timestamps
    }

    /// Refreshes the inputs and takes the samples of this module out of `samples`.
    ///
    /// The samples of the previous cycle are discarded.
    ///
    /// ## Parameters
    ///
    /// * 'samples' - The samples drained from the sample buffer in this cycle.
    pub fn periodic(&mut self, samples: &mut DrainedSamples) {
        self.update_inputs();

        self.odometry_positions.clear();
        self.odometry_timestamps.clear();
        if let Some(channel) = self.channel {
            for sample in samples.take(channel) {
                self.odometry_timestamps.push(sample.timestamp);
                self.odometry_positions.push(sample.position);
            }
        }
    }

    /// Returns the latest cumulative position of the module.
    pub fn position(&self) -> ModulePosition {
        ModulePosition::new(self.inputs.drive_position_m, self.inputs.turn_angle)
    }

    /// Runs the drive motor open loop at the given voltage with the module pointing forward.
    pub fn run_characterization(&mut self, volts: f64) {
        self.io.set_turn_angle(0.0);
        self.io.set_drive_voltage(volts);
        self.last_setpoint = None;
    }

    /// Sends the desired state to the hardware after optimizing it, and returns the optimized
    /// state.
    ///
    /// The optimized state never requires the module to turn more than 90 degrees. If cosine
    /// compensation is enabled the drive velocity sent to the hardware is reduced while the
    /// module is still turning, the returned state holds the uncompensated speed.
    ///
    /// ## Parameters
    ///
    /// * 'desired' - The state the module should reach.
    pub fn run_setpoint(&mut self, desired: ModuleState) -> ModuleState {
        let current_angle = self.angle();
        let optimized = desired.optimize(current_angle);

        let drive_speed = if self.cosine_compensation {
            optimized.cosine_scaled(current_angle).speed()
        } else {
            optimized.speed()
        };

        trace!(
            "Module {} setpoint: {:.3} m/s at {:.3} rad",
            self.index,
            drive_speed,
            optimized.angle()
        );

        self.io.set_turn_angle(optimized.angle());
        self.io.set_drive_velocity(drive_speed);
        self.last_setpoint = Some(optimized);
        optimized
    }

    /// Enables or disables brake mode.
    pub fn set_brake_mode(&mut self, enabled: bool) {
        self.io.set_brake_mode(enabled);
    }

    /// Returns the latest instantaneous state of the module.
    pub fn state(&self) -> ModuleState {
        ModuleState::new(self.inputs.drive_velocity_mps, self.inputs.turn_angle)
    }

    /// Stops the wheel and holds the current steering angle.
    pub fn stop(&mut self) {
        let angle = self.angle();
        self.io.set_turn_angle(angle);
        self.io.set_drive_velocity(0.0);
        self.last_setpoint = Some(ModuleState::new(0.0, angle));
    }

    /// Refreshes the inputs from the hardware.
    pub fn update_inputs(&mut self) {
        self.io.update_inputs(&mut self.inputs);
    }
}
