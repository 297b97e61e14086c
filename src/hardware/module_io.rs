use crate::kinematics::module_state::ModulePosition;

/// The values read from a single swerve module in a single control cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModuleInputs {
    /// Indicates whether the drive motor is connected.
    pub drive_connected: bool,

    /// The cumulative distance driven by the wheel in meters.
    pub drive_position_m: f64,

    /// The wheel velocity in meters per second.
    pub drive_velocity_mps: f64,

    /// The voltage applied to the drive motor.
    pub drive_applied_volts: f64,

    /// The current drawn by the drive motor in amps.
    pub drive_current_amps: f64,

    /// Indicates whether the steering motor is connected.
    pub turn_connected: bool,

    /// The steering angle in radians.
    pub turn_angle: f64,

    /// The steering angular velocity in radians per second.
    pub turn_velocity_rad_per_sec: f64,

    /// The voltage applied to the steering motor.
    pub turn_applied_volts: f64,

    /// The current drawn by the steering motor in amps.
    pub turn_current_amps: f64,
}

/// A signal that reports the position of a module, read by the odometry sampler.
///
/// Sources are read from the sampler thread so they must not hold on to anything that is only
/// valid on the control thread.
pub trait ModulePositionSource: Send {
    /// Reads the current position of the module.
    ///
    /// Returns `None` if the signal could not be read.
    fn read_position(&mut self) -> Option<ModulePosition>;
}

/// Defines the interface for the motors and sensors of a single swerve module.
pub trait ModuleIo: Send {
    /// Returns the position signal for the odometry sampler.
    ///
    /// Returns `None` if the hardware cannot provide a position signal, or if the signal has
    /// already been taken.
    fn odometry_source(&mut self) -> Option<Box<dyn ModulePositionSource>>;

    /// Enables or disables brake mode on both motors.
    fn set_brake_mode(&mut self, enabled: bool);

    /// Runs the drive motor at the given velocity in meters per second.
    fn set_drive_velocity(&mut self, velocity_mps: f64);

    /// Runs the drive motor open loop at the given voltage.
    fn set_drive_voltage(&mut self, volts: f64);

    /// Turns the module to the given angle in radians.
    fn set_turn_angle(&mut self, angle: f64);

    /// Updates `inputs` with the latest values from the hardware.
    fn update_inputs(&mut self, inputs: &mut ModuleInputs);
}
