//! Simulated and disabled hardware.
//!
//! The simulated hardware is ideal: the steering angle follows its setpoint instantly and the
//! wheel runs at the commanded velocity. The state is shared between the hardware object owned
//! by the drivetrain and a handle, so that tests and simulators can move the wheels or
//! disconnect sensors while the drivetrain is running.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::geometry::angle::normalize_angle;
use crate::kinematics::module_state::ModulePosition;

use super::gyro_io::{GyroInputs, GyroIo};
use super::module_io::{ModuleInputs, ModuleIo, ModulePositionSource};

#[cfg(test)]
#[path = "simulation_tests.rs"]
mod simulation_tests;

/// The wheel velocity reached per volt applied to the simulated drive motor.
const FREE_SPEED_PER_VOLT: f64 = 4.4196 / 12.0;

#[derive(Debug)]
struct SimModuleState {
    connected: bool,
    distance: f64,
    velocity: f64,
    angle: f64,
    drive_applied_volts: f64,
    commanded_velocity: Option<f64>,
    brake_enabled: bool,
}

impl Default for SimModuleState {
    fn default() -> Self {
        Self {
            connected: true,
            distance: 0.0,
            velocity: 0.0,
            angle: 0.0,
            drive_applied_volts: 0.0,
            commanded_velocity: None,
            brake_enabled: false,
        }
    }
}

fn lock(state: &Arc<Mutex<SimModuleState>>) -> MutexGuard<'_, SimModuleState> {
    state.lock().unwrap_or_else(|err| err.into_inner())
}

/// A simulated swerve module.
pub struct SimModuleIo {
    state: Arc<Mutex<SimModuleState>>,
    source_taken: bool,
}

impl SimModuleIo {
    /// Creates a new simulated module and the handle that controls it.
    pub fn new() -> (Self, SimModuleHandle) {
        let state = Arc::new(Mutex::new(SimModuleState::default()));
        (
            Self {
                state: state.clone(),
                source_taken: false,
            },
            SimModuleHandle { state },
        )
    }
}

impl ModuleIo for SimModuleIo {
    fn odometry_source(&mut self) -> Option<Box<dyn ModulePositionSource>> {
        if self.source_taken {
            return None;
        }

        self.source_taken = true;
        Some(Box::new(SimPositionSource {
            state: self.state.clone(),
        }))
    }

    fn set_brake_mode(&mut self, enabled: bool) {
        lock(&self.state).brake_enabled = enabled;
    }

    fn set_drive_velocity(&mut self, velocity_mps: f64) {
        let mut state = lock(&self.state);
        state.commanded_velocity = Some(velocity_mps);
        state.velocity = velocity_mps;
        state.drive_applied_volts = velocity_mps / FREE_SPEED_PER_VOLT;
    }

    fn set_drive_voltage(&mut self, volts: f64) {
        let mut state = lock(&self.state);
        state.commanded_velocity = None;
        state.drive_applied_volts = volts;
        state.velocity = volts * FREE_SPEED_PER_VOLT;
    }

    fn set_turn_angle(&mut self, angle: f64) {
        lock(&self.state).angle = normalize_angle(angle);
    }

    fn update_inputs(&mut self, inputs: &mut ModuleInputs) {
        let state = lock(&self.state);
        inputs.drive_connected = state.connected;
        inputs.turn_connected = state.connected;
        if !state.connected {
            return;
        }

        inputs.drive_position_m = state.distance;
        inputs.drive_velocity_mps = state.velocity;
        inputs.drive_applied_volts = state.drive_applied_volts;
        inputs.drive_current_amps = 0.0;
        inputs.turn_angle = state.angle;
        inputs.turn_velocity_rad_per_sec = 0.0;
        inputs.turn_applied_volts = 0.0;
        inputs.turn_current_amps = 0.0;
    }
}

struct SimPositionSource {
    state: Arc<Mutex<SimModuleState>>,
}

impl ModulePositionSource for SimPositionSource {
    fn read_position(&mut self) -> Option<ModulePosition> {
        let state = lock(&self.state);
        if state.connected {
            Some(ModulePosition::new(state.distance, state.angle))
        } else {
            None
        }
    }
}

/// Controls a [SimModuleIo] from outside of the drivetrain.
#[derive(Clone)]
pub struct SimModuleHandle {
    state: Arc<Mutex<SimModuleState>>,
}

impl SimModuleHandle {
    /// Moves the wheel for `dt` seconds at its current velocity.
    pub fn advance(&self, dt: f64) {
        let mut state = lock(&self.state);
        state.distance += state.velocity * dt;
    }

    /// Returns a value indicating whether brake mode is enabled.
    pub fn brake_enabled(&self) -> bool {
        lock(&self.state).brake_enabled
    }

    /// Returns the last closed loop velocity command, or `None` if the drive motor is running
    /// open loop.
    pub fn commanded_velocity(&self) -> Option<f64> {
        lock(&self.state).commanded_velocity
    }

    /// Returns the voltage applied to the drive motor.
    pub fn drive_applied_volts(&self) -> f64 {
        lock(&self.state).drive_applied_volts
    }

    /// Returns the current position of the module.
    pub fn position(&self) -> ModulePosition {
        let state = lock(&self.state);
        ModulePosition::new(state.distance, state.angle)
    }

    /// Connects or disconnects the module.
    pub fn set_connected(&self, connected: bool) {
        lock(&self.state).connected = connected;
    }

    /// Moves the module to the given cumulative distance and steering angle.
    pub fn set_position(&self, distance: f64, angle: f64) {
        let mut state = lock(&self.state);
        state.distance = distance;
        state.angle = normalize_angle(angle);
    }

    /// Overrides the wheel velocity in meters per second.
    pub fn set_velocity(&self, velocity_mps: f64) {
        lock(&self.state).velocity = velocity_mps;
    }
}

#[derive(Debug, Default)]
struct SimGyroState {
    connected: bool,
    yaw: f64,
    yaw_velocity: f64,
}

/// A simulated orientation sensor.
///
/// The sensor starts disconnected, in which case the drivetrain falls back to the heading
/// derived from the wheels.
pub struct SimGyroIo {
    state: Arc<Mutex<SimGyroState>>,
}

impl SimGyroIo {
    /// Creates a new simulated gyro and the handle that controls it.
    pub fn new() -> (Self, SimGyroHandle) {
        let state = Arc::new(Mutex::new(SimGyroState::default()));
        (
            Self {
                state: state.clone(),
            },
            SimGyroHandle { state },
        )
    }
}

impl GyroIo for SimGyroIo {
    fn update_inputs(&mut self, inputs: &mut GyroInputs) {
        let state = self.state.lock().unwrap_or_else(|err| err.into_inner());
        inputs.connected = state.connected;
        if state.connected {
            inputs.yaw = state.yaw;
            inputs.yaw_velocity_rad_per_sec = state.yaw_velocity;
        }
    }

    fn zero(&mut self) {
        self.state.lock().unwrap_or_else(|err| err.into_inner()).yaw = 0.0;
    }
}

/// Controls a [SimGyroIo] from outside of the drivetrain.
#[derive(Clone)]
pub struct SimGyroHandle {
    state: Arc<Mutex<SimGyroState>>,
}

impl SimGyroHandle {
    /// Connects or disconnects the gyro.
    pub fn set_connected(&self, connected: bool) {
        self.state
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .connected = connected;
    }

    /// Sets the yaw and yaw rate reported by the gyro.
    pub fn set_yaw(&self, yaw: f64, yaw_velocity: f64) {
        let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
        state.yaw = normalize_angle(yaw);
        state.yaw_velocity = yaw_velocity;
    }

    /// Returns the yaw reported by the gyro.
    pub fn yaw(&self) -> f64 {
        self.state.lock().unwrap_or_else(|err| err.into_inner()).yaw
    }
}

/// A module that is never connected and ignores all commands.
pub struct DisabledModuleIo;

impl ModuleIo for DisabledModuleIo {
    fn odometry_source(&mut self) -> Option<Box<dyn ModulePositionSource>> {
        None
    }

    fn set_brake_mode(&mut self, _enabled: bool) {}

    fn set_drive_velocity(&mut self, _velocity_mps: f64) {}

    fn set_drive_voltage(&mut self, _volts: f64) {}

    fn set_turn_angle(&mut self, _angle: f64) {}

    fn update_inputs(&mut self, inputs: &mut ModuleInputs) {
        inputs.drive_connected = false;
        inputs.turn_connected = false;
    }
}

/// A gyro that is never connected.
pub struct DisabledGyroIo;

impl GyroIo for DisabledGyroIo {
    fn update_inputs(&mut self, inputs: &mut GyroInputs) {
        inputs.connected = false;
    }

    fn zero(&mut self) {}
}
