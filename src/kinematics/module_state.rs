extern crate nalgebra as na;

use std::f64::consts::{FRAC_PI_2, PI};

use na::Vector2;

use crate::geometry::angle::{interpolate_angle, normalize_angle, shortest_rotation_between};

#[cfg(test)]
#[path = "module_state_tests.rs"]
mod module_state_tests;

/// The instantaneous velocity and steering angle of a single swerve module.
///
/// The steering angle is measured relative to the forward axis of the vehicle, counter-clockwise
/// positive, and is kept in the range (-PI, PI].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModuleState {
    /// The linear velocity of the wheel in meters per second.
    speed: f64,

    /// The steering angle in radians.
    angle: f64,
}

impl ModuleState {
    /// Returns the steering angle in radians.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Returns the state with the speed scaled by the cosine of the steering error.
    ///
    /// While the module is still turning towards the desired angle the wheel would push the
    /// vehicle in the wrong direction. Scaling the speed by the cosine of the remaining steering
    /// error reduces that error. The angle is not changed.
    ///
    /// ## Parameters
    ///
    /// * 'current_angle' - The angle the module is currently pointing at.
    pub fn cosine_scaled(&self, current_angle: f64) -> ModuleState {
        let error = shortest_rotation_between(current_angle, self.angle);
        ModuleState {
            speed: self.speed * error.cos(),
            angle: self.angle,
        }
    }

    /// Creates a new [ModuleState] instance.
    ///
    /// ## Parameters
    ///
    /// * 'speed' - The wheel velocity in meters per second
    /// * 'angle' - The steering angle in radians. It is normalized to (-PI, PI].
    pub fn new(speed: f64, angle: f64) -> Self {
        Self {
            speed,
            angle: normalize_angle(angle),
        }
    }

    /// Returns the state that reaches the same wheel velocity with the least steering rotation.
    ///
    /// If reaching the desired angle requires turning the module by more than 90 degrees it is
    /// faster to turn to the opposite angle and drive the wheel in reverse.
    ///
    /// ## Parameters
    ///
    /// * 'current_angle' - The angle the module is currently pointing at.
    ///
    /// ## Example
    ///
    /// ```
    /// use core::f64::consts::PI;
    /// use swerve_drive_odometry::kinematics::module_state::ModuleState;
    ///
    /// let desired = ModuleState::new(2.0, PI);
    /// let optimized = desired.optimize(0.0);
    /// assert_eq!(-2.0, optimized.speed());
    /// assert!(optimized.angle().abs() < 1e-12);
    /// ```
    pub fn optimize(&self, current_angle: f64) -> ModuleState {
        let delta = shortest_rotation_between(current_angle, self.angle);
        if delta.abs() > FRAC_PI_2 {
            ModuleState::new(-self.speed, self.angle + PI)
        } else {
            *self
        }
    }

    /// Returns the wheel velocity in meters per second.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Returns the wheel velocity as a vector in the vehicle frame.
    pub fn velocity_vector(&self) -> Vector2<f64> {
        let (sin, cos) = self.angle.sin_cos();
        Vector2::new(self.speed * cos, self.speed * sin)
    }

    /// Returns the state with the same angle and the given speed.
    pub fn with_speed(&self, speed: f64) -> ModuleState {
        ModuleState {
            speed,
            angle: self.angle,
        }
    }
}

/// The cumulative distance driven by a single swerve module and its steering angle.
///
/// Positions are sampled at a high rate. The difference between two consecutive positions, see
/// [ModulePosition::delta_since], is itself expressed as a [ModulePosition] where the distance
/// is the distance driven in between the samples and the angle is the latest steering angle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModulePosition {
    /// The cumulative distance driven by the wheel in meters.
    distance: f64,

    /// The steering angle in radians.
    angle: f64,
}

impl ModulePosition {
    /// Returns the steering angle in radians.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Returns the motion between `previous` and the current position.
    ///
    /// ## Parameters
    ///
    /// * 'previous' - The position of the module at the previous sample.
    pub fn delta_since(&self, previous: &ModulePosition) -> ModulePosition {
        ModulePosition {
            distance: self.distance - previous.distance,
            angle: self.angle,
        }
    }

    /// Returns the cumulative distance driven in meters.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Linearly interpolates the distance and interpolates the angle along the shortest rotation.
    ///
    /// ## Parameters
    ///
    /// * 'end' - The position returned for `t = 1`
    /// * 't' - The interpolation fraction, clamped to [0, 1]
    pub fn interpolate(&self, end: &ModulePosition, t: f64) -> ModulePosition {
        let t = t.clamp(0.0, 1.0);
        ModulePosition {
            distance: self.distance + (end.distance - self.distance) * t,
            angle: interpolate_angle(self.angle, end.angle, t),
        }
    }

    /// Creates a new [ModulePosition] instance.
    ///
    /// ## Parameters
    ///
    /// * 'distance' - The cumulative distance in meters
    /// * 'angle' - The steering angle in radians. It is normalized to (-PI, PI].
    pub fn new(distance: f64, angle: f64) -> Self {
        Self {
            distance,
            angle: normalize_angle(angle),
        }
    }

    /// Returns the displacement of the wheel as a vector in the vehicle frame, assuming the
    /// position is a delta.
    pub fn displacement_vector(&self) -> Vector2<f64> {
        let (sin, cos) = self.angle.sin_cos();
        Vector2::new(self.distance * cos, self.distance * sin)
    }
}
