extern crate nalgebra as na;

use float_cmp::approx_eq;
use na::{Isometry2, Translation2, UnitComplex, Vector2};

use super::twist::Twist;

#[cfg(test)]
#[path = "pose_tests.rs"]
mod pose_tests;

/// Below this magnitude the series expansions of the exponential and logarithmic maps are used
/// to avoid dividing by (almost) zero.
const SMALL_ANGLE_THRESHOLD: f64 = 1e-9;

/// The position and heading of the vehicle in the plane.
///
/// The pose is the transform from the vehicle frame to the field frame. The vehicle frame has
/// its origin at the center of the chassis, the x-axis pointing forward and the y-axis pointing
/// left. The heading is counter-clockwise positive and is kept in the range (-PI, PI].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// The rigid body transform from the vehicle frame to the field frame.
    isometry: Isometry2<f64>,
}

impl Pose {
    /// Returns the pose obtained by moving from the current pose along the constant curvature
    /// arc described by `twist`.
    ///
    /// This is the exponential map of the planar rigid body group. Unlike a straight line
    /// approximation it is exact for a motion with constant linear and angular velocity.
    ///
    /// ## Parameters
    ///
    /// * 'twist' - The motion in the local frame of the current pose.
    ///
    /// ## Example
    ///
    /// ```
    /// use core::f64::consts::PI;
    /// use swerve_drive_odometry::geometry::{pose::Pose, twist::Twist};
    ///
    /// // Drive a quarter circle with a radius of 1 meter
    /// let end = Pose::identity().exp(&Twist::new(0.5 * PI, 0.0, 0.5 * PI));
    /// assert!((end.x() - 1.0).abs() < 1e-9);
    /// assert!((end.y() - 1.0).abs() < 1e-9);
    /// assert!((end.heading() - 0.5 * PI).abs() < 1e-9);
    /// ```
    pub fn exp(&self, twist: &Twist) -> Pose {
        let dtheta = twist.dtheta;
        let (sin_theta, cos_theta) = dtheta.sin_cos();

        let (s, c) = if dtheta.abs() < SMALL_ANGLE_THRESHOLD {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_theta / dtheta, (1.0 - cos_theta) / dtheta)
        };

        let transform = Isometry2::from_parts(
            Translation2::new(twist.dx * s - twist.dy * c, twist.dx * c + twist.dy * s),
            UnitComplex::from_cos_sin_unchecked(cos_theta, sin_theta),
        );

        Pose {
            isometry: self.isometry * transform,
        }
    }

    /// Returns the heading in radians in the range (-PI, PI].
    pub fn heading(&self) -> f64 {
        self.isometry.rotation.angle()
    }

    /// Returns the pose that is at the origin of the field with a heading of zero.
    pub fn identity() -> Self {
        Self {
            isometry: Isometry2::identity(),
        }
    }

    /// Interpolates between the current pose and `end` along the twist connecting them.
    ///
    /// ## Parameters
    ///
    /// * 'end' - The pose returned for `t = 1`
    /// * 't' - The interpolation fraction. Values outside of [0, 1] are clamped.
    pub fn interpolate(&self, end: &Pose, t: f64) -> Pose {
        if t <= 0.0 {
            return *self;
        }

        if t >= 1.0 {
            return *end;
        }

        let twist = self.log(end);
        self.exp(&(twist * t))
    }

    /// Returns the underlying isometry.
    pub fn isometry(&self) -> &Isometry2<f64> {
        &self.isometry
    }

    /// Returns the twist that moves the current pose to `end`, i.e. the inverse of [Pose::exp].
    ///
    /// ## Parameters
    ///
    /// * 'end' - The pose at the end of the motion.
    pub fn log(&self, end: &Pose) -> Twist {
        let transform = end.relative_to(self);
        let dtheta = transform.heading();
        let half_dtheta = 0.5 * dtheta;

        let cos_minus_one = dtheta.cos() - 1.0;
        let half_theta_by_tan_of_half_dtheta =
            if approx_eq!(f64, cos_minus_one, 0.0, epsilon = SMALL_ANGLE_THRESHOLD) {
                1.0 - dtheta * dtheta / 12.0
            } else {
                -(half_dtheta * dtheta.sin()) / cos_minus_one
            };

        // Rotate by -half_dtheta and scale to undo the arc of the exponential map
        let translation = transform.translation();
        Twist::new(
            translation.x * half_theta_by_tan_of_half_dtheta + translation.y * half_dtheta,
            translation.y * half_theta_by_tan_of_half_dtheta - translation.x * half_dtheta,
            dtheta,
        )
    }

    /// Creates a new [Pose] instance.
    ///
    /// ## Parameters
    ///
    /// * 'x' - The x coordinate in meters
    /// * 'y' - The y coordinate in meters
    /// * 'heading' - The heading in radians
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            isometry: Isometry2::new(Vector2::new(x, y), heading),
        }
    }

    /// Returns the current pose expressed in the frame of `origin`.
    pub fn relative_to(&self, origin: &Pose) -> Pose {
        Pose {
            isometry: origin.isometry.inverse() * self.isometry,
        }
    }

    /// Returns the pose obtained by applying `transform`, expressed in the current frame, to
    /// the current pose.
    pub fn transform_by(&self, transform: &Pose) -> Pose {
        Pose {
            isometry: self.isometry * transform.isometry,
        }
    }

    /// Returns the translation part of the pose.
    pub fn translation(&self) -> Vector2<f64> {
        self.isometry.translation.vector
    }

    /// Returns a pose with the same translation and the given heading.
    pub fn with_heading(&self, heading: f64) -> Pose {
        Pose {
            isometry: Isometry2::from_parts(self.isometry.translation, UnitComplex::new(heading)),
        }
    }

    /// Returns the x coordinate in meters.
    pub fn x(&self) -> f64 {
        self.isometry.translation.x
    }

    /// Returns the y coordinate in meters.
    pub fn y(&self) -> f64 {
        self.isometry.translation.y
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}
