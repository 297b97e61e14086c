use std::ops::Mul;

/// A rigid body motion in the local frame of the vehicle.
///
/// A twist either describes an incremental displacement over some interval (i.e. the motion
/// between two odometry samples) or an instantaneous velocity. It is applied to a
/// [Pose](super::pose::Pose) through [Pose::exp](super::pose::Pose::exp) which assumes that the
/// motion follows a constant curvature arc.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Twist {
    /// The displacement along the local x-axis (forward) in meters.
    pub dx: f64,

    /// The displacement along the local y-axis (left) in meters.
    pub dy: f64,

    /// The rotation in radians, counter-clockwise positive.
    pub dtheta: f64,
}

impl Twist {
    /// Creates a new [Twist] instance.
    ///
    /// ## Parameters
    ///
    /// * 'dx' - The displacement along the local x-axis in meters
    /// * 'dy' - The displacement along the local y-axis in meters
    /// * 'dtheta' - The rotation in radians
    pub fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Self { dx, dy, dtheta }
    }

    /// Returns the twist with each component scaled by the matching component of `factors`.
    pub fn scaled_per_axis(&self, factors: [f64; 3]) -> Self {
        Self {
            dx: self.dx * factors[0],
            dy: self.dy * factors[1],
            dtheta: self.dtheta * factors[2],
        }
    }
}

impl Mul<f64> for Twist {
    type Output = Twist;

    fn mul(self, factor: f64) -> Twist {
        Twist {
            dx: self.dx * factor,
            dy: self.dy * factor,
            dtheta: self.dtheta * factor,
        }
    }
}
