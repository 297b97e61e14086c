use crate::geometry::twist::Twist;

/// Rotations per period below this value, in radians, use the series expansion of the
/// translation scale.
const SMALL_ROTATION: f64 = 1e-4;

/// Half rotations per period with a sine below this value complete a whole number of turns.
const SINGULAR_ROTATION: f64 = 1e-9;

#[cfg(test)]
#[path = "chassis_speeds_tests.rs"]
mod chassis_speeds_tests;

/// The velocity of the vehicle as a whole.
///
/// Unless stated otherwise the speeds are robot relative, i.e. `vx` is along the forward axis of
/// the vehicle and `vy` is along the left axis. Field relative speeds use the axes of the field
/// frame instead and can be converted with [ChassisSpeeds::from_field_relative].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChassisSpeeds {
    /// The velocity along the x-axis in meters per second.
    pub vx: f64,

    /// The velocity along the y-axis in meters per second.
    pub vy: f64,

    /// The angular velocity in radians per second, counter-clockwise positive.
    pub omega: f64,
}

impl ChassisSpeeds {
    /// Returns the speeds that, when held constant for `dt` seconds, produce the same end pose as
    /// driving the requested speeds along a straight line while turning.
    ///
    /// Applying a translation and a rotation at the same time for a finite period makes the
    /// vehicle drift sideways because the translation direction rotates with the vehicle. The
    /// discretized speeds compensate for that drift over one control period.
    ///
    /// ## Parameters
    ///
    /// * 'dt' - The duration of the control period in seconds. Non-positive durations return the
    ///   speeds unchanged.
    pub fn discretize(&self, dt: f64) -> ChassisSpeeds {
        if dt <= 0.0 {
            return *self;
        }

        // The translation is rotated back by half the rotation of the period and scaled so that
        // the arc ends at the requested translation. The rotation is not wrapped.
        let half_rotation = 0.5 * self.omega * dt;
        let (sin, cos) = half_rotation.sin_cos();
        let scale = if half_rotation.abs() < SMALL_ROTATION {
            1.0 + half_rotation * half_rotation / 6.0
        } else if sin.abs() < SINGULAR_ROTATION {
            // A whole number of turns per period, no arc ends at the requested translation.
            return *self;
        } else {
            half_rotation / sin
        };

        ChassisSpeeds {
            vx: (self.vx * cos + self.vy * sin) * scale,
            vy: (-self.vx * sin + self.vy * cos) * scale,
            omega: self.omega,
        }
    }

    /// Converts field relative speeds into robot relative speeds.
    ///
    /// ## Parameters
    ///
    /// * 'field_speeds' - The speeds expressed in the field frame
    /// * 'heading' - The heading of the vehicle in the field frame, in radians
    pub fn from_field_relative(field_speeds: &ChassisSpeeds, heading: f64) -> ChassisSpeeds {
        let (sin, cos) = heading.sin_cos();
        ChassisSpeeds {
            vx: field_speeds.vx * cos + field_speeds.vy * sin,
            vy: -field_speeds.vx * sin + field_speeds.vy * cos,
            omega: field_speeds.omega,
        }
    }

    /// Returns a value indicating whether all components are exactly zero.
    pub fn is_stationary(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0 && self.omega == 0.0
    }

    /// Creates a new [ChassisSpeeds] instance.
    ///
    /// ## Parameters
    ///
    /// * 'vx' - The velocity along the x-axis in meters per second
    /// * 'vy' - The velocity along the y-axis in meters per second
    /// * 'omega' - The angular velocity in radians per second
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    /// Converts robot relative speeds into field relative speeds.
    ///
    /// ## Parameters
    ///
    /// * 'heading' - The heading of the vehicle in the field frame, in radians
    pub fn to_field_relative(&self, heading: f64) -> ChassisSpeeds {
        let (sin, cos) = heading.sin_cos();
        ChassisSpeeds {
            vx: self.vx * cos - self.vy * sin,
            vy: self.vx * sin + self.vy * cos,
            omega: self.omega,
        }
    }

    /// Returns the motion produced by holding the speeds for `dt` seconds.
    pub fn to_twist(&self, dt: f64) -> Twist {
        Twist::new(self.vx * dt, self.vy * dt, self.omega * dt)
    }

    /// Returns speeds that are zero in all components.
    pub fn zero() -> Self {
        Self::default()
    }
}
