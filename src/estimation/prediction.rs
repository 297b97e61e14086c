use crate::geometry::pose::Pose;
use crate::kinematics::chassis_speeds::ChassisSpeeds;

#[cfg(test)]
#[path = "prediction_tests.rs"]
mod prediction_tests;

/// The default time, in seconds, the pose is extrapolated ahead.
pub const DEFAULT_LOOKAHEAD_SECONDS: f64 = 0.05;

/// Extrapolates a pose with the current velocity of the vehicle.
///
/// The velocity is assumed to be constant over the lookahead interval, in which case the
/// vehicle follows an arc and the exponential map gives the exact end pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PosePredictor {
    lookahead_seconds: f64,
}

impl PosePredictor {
    /// Returns the default lookahead in seconds.
    pub fn lookahead_seconds(&self) -> f64 {
        self.lookahead_seconds
    }

    /// Creates a new [PosePredictor] with the given default lookahead in seconds.
    pub fn new(lookahead_seconds: f64) -> Self {
        Self { lookahead_seconds }
    }

    /// Returns the pose reached after the default lookahead.
    ///
    /// ## Parameters
    ///
    /// * 'pose' - The current pose
    /// * 'speeds' - The current robot relative velocity
    pub fn predict(&self, pose: &Pose, speeds: &ChassisSpeeds) -> Pose {
        self.predict_with(pose, speeds, self.lookahead_seconds)
    }

    /// Returns the pose reached after `lookahead_seconds`.
    ///
    /// ## Parameters
    ///
    /// * 'pose' - The current pose
    /// * 'speeds' - The current robot relative velocity
    /// * 'lookahead_seconds' - The time to look ahead
    pub fn predict_with(&self, pose: &Pose, speeds: &ChassisSpeeds, lookahead_seconds: f64) -> Pose {
        pose.exp(&speeds.to_twist(lookahead_seconds))
    }
}

impl Default for PosePredictor {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD_SECONDS)
    }
}
