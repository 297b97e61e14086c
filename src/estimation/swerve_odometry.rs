//! Dead reckoning from the module positions and a heading.
//!
//! The translation is integrated from the module displacements through the kinematics. The
//! rotation is taken from the heading that is passed in, which is either the gyro yaw or a
//! heading integrated from the wheels. The heading passed in is a raw value, the odometry keeps
//! the offset between that raw value and the heading of the pose so that the pose can be reset
//! without touching the heading source.

use crate::geometry::{angle::shortest_rotation_between, pose::Pose};
use crate::kinematics::{module_state::ModulePosition, swerve_kinematics::SwerveKinematics};
use crate::MODULE_COUNT;

#[cfg(test)]
#[path = "swerve_odometry_tests.rs"]
mod swerve_odometry_tests;

/// Tracks the pose of the vehicle from the module positions and a heading.
#[derive(Clone, Debug)]
pub struct SwerveOdometry {
    kinematics: SwerveKinematics,
    pose: Pose,

    /// The difference between the heading of the pose and the raw heading.
    heading_offset: f64,

    /// The heading of the pose at the previous update.
    previous_heading: f64,
    previous_positions: [ModulePosition; MODULE_COUNT],
}

impl SwerveOdometry {
    /// Returns the kinematics used to convert module motion to chassis motion.
    pub fn kinematics(&self) -> &SwerveKinematics {
        &self.kinematics
    }

    /// Creates a new [SwerveOdometry] instance.
    ///
    /// ## Parameters
    ///
    /// * 'kinematics' - The kinematics of the vehicle
    /// * 'raw_heading' - The current raw heading in radians
    /// * 'positions' - The current module positions
    /// * 'pose' - The initial pose
    pub fn new(
        kinematics: SwerveKinematics,
        raw_heading: f64,
        positions: &[ModulePosition; MODULE_COUNT],
        pose: Pose,
    ) -> Self {
        Self {
            kinematics,
            pose,
            heading_offset: pose.heading() - raw_heading,
            previous_heading: pose.heading(),
            previous_positions: *positions,
        }
    }

    /// Returns the current pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Resets the pose, the heading reference and the module reference positions.
    ///
    /// ## Parameters
    ///
    /// * 'raw_heading' - The current raw heading in radians
    /// * 'positions' - The current module positions
    /// * 'pose' - The new pose
    pub fn reset(
        &mut self,
        raw_heading: f64,
        positions: &[ModulePosition; MODULE_COUNT],
        pose: Pose,
    ) {
        self.pose = pose;
        self.heading_offset = pose.heading() - raw_heading;
        self.previous_heading = pose.heading();
        self.previous_positions = *positions;
    }

    /// Resets the pose while keeping the module reference positions and the raw heading
    /// reference.
    pub fn reset_pose(&mut self, pose: Pose) {
        self.heading_offset += shortest_rotation_between(self.pose.heading(), pose.heading());
        self.pose = pose;
        self.previous_heading = pose.heading();
    }

    /// Updates the pose with new module positions and a new raw heading, and returns the new
    /// pose.
    ///
    /// ## Parameters
    ///
    /// * 'raw_heading' - The current raw heading in radians
    /// * 'positions' - The current module positions
    pub fn update(&mut self, raw_heading: f64, positions: &[ModulePosition; MODULE_COUNT]) -> Pose {
        let heading = raw_heading + self.heading_offset;

        let mut deltas = [ModulePosition::default(); MODULE_COUNT];
        for ((delta, current), previous) in deltas
            .iter_mut()
            .zip(positions.iter())
            .zip(self.previous_positions.iter())
        {
            *delta = current.delta_since(previous);
        }

        let mut twist = self.kinematics.module_deltas_to_twist(&deltas);
        twist.dtheta = shortest_rotation_between(self.previous_heading, heading);

        let moved = self.pose.exp(&twist);
        self.pose = moved.with_heading(heading);
        self.previous_heading = self.pose.heading();
        self.previous_positions = *positions;

        self.pose
    }
}
