//! A fixed-lag pose estimator that fuses wheel odometry with delayed vision measurements.
//!
//! The estimator integrates the wheel odometry and keeps a short history of the odometry state.
//! When a vision measurement arrives it is compared against the estimate at the capture time of
//! the measurement, interpolated from the history. The estimate at that time is corrected
//! towards the measurement and the odometry recorded after that time is replayed on top of the
//! corrected estimate. This allows measurements that arrive with a delay to be folded in at
//! the time they were captured.
//!
//! The same estimator type is used for three roles, see [EstimatorRole].

use log::debug;

use crate::geometry::{angle::interpolate_angle, pose::Pose};
use crate::kinematics::{module_state::ModulePosition, swerve_kinematics::SwerveKinematics};
use crate::MODULE_COUNT;

use super::interpolation_buffer::InterpolationBuffer;
use super::swerve_odometry::SwerveOdometry;
use super::vision::{VisionMeasurement, VisionPolicy};

#[cfg(test)]
#[path = "pose_estimator_tests.rs"]
mod pose_estimator_tests;

/// Selects which data a [PoseEstimator] uses.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EstimatorRole {
    /// Uses both the wheel odometry and the vision measurements.
    Combined,

    /// Uses only the wheel odometry.
    WheelOnly,

    /// Uses only the vision measurements.
    VisionOnly,
}

impl EstimatorRole {
    /// Returns a value indicating whether the role uses wheel odometry.
    pub fn accepts_odometry(&self) -> bool {
        matches!(self, EstimatorRole::Combined | EstimatorRole::WheelOnly)
    }

    /// Returns a value indicating whether the role uses vision measurements.
    pub fn accepts_vision(&self) -> bool {
        matches!(self, EstimatorRole::Combined | EstimatorRole::VisionOnly)
    }

    /// Returns the name of the role.
    pub fn name(&self) -> &'static str {
        match self {
            EstimatorRole::Combined => "combined",
            EstimatorRole::WheelOnly => "wheel-only",
            EstimatorRole::VisionOnly => "vision-only",
        }
    }
}

/// The reason a vision measurement was not applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VisionRejection {
    /// The estimator does not use vision measurements.
    NotAccepted,

    /// The measurement contains values that are not finite.
    Invalid,

    /// The estimator has no odometry history to compare the measurement with.
    NoHistory,

    /// The measurement is older than the history.
    Stale {
        /// The capture time of the measurement.
        timestamp: f64,

        /// The oldest capture time that would have been accepted.
        oldest_allowed: f64,
    },
}

/// The result of offering a vision measurement to a [PoseEstimator].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VisionOutcome {
    /// The measurement corrected the estimate.
    Applied,

    /// The measurement was discarded.
    Rejected(VisionRejection),
}

/// The odometry state at a point in time.
#[derive(Clone, Copy, Debug)]
struct OdometryRecord {
    pose: Pose,
    raw_heading: f64,
    positions: [ModulePosition; MODULE_COUNT],
}

impl OdometryRecord {
    /// Interpolates between two records by interpolating the module positions and the heading,
    /// and integrating the motion from the start record.
    fn interpolate(&self, end: &OdometryRecord, t: f64, kinematics: &SwerveKinematics) -> Self {
        if t <= 0.0 {
            return *self;
        }

        if t >= 1.0 {
            return *end;
        }

        let mut positions = [ModulePosition::default(); MODULE_COUNT];
        let mut deltas = [ModulePosition::default(); MODULE_COUNT];
        for (index, (start, stop)) in self.positions.iter().zip(end.positions.iter()).enumerate()
        {
            positions[index] = start.interpolate(stop, t);
            deltas[index] = positions[index].delta_since(start);
        }

        let raw_heading = interpolate_angle(self.raw_heading, end.raw_heading, t);
        let heading_change = interpolate_angle(0.0, end.pose.heading() - self.pose.heading(), t);

        let mut twist = kinematics.module_deltas_to_twist(&deltas);
        twist.dtheta = heading_change;

        Self {
            pose: self.pose.exp(&twist),
            raw_heading,
            positions,
        }
    }
}

/// Estimates the pose of the vehicle from wheel odometry, vision measurements, or both,
/// depending on its [EstimatorRole].
#[derive(Clone, Debug)]
pub struct PoseEstimator {
    role: EstimatorRole,
    odometry: SwerveOdometry,
    policy: VisionPolicy,

    /// The odometry state over the last [VisionPolicy::history_seconds].
    history: InterpolationBuffer<OdometryRecord>,

    /// The capture time of the newest applied vision measurement. Only used by estimators that
    /// do not use odometry.
    newest_vision_timestamp: Option<f64>,
}

impl PoseEstimator {
    /// Offers a vision measurement to the estimator.
    ///
    /// Measurements are never applied in full, the correction is weighted by the gain from the
    /// [VisionPolicy]. Measurements that are invalid or older than the history are discarded.
    ///
    /// ## Parameters
    ///
    /// * 'measurement' - The vision measurement.
    pub fn add_vision_measurement(&mut self, measurement: &VisionMeasurement) -> VisionOutcome {
        let outcome = if !self.role.accepts_vision() {
            VisionOutcome::Rejected(VisionRejection::NotAccepted)
        } else if !measurement.is_valid() {
            VisionOutcome::Rejected(VisionRejection::Invalid)
        } else if self.role.accepts_odometry() {
            self.apply_with_replay(measurement)
        } else {
            self.apply_directly(measurement)
        };

        if let VisionOutcome::Rejected(reason) = outcome {
            if reason != VisionRejection::NotAccepted {
                debug!(
                    "The {} estimator rejected the vision measurement at {:.4}s: {:?}",
                    self.role.name(),
                    measurement.timestamp,
                    reason
                );
            }
        }

        outcome
    }

    fn apply_directly(&mut self, measurement: &VisionMeasurement) -> VisionOutcome {
        if let Some(newest) = self.newest_vision_timestamp {
            let oldest_allowed = newest - self.policy.history_seconds;
            if measurement.timestamp < oldest_allowed {
                return VisionOutcome::Rejected(VisionRejection::Stale {
                    timestamp: measurement.timestamp,
                    oldest_allowed,
                });
            }
        }

        let current = self.odometry.pose();
        let corrected = self.corrected_pose(&current, measurement);
        self.odometry.reset_pose(corrected);

        self.newest_vision_timestamp = Some(
            self.newest_vision_timestamp
                .map_or(measurement.timestamp, |newest| {
                    newest.max(measurement.timestamp)
                }),
        );
        VisionOutcome::Applied
    }

    fn apply_with_replay(&mut self, measurement: &VisionMeasurement) -> VisionOutcome {
        let newest = match self.history.newest_timestamp() {
            Some(newest) => newest,
            None => return VisionOutcome::Rejected(VisionRejection::NoHistory),
        };

        let oldest_allowed = newest - self.policy.history_seconds;
        if measurement.timestamp < oldest_allowed {
            return VisionOutcome::Rejected(VisionRejection::Stale {
                timestamp: measurement.timestamp,
                oldest_allowed,
            });
        }

        let kinematics = self.odometry.kinematics().clone();
        let sample = match self
            .history
            .sample_with(measurement.timestamp, |start, end, t| {
                start.interpolate(end, t, &kinematics)
            }) {
            Some(sample) => sample,
            None => return VisionOutcome::Rejected(VisionRejection::NoHistory),
        };

        let corrected = self.corrected_pose(&sample.pose, measurement);
        let anchor_time = measurement.timestamp.min(newest);
        let later_records = self.history.entries_after(anchor_time);

        self.odometry
            .reset(sample.raw_heading, &sample.positions, corrected);
        self.history.add_sample(
            anchor_time,
            OdometryRecord {
                pose: corrected,
                ..sample
            },
        );

        for (timestamp, record) in later_records {
            self.record_odometry(timestamp, record.raw_heading, &record.positions);
        }

        VisionOutcome::Applied
    }

    fn corrected_pose(&self, estimate: &Pose, measurement: &VisionMeasurement) -> Pose {
        let gains = self.policy.gains(&measurement.confidence);
        let twist = estimate.log(&measurement.pose);
        estimate.exp(&twist.scaled_per_axis(gains))
    }

    /// Creates a new [PoseEstimator] instance.
    ///
    /// ## Parameters
    ///
    /// * 'role' - The data the estimator uses
    /// * 'kinematics' - The kinematics of the vehicle
    /// * 'raw_heading' - The current raw heading in radians
    /// * 'positions' - The current module positions
    /// * 'pose' - The initial pose
    /// * 'policy' - The vision correction policy
    pub fn new(
        role: EstimatorRole,
        kinematics: SwerveKinematics,
        raw_heading: f64,
        positions: &[ModulePosition; MODULE_COUNT],
        pose: Pose,
        policy: VisionPolicy,
    ) -> Self {
        let history = InterpolationBuffer::new(policy.history_seconds);
        Self {
            role,
            odometry: SwerveOdometry::new(kinematics, raw_heading, positions, pose),
            policy,
            history,
            newest_vision_timestamp: None,
        }
    }

    /// Returns the current pose estimate.
    pub fn pose(&self) -> Pose {
        self.odometry.pose()
    }

    fn record_odometry(
        &mut self,
        timestamp: f64,
        raw_heading: f64,
        positions: &[ModulePosition; MODULE_COUNT],
    ) -> Pose {
        let pose = self.odometry.update(raw_heading, positions);
        self.history.add_sample(
            timestamp,
            OdometryRecord {
                pose,
                raw_heading,
                positions: *positions,
            },
        );
        pose
    }

    /// Resets the estimate to `pose`, using the given heading and module positions as the new
    /// reference. The history is discarded.
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
        self.odometry.reset(raw_heading, positions, pose);
        self.history.clear();
        self.newest_vision_timestamp = None;
    }

    /// Returns the role of the estimator.
    pub fn role(&self) -> EstimatorRole {
        self.role
    }

    /// Updates the estimate with an odometry sample and returns the new estimate.
    ///
    /// Estimators that do not use odometry ignore the sample.
    ///
    /// ## Parameters
    ///
    /// * 'timestamp' - The capture time of the sample in seconds
    /// * 'raw_heading' - The raw heading at the capture time in radians
    /// * 'positions' - The module positions at the capture time
    pub fn update_with_time(
        &mut self,
        timestamp: f64,
        raw_heading: f64,
        positions: &[ModulePosition; MODULE_COUNT],
    ) -> Pose {
        if !self.role.accepts_odometry() {
            return self.pose();
        }

        self.record_odometry(timestamp, raw_heading, positions)
    }
}
