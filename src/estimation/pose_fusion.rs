//! Fuses the drained odometry samples and the vision measurements into three pose estimates.
//!
//! Samples are processed one at a time in timestamp order. For each sample the module deltas are
//! computed against the previous sample and the tracked heading is advanced, either from the
//! gyro heading of the sample or, when the gyro is not connected, by integrating the rotation
//! derived from the module deltas. The sample is then fed to the combined and the wheel-only
//! estimators. Vision measurements wait until a sample at or after their capture time has been
//! processed, and are then offered to the combined and the vision-only estimators.

use std::collections::VecDeque;

use log::{debug, warn};

use crate::geometry::{angle::normalize_angle, pose::Pose};
use crate::kinematics::{module_state::ModulePosition, swerve_kinematics::SwerveKinematics};
use crate::MODULE_COUNT;

use super::pose_estimator::{EstimatorRole, PoseEstimator, VisionOutcome};
use super::vision::{VisionMeasurement, VisionPolicy};

#[cfg(test)]
#[path = "pose_fusion_tests.rs"]
mod pose_fusion_tests;

/// The module positions captured at a single point in time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OdometrySample {
    /// The capture time in seconds.
    pub timestamp: f64,

    /// The cumulative module positions, in module order.
    pub positions: [ModulePosition; MODULE_COUNT],

    /// The gyro heading in radians, or `None` if the gyro is not connected.
    pub heading: Option<f64>,
}

/// The pose estimates of the three estimators.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FusedPoses {
    /// The estimate from the wheel odometry corrected by vision.
    pub combined: Pose,

    /// The estimate from the wheel odometry only.
    pub wheel_only: Pose,

    /// The estimate from vision only.
    pub vision_only: Pose,
}

/// Counters describing the work done by the [PoseFusion].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FusionStatistics {
    /// The number of odometry samples that were processed.
    pub samples_processed: u64,

    /// The number of odometry samples that were skipped because they were out of order.
    pub samples_skipped: u64,

    /// The number of vision measurements applied to at least one estimator.
    pub vision_applied: u64,

    /// The number of vision measurements that were discarded.
    pub vision_rejected: u64,
}

/// Replays odometry samples through the combined, wheel-only and vision-only estimators.
pub struct PoseFusion {
    kinematics: SwerveKinematics,
    combined: PoseEstimator,
    wheel_only: PoseEstimator,
    vision_only: PoseEstimator,

    /// The heading fed to the estimators.
    tracked_heading: f64,
    last_positions: [ModulePosition; MODULE_COUNT],
    last_timestamp: Option<f64>,

    /// Vision measurements waiting for odometry that covers their capture time.
    pending_vision: VecDeque<VisionMeasurement>,
    pending_capacity: usize,

    statistics: FusionStatistics,
}

impl PoseFusion {
    /// Queues a vision measurement. It is applied once a sample at or after its capture time
    /// has been processed, see [PoseFusion::apply_pending_vision].
    ///
    /// If the queue is full the oldest waiting measurement is discarded.
    pub fn add_vision_measurement(&mut self, measurement: VisionMeasurement) {
        if self.pending_vision.len() >= self.pending_capacity {
            if let Some(dropped) = self.pending_vision.pop_front() {
                debug!(
                    "Too many pending vision measurements, dropping the one at {:.4}s",
                    dropped.timestamp
                );
                self.statistics.vision_rejected += 1;
            }
        }

        self.pending_vision.push_back(measurement);
    }

    /// Applies the waiting vision measurements captured at or before `now`, oldest first, and
    /// returns the number that were applied.
    ///
    /// ## Parameters
    ///
    /// * 'now' - The time up to which measurements should be applied.
    pub fn apply_pending_vision(&mut self, now: f64) -> usize {
        if self.pending_vision.is_empty() {
            return 0;
        }

        let mut ready: Vec<VisionMeasurement> = Vec::new();
        self.pending_vision.retain(|measurement| {
            if measurement.timestamp <= now || !measurement.timestamp.is_finite() {
                ready.push(*measurement);
                false
            } else {
                true
            }
        });
        ready.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        let mut applied = 0;
        for measurement in ready.iter() {
            let combined = self.combined.add_vision_measurement(measurement);
            let vision_only = self.vision_only.add_vision_measurement(measurement);

            if combined == VisionOutcome::Applied || vision_only == VisionOutcome::Applied {
                applied += 1;
                self.statistics.vision_applied += 1;
            } else {
                self.statistics.vision_rejected += 1;
            }
        }

        applied
    }

    /// Returns the timestamp of the last processed sample.
    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    /// Returns the module positions of the last processed sample.
    pub fn last_positions(&self) -> &[ModulePosition; MODULE_COUNT] {
        &self.last_positions
    }

    /// Creates a new [PoseFusion] instance.
    ///
    /// ## Parameters
    ///
    /// * 'kinematics' - The kinematics of the vehicle
    /// * 'heading' - The initial tracked heading in radians
    /// * 'positions' - The current module positions
    /// * 'pose' - The initial pose of all estimators
    /// * 'policy' - The vision correction policy
    pub fn new(
        kinematics: SwerveKinematics,
        heading: f64,
        positions: &[ModulePosition; MODULE_COUNT],
        pose: Pose,
        policy: VisionPolicy,
    ) -> Self {
        let estimator = |role| {
            PoseEstimator::new(
                role,
                kinematics.clone(),
                heading,
                positions,
                pose,
                policy.clone(),
            )
        };

        Self {
            combined: estimator(EstimatorRole::Combined),
            wheel_only: estimator(EstimatorRole::WheelOnly),
            vision_only: estimator(EstimatorRole::VisionOnly),
            kinematics,
            tracked_heading: normalize_angle(heading),
            last_positions: *positions,
            last_timestamp: None,
            pending_vision: VecDeque::new(),
            pending_capacity: policy.queue_capacity.max(1),
            statistics: FusionStatistics::default(),
        }
    }

    /// Returns the number of vision measurements waiting to be applied.
    pub fn pending_vision_count(&self) -> usize {
        self.pending_vision.len()
    }

    /// Returns the combined pose estimate.
    pub fn pose(&self) -> Pose {
        self.combined.pose()
    }

    /// Returns the estimates of all three estimators.
    pub fn poses(&self) -> FusedPoses {
        FusedPoses {
            combined: self.combined.pose(),
            wheel_only: self.wheel_only.pose(),
            vision_only: self.vision_only.pose(),
        }
    }

    /// Processes a single sample. Returns `false` if the sample was skipped because it is not
    /// newer than the previous sample.
    ///
    /// ## Parameters
    ///
    /// * 'sample' - The odometry sample.
    pub fn process_sample(&mut self, sample: &OdometrySample) -> bool {
        if let Some(last) = self.last_timestamp {
            if !(sample.timestamp > last) {
                warn!(
                    "Skipping odometry sample at {:.4}s, it is not newer than {:.4}s",
                    sample.timestamp, last
                );
                self.statistics.samples_skipped += 1;
                return false;
            }
        }

        let mut deltas = [ModulePosition::default(); MODULE_COUNT];
        for ((delta, current), previous) in deltas
            .iter_mut()
            .zip(sample.positions.iter())
            .zip(self.last_positions.iter())
        {
            *delta = current.delta_since(previous);
        }
        self.last_positions = sample.positions;

        self.tracked_heading = match sample.heading {
            Some(heading) => normalize_angle(heading),
            None => {
                let twist = self.kinematics.module_deltas_to_twist(&deltas);
                normalize_angle(self.tracked_heading + twist.dtheta)
            }
        };

        self.wheel_only
            .update_with_time(sample.timestamp, self.tracked_heading, &sample.positions);
        self.combined
            .update_with_time(sample.timestamp, self.tracked_heading, &sample.positions);

        self.last_timestamp = Some(sample.timestamp);
        self.statistics.samples_processed += 1;

        self.apply_pending_vision(sample.timestamp);
        true
    }

    /// Processes the samples in order and returns the number that were processed.
    pub fn process_samples(&mut self, samples: &[OdometrySample]) -> usize {
        samples
            .iter()
            .filter(|sample| self.process_sample(sample))
            .count()
    }

    /// Resets all three estimators to `pose`.
    ///
    /// The current module positions and the tracked heading become the new reference. Waiting
    /// vision measurements captured before the reset are discarded.
    pub fn set_pose(&mut self, pose: Pose) {
        let heading = self.tracked_heading;
        let positions = self.last_positions;
        for estimator in self.estimators_mut() {
            estimator.reset(heading, &positions, pose);
        }

        if let Some(last) = self.last_timestamp {
            self.pending_vision
                .retain(|measurement| measurement.timestamp > last);
        }

        debug!(
            "Reset the pose to ({:.3}, {:.3}, {:.3})",
            pose.x(),
            pose.y(),
            pose.heading()
        );
    }

    /// Returns the counters accumulated since the previous call and resets them.
    pub fn take_statistics(&mut self) -> FusionStatistics {
        std::mem::take(&mut self.statistics)
    }

    /// Returns the heading fed to the estimators, in radians.
    pub fn tracked_heading(&self) -> f64 {
        self.tracked_heading
    }

    /// Sets the tracked heading to zero and turns the combined and wheel-only estimates to a
    /// heading of zero, keeping their translations. The vision-only estimate is unchanged.
    ///
    /// The poses are turned to heading zero rather than keeping the offset between the pose
    /// heading and the gyro from the last [PoseFusion::set_pose], so after zeroing the pose
    /// heading always matches the zeroed gyro.
    ///
    /// The gyro must be zeroed at the same time, otherwise the next sample with a gyro heading
    /// moves the tracked heading back.
    pub fn zero_heading(&mut self) {
        self.tracked_heading = 0.0;
        let positions = self.last_positions;

        for estimator in [&mut self.combined, &mut self.wheel_only] {
            let pose = estimator.pose().with_heading(0.0);
            estimator.reset(0.0, &positions, pose);
        }

        let vision_pose = self.vision_only.pose();
        self.vision_only.reset(0.0, &positions, vision_pose);

        debug!("Zeroed the tracked heading");
    }

    fn estimators_mut(&mut self) -> [&mut PoseEstimator; 3] {
        [
            &mut self.combined,
            &mut self.wheel_only,
            &mut self.vision_only,
        ]
    }
}
