//! External absolute pose measurements and the policy that decides how strongly they correct the
//! estimated pose.
//!
//! Measurements may be produced on any thread. They are handed to the drivetrain through a
//! bounded channel, see [vision_channel], and are folded into the pose estimate during the next
//! control cycle.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::geometry::pose::Pose;

#[cfg(test)]
#[path = "vision_tests.rs"]
mod vision_tests;

/// The confidence in a vision measurement, expressed as the standard deviations of the measured
/// x, y and heading.
///
/// Smaller standard deviations mean a higher confidence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisionConfidence {
    std_devs: [f64; 3],
}

impl VisionConfidence {
    /// Returns a value indicating whether all standard deviations are finite and not negative.
    pub fn is_valid(&self) -> bool {
        self.std_devs
            .iter()
            .all(|value| value.is_finite() && *value >= 0.0)
    }

    /// Creates a new [VisionConfidence] instance.
    ///
    /// ## Parameters
    ///
    /// * 'x' - The standard deviation of the x coordinate in meters
    /// * 'y' - The standard deviation of the y coordinate in meters
    /// * 'heading' - The standard deviation of the heading in radians
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            std_devs: [x, y, heading],
        }
    }

    /// Returns the standard deviations of x, y and heading.
    pub fn std_devs(&self) -> [f64; 3] {
        self.std_devs
    }

    /// Creates a [VisionConfidence] with the same standard deviation for all axes.
    pub fn uniform(std_dev: f64) -> Self {
        Self::new(std_dev, std_dev, std_dev)
    }
}

/// A pose measured by an external source, such as a camera that detects field markers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisionMeasurement {
    /// The measured pose of the vehicle in the field frame.
    pub pose: Pose,

    /// The time, in seconds, at which the pose was captured. Must use the same clock as the
    /// odometry samples.
    pub timestamp: f64,

    /// The confidence in the measurement.
    pub confidence: VisionConfidence,
}

impl VisionMeasurement {
    /// Returns a value indicating whether the pose, timestamp and confidence are all finite.
    pub fn is_valid(&self) -> bool {
        self.timestamp.is_finite()
            && self.pose.x().is_finite()
            && self.pose.y().is_finite()
            && self.pose.heading().is_finite()
            && self.confidence.is_valid()
    }

    /// Creates a new [VisionMeasurement] instance.
    pub fn new(pose: Pose, timestamp: f64, confidence: VisionConfidence) -> Self {
        Self {
            pose,
            timestamp,
            confidence,
        }
    }
}

/// The policy that maps the confidence of a vision measurement to a correction gain.
///
/// For each axis the gain is `q / (q + sqrt(q * r))` where `q` is the variance of the state
/// estimate and `r` is the variance of the measurement. The gain grows as the measurement
/// becomes more certain and is capped at `max_gain`, so that a measurement never fully replaces
/// the estimate.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct VisionPolicy {
    /// The length, in seconds, of the odometry history kept for late measurements.
    pub history_seconds: f64,

    /// The standard deviations of the x, y and heading of the state estimate.
    pub state_std_devs: [f64; 3],

    /// The largest correction gain, in the range (0, 1).
    pub max_gain: f64,

    /// The number of measurements that may wait for the next control cycle.
    pub queue_capacity: usize,
}

impl Default for VisionPolicy {
    fn default() -> Self {
        Self {
            history_seconds: 1.5,
            state_std_devs: [0.1, 0.1, 0.1],
            max_gain: 0.95,
            queue_capacity: 32,
        }
    }
}

impl VisionPolicy {
    /// Returns the correction gain for x, y and heading.
    ///
    /// ## Parameters
    ///
    /// * 'confidence' - The confidence of the measurement.
    ///
    /// ## Example
    ///
    /// ```
    /// use swerve_drive_odometry::estimation::vision::{VisionConfidence, VisionPolicy};
    ///
    /// let policy = VisionPolicy::default();
    /// let confident = policy.gains(&VisionConfidence::uniform(0.1));
    /// let unsure = policy.gains(&VisionConfidence::uniform(1.0));
    ///
    /// assert!((confident[0] - 0.5).abs() < 1e-12);
    /// assert!(unsure[0] < confident[0]);
    /// ```
    pub fn gains(&self, confidence: &VisionConfidence) -> [f64; 3] {
        let mut gains = [0.0; 3];
        for ((gain, state_std), vision_std) in gains
            .iter_mut()
            .zip(self.state_std_devs.iter())
            .zip(confidence.std_devs().iter())
        {
            let q = state_std * state_std;
            let r = vision_std * vision_std;
            *gain = if q <= 0.0 {
                0.0
            } else {
                (q / (q + (q * r).sqrt())).min(self.max_gain)
            };
        }

        gains
    }
}

/// Submits vision measurements to the drivetrain from any thread.
#[derive(Clone, Debug)]
pub struct VisionSender {
    sender: Sender<VisionMeasurement>,
}

impl VisionSender {
    /// Queues a measurement for the next control cycle.
    ///
    /// Returns `false` if the measurement was dropped because the queue is full or the
    /// drivetrain no longer exists.
    pub fn submit(&self, measurement: VisionMeasurement) -> bool {
        match self.sender.try_send(measurement) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                debug!(
                    "Vision queue is full, dropping the measurement at {:.4}s",
                    dropped.timestamp
                );
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Creates the bounded channel used to hand vision measurements to the drivetrain.
///
/// ## Parameters
///
/// * 'capacity' - The number of measurements that may wait in the channel.
pub fn vision_channel(capacity: usize) -> (VisionSender, Receiver<VisionMeasurement>) {
    let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
    (VisionSender { sender }, receiver)
}
