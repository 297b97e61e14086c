/// Helpers for angles in the periodic number space (-PI, PI].
pub mod angle;

/// Defines the [Pose](pose::Pose) of the vehicle in the plane.
pub mod pose;

/// Defines the [Twist](twist::Twist), an incremental or instantaneous rigid body motion.
pub mod twist;
