/// Provides the time indexed history used by the fixed-lag pose estimator
pub mod interpolation_buffer;

/// Provides the parametrized pose estimator
pub mod pose_estimator;

/// Provides the engine that replays odometry samples through the three pose estimators
pub mod pose_fusion;

/// Provides the extrapolation of the fused pose
pub mod prediction;

/// Provides wheel and heading based odometry
pub mod swerve_odometry;

/// Provides the vision measurement types and the correction policy
pub mod vision;
