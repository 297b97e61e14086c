/// Defines [ChassisSpeeds](chassis_speeds::ChassisSpeeds), the vehicle level velocity.
pub mod chassis_speeds;

/// Defines the per-module [ModuleState](module_state::ModuleState) and
/// [ModulePosition](module_state::ModulePosition).
pub mod module_state;

/// Defines the [SwerveKinematics](swerve_kinematics::SwerveKinematics) which converts between
/// chassis motion and module motion.
pub mod swerve_kinematics;
