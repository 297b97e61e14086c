//! Kinematics of a vehicle with four independently steered and driven wheels.
//!
//! Each module `i` sits at the offset `(x_i, y_i)` from the center of the chassis. For a rigid
//! chassis moving with the velocity `(vx, vy, omega)` the velocity of module `i` is
//!
//! ```text
//! | v_ix |   | 1  0  -y_i |   | vx    |
//! | v_iy | = | 0  1   x_i | * | vy    |
//!                             | omega |
//! ```
//!
//! Stacking the four modules gives an 8x3 matrix that converts chassis motion to module motion.
//! The opposite conversion is over determined and is solved in the least squares sense with the
//! pseudo inverse of that matrix.

extern crate nalgebra as na;

use na::{Matrix3, SMatrix, SVector, Vector2, Vector3};

use super::chassis_speeds::ChassisSpeeds;
use super::module_state::{ModulePosition, ModuleState};
use crate::geometry::twist::Twist;
use crate::{Error, MODULE_COUNT};

#[cfg(test)]
#[path = "swerve_kinematics_tests.rs"]
mod swerve_kinematics_tests;

/// Geometries for which the normal matrix has a determinant below this value are rejected.
const SINGULAR_GEOMETRY_THRESHOLD: f64 = 1e-9;

type InverseMatrix = SMatrix<f64, 8, 3>;
type ForwardMatrix = SMatrix<f64, 3, 8>;
type ModuleVector = SVector<f64, 8>;

/// Converts between the motion of the chassis and the motion of the individual modules.
///
/// The geometry is fixed when the instance is created. Module order is front left, front right,
/// back left, back right, but any order works as long as it is used consistently.
#[derive(Clone, Debug)]
pub struct SwerveKinematics {
    /// The offsets of the modules from the center of the chassis, in meters.
    module_offsets: [Vector2<f64>; MODULE_COUNT],

    /// The matrix converting chassis velocities to module velocities.
    inverse: InverseMatrix,

    /// The least squares matrix converting module velocities to chassis velocities.
    forward: ForwardMatrix,
}

impl SwerveKinematics {
    /// Returns the module states that produce the given chassis speeds.
    ///
    /// The result is exact. A module with a speed of zero reports an angle of zero, callers
    /// that want to keep the previous steering angle need to handle that case.
    ///
    /// ## Parameters
    ///
    /// * 'speeds' - The robot relative chassis speeds.
    pub fn chassis_to_module_states(&self, speeds: &ChassisSpeeds) -> [ModuleState; MODULE_COUNT] {
        let module_velocities = self.inverse * Vector3::new(speeds.vx, speeds.vy, speeds.omega);

        let mut states = [ModuleState::default(); MODULE_COUNT];
        for (index, state) in states.iter_mut().enumerate() {
            let vx = module_velocities[2 * index];
            let vy = module_velocities[2 * index + 1];
            *state = ModuleState::new(vx.hypot(vy), vy.atan2(vx));
        }

        states
    }

    /// Scales all module speeds uniformly so that none of them exceeds `max_speed`.
    ///
    /// Scaling all modules by the same factor keeps the direction of motion of the chassis and
    /// the ratio between translation and rotation. Angles are not changed. Nothing happens if
    /// all speeds are within the limit.
    ///
    /// ## Parameters
    ///
    /// * 'states' - The module states that should be desaturated.
    /// * 'max_speed' - The maximum wheel speed in meters per second.
    pub fn desaturate(states: &mut [ModuleState; MODULE_COUNT], max_speed: f64) {
        let highest = states
            .iter()
            .map(|state| state.speed().abs())
            .fold(0.0_f64, f64::max);

        if highest <= max_speed || highest == 0.0 {
            return;
        }

        let factor = max_speed / highest;
        for state in states.iter_mut() {
            *state = state.with_speed(state.speed() * factor);
        }
    }

    /// Returns the distance from the center of the chassis to the furthest module.
    pub fn drive_base_radius(&self) -> f64 {
        self.module_offsets
            .iter()
            .map(|offset| offset.norm())
            .fold(0.0_f64, f64::max)
    }

    /// Returns the twist of the chassis that explains the given module displacements.
    ///
    /// ## Parameters
    ///
    /// * 'deltas' - The distance driven by each module since the previous sample, together with
    ///   the current steering angle of the module.
    pub fn module_deltas_to_twist(&self, deltas: &[ModulePosition; MODULE_COUNT]) -> Twist {
        let displacements = Self::stack(deltas.iter().map(|delta| delta.displacement_vector()));
        let chassis = self.forward * displacements;
        Twist::new(chassis[0], chassis[1], chassis[2])
    }

    /// Returns the angle of each module offset as seen from the center of the chassis.
    ///
    /// Pointing every module at this angle makes the wheels form an X which resists being
    /// pushed.
    pub fn module_offset_angles(&self) -> [f64; MODULE_COUNT] {
        let mut angles = [0.0; MODULE_COUNT];
        for (angle, offset) in angles.iter_mut().zip(self.module_offsets.iter()) {
            *angle = offset.y.atan2(offset.x);
        }

        angles
    }

    /// Returns the offsets of the modules from the center of the chassis.
    pub fn module_offsets(&self) -> &[Vector2<f64>; MODULE_COUNT] {
        &self.module_offsets
    }

    /// Returns the chassis speeds that best explain the given module states.
    ///
    /// ## Parameters
    ///
    /// * 'states' - The measured or commanded module states.
    pub fn module_states_to_chassis_speeds(
        &self,
        states: &[ModuleState; MODULE_COUNT],
    ) -> ChassisSpeeds {
        let velocities = Self::stack(states.iter().map(|state| state.velocity_vector()));
        let chassis = self.forward * velocities;
        ChassisSpeeds::new(chassis[0], chassis[1], chassis[2])
    }

    /// Creates a new [SwerveKinematics] instance.
    ///
    /// ## Parameters
    ///
    /// * 'module_offsets' - The offsets of the modules from the center of the chassis, in meters.
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidGeometry] - Returned when an offset is not finite or when the offsets
    ///   cannot distinguish rotation from translation, e.g. when all modules sit on the same spot.
    pub fn new(module_offsets: [Vector2<f64>; MODULE_COUNT]) -> Result<Self, Error> {
        if module_offsets
            .iter()
            .any(|offset| !offset.x.is_finite() || !offset.y.is_finite())
        {
            return Err(Error::InvalidGeometry {
                reason: "module offsets must be finite".to_string(),
            });
        }

        let inverse = InverseMatrix::from_fn(|row, column| {
            let offset = &module_offsets[row / 2];
            match (row % 2, column) {
                (0, 0) => 1.0,
                (0, 2) => -offset.y,
                (1, 1) => 1.0,
                (1, 2) => offset.x,
                _ => 0.0,
            }
        });

        let normal: Matrix3<f64> = inverse.transpose() * inverse;
        if normal.determinant().abs() < SINGULAR_GEOMETRY_THRESHOLD {
            return Err(Error::InvalidGeometry {
                reason: "module offsets must not all coincide".to_string(),
            });
        }

        let normal_inverse = normal.try_inverse().ok_or_else(|| Error::InvalidGeometry {
            reason: "module geometry is singular".to_string(),
        })?;

        Ok(Self {
            module_offsets,
            inverse,
            forward: normal_inverse * inverse.transpose(),
        })
    }

    fn stack(vectors: impl Iterator<Item = Vector2<f64>>) -> ModuleVector {
        let mut stacked = ModuleVector::zeros();
        for (index, vector) in vectors.enumerate().take(MODULE_COUNT) {
            stacked[2 * index] = vector.x;
            stacked[2 * index + 1] = vector.y;
        }

        stacked
    }
}
