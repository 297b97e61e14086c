//! Helpers for working with angles.
//!
//! Angles live in a periodic number space: an angle of 3 PI describes the same direction as an
//! angle of PI. On the contrary to a linear number space there are always two ways to get from
//! one angle to another, one turning counter-clockwise and one turning clockwise. The functions
//! in this module pick the representative in the range (-PI, PI] and the shortest of the two
//! distances between angles.
//!
//! All angles handled by this crate are in radians.

use std::f64::consts::PI;

#[cfg(test)]
#[path = "angle_tests.rs"]
mod angle_tests;

/// The size of the periodic angle space.
const FULL_TURN: f64 = 2.0 * PI;

/// Returns the angle in the range (-PI, PI] that points in the same direction as `value`.
///
/// ## Parameters
///
/// * `value` - The angle in radians that should be normalized.
///
/// ## Example
///
/// ```
/// use core::f64::consts::PI;
/// use swerve_drive_odometry::geometry::angle::normalize_angle;
///
/// assert_eq!(PI, normalize_angle(-PI));
/// assert_eq!(0.5 * PI, normalize_angle(0.5 * PI));
/// assert!((normalize_angle(1.75 * PI) + 0.25 * PI).abs() < 1e-12);
/// ```
pub fn normalize_angle(value: f64) -> f64 {
    // reduce the angle to be (-2 PI, 2 PI)
    let normalized = value % FULL_TURN;

    if normalized > PI {
        normalized - FULL_TURN
    } else if normalized <= -PI {
        normalized + FULL_TURN
    } else {
        normalized
    }
}

/// Returns the smallest signed rotation that turns `start` into `end`.
///
/// The result is in the range (-PI, PI]. A positive value is a counter-clockwise rotation.
///
/// ## Parameters
///
/// * `start` - The starting angle in radians.
/// * `end` - The ending angle in radians.
///
/// ## Example
///
/// ```
/// use core::f64::consts::PI;
/// use swerve_drive_odometry::geometry::angle::shortest_rotation_between;
///
/// let rotation = shortest_rotation_between(0.0, 1.5 * PI);
/// assert!((rotation + 0.5 * PI).abs() < 1e-12);
/// ```
pub fn shortest_rotation_between(start: f64, end: f64) -> f64 {
    normalize_angle(end - start)
}

/// Interpolates between two angles along the shortest rotation.
///
/// ## Parameters
///
/// * `start` - The angle returned for `t = 0`.
/// * `end` - The angle returned for `t = 1`.
/// * `t` - The interpolation fraction, clamped to [0, 1].
pub fn interpolate_angle(start: f64, end: f64, t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    normalize_angle(start + shortest_rotation_between(start, end) * t)
}
