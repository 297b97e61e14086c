use super::*;
use float_cmp::approx_eq;
use nalgebra::Vector2;
use std::f64::consts::PI;

fn kinematics() -> SwerveKinematics {
    SwerveKinematics::new([
        Vector2::new(0.3, 0.3),
        Vector2::new(0.3, -0.3),
        Vector2::new(-0.3, 0.3),
        Vector2::new(-0.3, -0.3),
    ])
    .unwrap()
}

#[test]
fn when_all_wheels_drive_forward_it_should_move_along_the_heading() {
    let start = [ModulePosition::new(0.0, 0.0); 4];
    let mut odometry = SwerveOdometry::new(kinematics(), 0.0, &start, Pose::identity());

    let pose = odometry.update(0.0, &[ModulePosition::new(1.0, 0.0); 4]);

    assert!(approx_eq!(f64, pose.x(), 1.0, epsilon = 1e-12));
    assert!(approx_eq!(f64, pose.y(), 0.0, epsilon = 1e-12));
    assert!(approx_eq!(f64, pose.heading(), 0.0, epsilon = 1e-12));
}

#[test]
fn when_nothing_moves_it_should_keep_the_pose() {
    let start = [ModulePosition::new(2.0, 0.3); 4];
    let initial = Pose::new(1.0, 2.0, 0.5);
    let mut odometry = SwerveOdometry::new(kinematics(), 0.1, &start, initial);

    let pose = odometry.update(0.1, &start);

    assert!(approx_eq!(f64, pose.x(), initial.x(), epsilon = 1e-12));
    assert!(approx_eq!(f64, pose.y(), initial.y(), epsilon = 1e-12));
    assert!(approx_eq!(f64, pose.heading(), initial.heading(), epsilon = 1e-12));
}

#[test]
fn when_the_raw_heading_differs_from_the_pose_it_should_apply_the_offset() {
    let start = [ModulePosition::new(0.0, 0.0); 4];
    let mut odometry =
        SwerveOdometry::new(kinematics(), 1.0, &start, Pose::new(0.0, 0.0, 0.5 * PI));

    // The raw heading does not change, so the vehicle keeps facing +y
    let pose = odometry.update(1.0, &[ModulePosition::new(2.0, 0.0); 4]);

    assert!(approx_eq!(f64, pose.x(), 0.0, epsilon = 1e-12));
    assert!(approx_eq!(f64, pose.y(), 2.0, epsilon = 1e-12));
    assert!(approx_eq!(f64, pose.heading(), 0.5 * PI, epsilon = 1e-12));
}

#[test]
fn when_the_heading_changes_it_should_use_the_heading_for_the_rotation() {
    let start = [ModulePosition::new(0.0, 0.0); 4];
    let mut odometry = SwerveOdometry::new(kinematics(), 0.0, &start, Pose::identity());

    let pose = odometry.update(0.25, &start);

    assert!(approx_eq!(f64, pose.heading(), 0.25, epsilon = 1e-12));
}

#[test]
fn when_resetting_the_pose_it_should_keep_the_heading_reference() {
    let start = [ModulePosition::new(0.0, 0.0); 4];
    let mut odometry = SwerveOdometry::new(kinematics(), 0.3, &start, Pose::identity());

    odometry.reset_pose(Pose::new(5.0, 5.0, 1.0));
    assert_eq!(odometry.pose(), Pose::new(5.0, 5.0, 1.0));

    let pose = odometry.update(0.4, &start);

    assert!(approx_eq!(f64, pose.x(), 5.0, epsilon = 1e-12));
    assert!(approx_eq!(f64, pose.heading(), 1.1, epsilon = 1e-12));
}

#[test]
fn when_resetting_it_should_use_the_new_module_reference() {
    let start = [ModulePosition::new(0.0, 0.0); 4];
    let mut odometry = SwerveOdometry::new(kinematics(), 0.0, &start, Pose::identity());

    let moved = [ModulePosition::new(3.0, 0.0); 4];
    odometry.reset(0.0, &moved, Pose::new(1.0, 1.0, 0.0));
    let pose = odometry.update(0.0, &moved);

    assert!(approx_eq!(f64, pose.x(), 1.0, epsilon = 1e-12));
    assert!(approx_eq!(f64, pose.y(), 1.0, epsilon = 1e-12));
}
