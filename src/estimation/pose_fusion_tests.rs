use super::*;
use crate::estimation::vision::VisionConfidence;
use crate::kinematics::chassis_speeds::ChassisSpeeds;
use float_cmp::approx_eq;
use nalgebra::Vector2;

fn kinematics() -> SwerveKinematics {
    SwerveKinematics::new([
        Vector2::new(0.3556, 0.3556),
        Vector2::new(0.3556, -0.3556),
        Vector2::new(-0.3556, 0.3556),
        Vector2::new(-0.3556, -0.3556),
    ])
    .unwrap()
}

fn fusion() -> PoseFusion {
    PoseFusion::new(
        kinematics(),
        0.0,
        &[ModulePosition::default(); 4],
        Pose::identity(),
        VisionPolicy::default(),
    )
}

fn straight_sample(timestamp: f64, distance: f64, heading: Option<f64>) -> OdometrySample {
    OdometrySample {
        timestamp,
        positions: [ModulePosition::new(distance, 0.0); 4],
        heading,
    }
}

/// Returns module positions that, starting from zero, rotate the vehicle in place by `rotation`.
fn rotated_positions(rotation: f64) -> [ModulePosition; 4] {
    let states = kinematics().chassis_to_module_states(&ChassisSpeeds::new(0.0, 0.0, rotation));
    let mut positions = [ModulePosition::default(); 4];
    for (position, state) in positions.iter_mut().zip(states.iter()) {
        *position = ModulePosition::new(state.speed(), state.angle());
    }

    positions
}

#[test]
fn when_all_modules_drive_one_meter_forward_it_should_move_one_meter_along_x() {
    let mut fusion = fusion();

    let processed = fusion.process_samples(&[
        straight_sample(0.01, 0.25, None),
        straight_sample(0.02, 0.5, None),
        straight_sample(0.03, 0.75, None),
        straight_sample(0.04, 1.0, None),
    ]);

    let poses = fusion.poses();
    assert_eq!(processed, 4);
    assert!(approx_eq!(f64, poses.combined.x(), 1.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, poses.combined.y(), 0.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, poses.combined.heading(), 0.0, epsilon = 1e-9));
    assert_eq!(poses.combined, poses.wheel_only);
    assert_eq!(poses.vision_only, Pose::identity());
    assert!(approx_eq!(f64, fusion.tracked_heading(), 0.0, epsilon = 1e-12));
}

#[test]
fn when_nothing_moves_it_should_keep_the_pose() {
    let mut fusion = fusion();
    fusion.set_pose(Pose::new(1.0, 2.0, 0.3));

    fusion.process_samples(&[
        straight_sample(0.01, 0.0, None),
        straight_sample(0.02, 0.0, None),
    ]);

    let pose = fusion.pose();
    assert!(approx_eq!(f64, pose.x(), 1.0, epsilon = 1e-12));
    assert!(approx_eq!(f64, pose.y(), 2.0, epsilon = 1e-12));
    assert!(approx_eq!(f64, pose.heading(), 0.3, epsilon = 1e-12));
}

#[test]
fn when_the_gyro_is_connected_it_should_only_use_the_gyro_heading() {
    let mut fusion = fusion();

    // The wheels say the vehicle turned, the gyro says it did not
    fusion.process_sample(&OdometrySample {
        timestamp: 0.01,
        positions: rotated_positions(0.2),
        heading: Some(0.05),
    });

    assert_eq!(fusion.tracked_heading(), 0.05);
    assert!(approx_eq!(f64, fusion.pose().heading(), 0.05, epsilon = 1e-12));
}

#[test]
fn when_the_gyro_is_disconnected_it_should_integrate_the_wheels() {
    let mut fusion = fusion();

    fusion.process_sample(&OdometrySample {
        timestamp: 0.01,
        positions: rotated_positions(0.2),
        heading: None,
    });

    assert!(approx_eq!(f64, fusion.tracked_heading(), 0.2, epsilon = 1e-9));
    assert!(approx_eq!(f64, fusion.pose().heading(), 0.2, epsilon = 1e-9));
}

#[test]
fn when_the_gyro_disconnects_it_should_continue_from_the_last_gyro_heading() {
    let mut fusion = fusion();

    fusion.process_sample(&straight_sample(0.01, 0.1, Some(0.5)));
    fusion.process_sample(&straight_sample(0.02, 0.2, None));
    fusion.process_sample(&straight_sample(0.03, 0.3, None));

    assert!(approx_eq!(f64, fusion.tracked_heading(), 0.5, epsilon = 1e-12));
    assert!(approx_eq!(f64, fusion.pose().heading(), 0.5, epsilon = 1e-12));
}

#[test]
fn when_a_sample_is_not_newer_it_should_be_skipped() {
    let mut fusion = fusion();

    assert!(fusion.process_sample(&straight_sample(0.02, 0.5, None)));
    assert!(!fusion.process_sample(&straight_sample(0.02, 0.7, None)));
    assert!(!fusion.process_sample(&straight_sample(0.01, 0.9, None)));

    assert!(approx_eq!(f64, fusion.pose().x(), 0.5, epsilon = 1e-12));
    assert_eq!(fusion.last_timestamp(), Some(0.02));
    assert_eq!(fusion.last_positions()[0], ModulePosition::new(0.5, 0.0));

    let statistics = fusion.take_statistics();
    assert_eq!(statistics.samples_processed, 1);
    assert_eq!(statistics.samples_skipped, 2);
    assert_eq!(fusion.take_statistics(), FusionStatistics::default());
}

#[test]
fn when_setting_the_pose_it_should_return_that_pose() {
    let mut fusion = fusion();
    fusion.process_samples(&[straight_sample(0.01, 0.4, None)]);
    let target = Pose::new(-3.0, 7.5, 2.0);

    fusion.set_pose(target);

    let poses = fusion.poses();
    assert_eq!(fusion.pose(), target);
    assert_eq!(poses.wheel_only, target);
    assert_eq!(poses.vision_only, target);

    // The positions at the time of the reset are the new reference
    fusion.process_sample(&straight_sample(0.02, 0.4, None));
    assert!(approx_eq!(f64, fusion.pose().x(), -3.0, epsilon = 1e-12));
    assert!(approx_eq!(f64, fusion.pose().y(), 7.5, epsilon = 1e-12));
}

#[test]
fn when_a_vision_measurement_is_newer_than_the_odometry_it_should_wait() {
    let mut fusion = fusion();
    fusion.process_sample(&straight_sample(0.02, 0.2, None));

    fusion.add_vision_measurement(VisionMeasurement::new(
        Pose::new(1.0, 0.0, 0.0),
        0.05,
        VisionConfidence::uniform(0.1),
    ));

    fusion.process_sample(&straight_sample(0.04, 0.4, None));
    assert_eq!(fusion.pending_vision_count(), 1);
    assert!(approx_eq!(f64, fusion.pose().x(), 0.4, epsilon = 1e-9));

    fusion.process_sample(&straight_sample(0.06, 0.6, None));

    // At 0.05s the wheels say 0.5m, vision says 1.0m, half of the difference is applied
    let poses = fusion.poses();
    assert_eq!(fusion.pending_vision_count(), 0);
    assert!(approx_eq!(f64, poses.combined.x(), 0.85, epsilon = 1e-9));
    assert!(approx_eq!(f64, poses.wheel_only.x(), 0.6, epsilon = 1e-9));
    assert!(approx_eq!(f64, poses.vision_only.x(), 0.5, epsilon = 1e-9));
    assert_eq!(fusion.take_statistics().vision_applied, 1);
}

#[test]
fn when_applying_pending_vision_it_should_only_use_measurements_up_to_now() {
    let mut fusion = fusion();
    fusion.process_sample(&straight_sample(0.02, 0.2, None));
    let confidence = VisionConfidence::uniform(0.1);
    fusion.add_vision_measurement(VisionMeasurement::new(Pose::new(0.2, 0.0, 0.0), 0.02, confidence));
    fusion.add_vision_measurement(VisionMeasurement::new(Pose::new(5.0, 0.0, 0.0), 9.0, confidence));

    let applied = fusion.apply_pending_vision(0.02);

    assert_eq!(applied, 1);
    assert_eq!(fusion.pending_vision_count(), 1);
}

#[test]
fn when_too_many_measurements_wait_it_should_drop_the_oldest() {
    let mut fusion = PoseFusion::new(
        kinematics(),
        0.0,
        &[ModulePosition::default(); 4],
        Pose::identity(),
        VisionPolicy {
            queue_capacity: 2,
            ..VisionPolicy::default()
        },
    );
    let confidence = VisionConfidence::uniform(0.1);

    for step in 0..3 {
        fusion.add_vision_measurement(VisionMeasurement::new(
            Pose::identity(),
            10.0 + step as f64,
            confidence,
        ));
    }

    assert_eq!(fusion.pending_vision_count(), 2);
    assert_eq!(fusion.take_statistics().vision_rejected, 1);
}

#[test]
fn when_zeroing_the_heading_it_should_keep_the_translation() {
    let mut fusion = fusion();
    fusion.process_sample(&straight_sample(0.01, 1.0, Some(0.7)));
    let before = fusion.pose();

    fusion.zero_heading();

    let after = fusion.pose();
    assert_eq!(fusion.tracked_heading(), 0.0);
    assert_eq!(after.x(), before.x());
    assert_eq!(after.y(), before.y());
    assert_eq!(after.heading(), 0.0);

    // Driving forward now moves along x
    fusion.process_sample(&straight_sample(0.02, 2.0, Some(0.0)));
    assert!(approx_eq!(f64, fusion.pose().x(), before.x() + 1.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, fusion.pose().y(), before.y(), epsilon = 1e-9));
}
