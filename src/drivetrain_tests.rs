use super::*;
use crate::estimation::vision::VisionConfidence;
use crate::geometry::angle::shortest_rotation_between;
use crate::hardware::HardwareBackend;
use crate::odometry::clock::{ManualClock, MonotonicClock};
use float_cmp::approx_eq;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::{thread, time::Duration};

fn simulated() -> (Drivetrain, SimulationHandles, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0.0));
    let (drivetrain, handles) =
        Drivetrain::from_config(DrivetrainConfig::default(), clock.clone()).unwrap();

    (drivetrain, handles.unwrap(), clock)
}

/// Moves every module to `distance` at `angle` and samples the positions 5 ms later.
fn drive_all(
    drivetrain: &mut Drivetrain,
    handles: &SimulationHandles,
    clock: &ManualClock,
    distance: f64,
    angle: f64,
) {
    clock.advance(0.005);
    for module in handles.modules.iter() {
        module.set_position(distance, angle);
    }

    assert_eq!(drivetrain.sample_odometry(), Some(TickOutcome::Recorded));
}

#[test]
fn when_all_modules_drive_forward_it_should_move_the_pose_along_x() {
    let (mut drivetrain, handles, clock) = simulated();

    for step in 1..=4 {
        drive_all(&mut drivetrain, &handles, &clock, 0.25 * step as f64, 0.0);
    }
    let report = drivetrain.periodic();

    assert_eq!(report.samples_processed, 4);
    assert!(approx_eq!(f64, report.poses.combined.x(), 1.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, report.poses.combined.y(), 0.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, report.poses.combined.heading(), 0.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, report.poses.wheel_only.x(), 1.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, report.poses.vision_only.x(), 0.0, epsilon = 1e-9));
}

#[test]
fn when_nothing_moves_it_should_keep_the_pose() {
    let (mut drivetrain, handles, clock) = simulated();

    for _ in 0..10 {
        drive_all(&mut drivetrain, &handles, &clock, 0.0, 0.0);
    }
    let report = drivetrain.periodic();

    assert_eq!(report.samples_processed, 10);
    assert_eq!(report.poses.combined, Pose::identity());
    assert_eq!(report.poses.wheel_only, Pose::identity());
}

#[test]
fn when_the_gyro_is_connected_it_should_use_the_gyro_heading() {
    let (mut drivetrain, handles, clock) = simulated();
    handles.gyro.set_connected(true);
    handles.gyro.set_yaw(0.3, 0.0);

    drive_all(&mut drivetrain, &handles, &clock, 0.1, 0.0);
    drivetrain.periodic();

    assert!(approx_eq!(f64, drivetrain.tracked_heading(), 0.3, epsilon = 1e-12));
    assert!(approx_eq!(f64, drivetrain.heading(), 0.3, epsilon = 1e-9));
}

#[test]
fn when_the_gyro_disconnects_it_should_continue_from_the_last_heading() {
    let (mut drivetrain, handles, clock) = simulated();
    handles.gyro.set_connected(true);
    handles.gyro.set_yaw(0.3, 0.0);
    drive_all(&mut drivetrain, &handles, &clock, 0.1, 0.0);
    drivetrain.periodic();

    handles.gyro.set_connected(false);
    handles.gyro.set_yaw(1.2, 0.0);
    drive_all(&mut drivetrain, &handles, &clock, 0.2, 0.0);
    drive_all(&mut drivetrain, &handles, &clock, 0.3, 0.0);
    drivetrain.periodic();

    assert!(approx_eq!(f64, drivetrain.tracked_heading(), 0.3, epsilon = 1e-9));
    assert!(approx_eq!(f64, drivetrain.heading(), 0.3, epsilon = 1e-9));
}

#[test]
fn when_setting_the_pose_it_should_report_that_pose() {
    let (mut drivetrain, handles, clock) = simulated();
    drive_all(&mut drivetrain, &handles, &clock, 0.5, 0.0);
    drivetrain.periodic();

    let target = Pose::new(3.0, -2.0, 1.0);
    drivetrain.set_pose(target);

    assert_eq!(drivetrain.pose(), target);
    assert_eq!(drivetrain.wheel_only_pose(), target);
    assert_eq!(drivetrain.vision_only_pose(), target);

    let report = drivetrain.periodic();
    assert_eq!(report.samples_processed, 0);
    assert_eq!(report.poses.combined, target);
}

#[test]
fn when_zeroing_the_heading_it_should_keep_the_translation() {
    let (mut drivetrain, handles, clock) = simulated();
    handles.gyro.set_connected(true);
    handles.gyro.set_yaw(0.5, 0.0);
    drive_all(&mut drivetrain, &handles, &clock, 0.4, 0.0);
    drivetrain.periodic();
    let before = drivetrain.pose();

    drivetrain.zero_heading();

    assert!(approx_eq!(f64, handles.gyro.yaw(), 0.0, epsilon = 1e-12));
    assert_eq!(drivetrain.tracked_heading(), 0.0);
    assert!(approx_eq!(f64, drivetrain.pose().x(), before.x(), epsilon = 1e-12));
    assert!(approx_eq!(f64, drivetrain.pose().y(), before.y(), epsilon = 1e-12));
    assert!(approx_eq!(f64, drivetrain.heading(), 0.0, epsilon = 1e-12));

    drive_all(&mut drivetrain, &handles, &clock, 0.4, 0.0);
    drivetrain.periodic();
    assert!(approx_eq!(f64, drivetrain.heading(), 0.0, epsilon = 1e-9));
}

#[test]
fn when_driving_forward_it_should_point_all_modules_forward() {
    let (mut drivetrain, handles, _) = simulated();

    let optimized = drivetrain.run_velocity(ChassisSpeeds::new(1.0, 0.0, 0.0));

    for (state, module) in optimized.iter().zip(handles.modules.iter()) {
        assert!(approx_eq!(f64, state.speed(), 1.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, state.angle(), 0.0, epsilon = 1e-9));
        assert_eq!(module.commanded_velocity(), Some(state.speed()));
    }
}

#[test]
fn when_requesting_too_much_speed_it_should_desaturate_the_modules() {
    let (mut drivetrain, _, _) = simulated();

    drivetrain.run_velocity(ChassisSpeeds::new(10.0, 0.0, 0.0));

    for state in drivetrain.last_setpoints().iter() {
        assert!(approx_eq!(
            f64,
            state.speed(),
            drivetrain.max_linear_speed(),
            epsilon = 1e-9
        ));
    }
}

#[test]
fn when_requesting_a_fast_rotation_it_should_keep_the_rotation_direction() {
    let (mut drivetrain, _, _) = simulated();

    drivetrain.run_velocity(ChassisSpeeds::new(0.0, 0.0, 200.0));

    let x_angles = drivetrain.kinematics().module_offset_angles();
    for (state, angle) in drivetrain.last_setpoints().iter().zip(x_angles.iter()) {
        assert!(approx_eq!(
            f64,
            state.speed(),
            drivetrain.max_linear_speed(),
            epsilon = 1e-9
        ));
        assert!(approx_eq!(
            f64,
            shortest_rotation_between(*angle + FRAC_PI_2, state.angle()),
            0.0,
            epsilon = 1e-9
        ));
    }
}

#[test]
fn when_stopping_with_x_it_should_keep_the_x_until_the_next_motion() {
    let (mut drivetrain, _, _) = simulated();
    let x_angles = drivetrain.kinematics().module_offset_angles();

    drivetrain.stop_with_x();
    for (state, angle) in drivetrain.last_setpoints().iter().zip(x_angles.iter()) {
        assert_eq!(state.speed(), 0.0);
        assert!(approx_eq!(f64, state.angle(), *angle, epsilon = 1e-12));
    }

    drivetrain.stop();
    for (state, angle) in drivetrain.last_setpoints().iter().zip(x_angles.iter()) {
        assert!(approx_eq!(f64, state.angle(), *angle, epsilon = 1e-12));
    }

    drivetrain.run_velocity(ChassisSpeeds::new(1.0, 0.0, 0.0));
    drivetrain.stop();
    for state in drivetrain.last_setpoints().iter() {
        assert_eq!(state.speed(), 0.0);
        assert!(approx_eq!(f64, state.angle(), 0.0, epsilon = 1e-9));
    }
}

#[test]
fn when_stopping_it_should_keep_the_module_headings() {
    let (mut drivetrain, _, _) = simulated();

    drivetrain.run_velocity(ChassisSpeeds::new(0.0, 1.0, 0.0));
    drivetrain.stop();

    for state in drivetrain.last_setpoints().iter() {
        assert_eq!(state.speed(), 0.0);
        assert!(approx_eq!(f64, state.angle(), FRAC_PI_2, epsilon = 1e-9));
    }
}

#[test]
fn when_driving_field_relative_it_should_rotate_by_the_tracked_heading() {
    let (mut drivetrain, handles, clock) = simulated();
    handles.gyro.set_connected(true);
    handles.gyro.set_yaw(FRAC_PI_2, 0.0);
    drive_all(&mut drivetrain, &handles, &clock, 0.0, 0.0);
    drivetrain.periodic();

    drivetrain.run_velocity_field(ChassisSpeeds::new(1.0, 0.0, 0.0));

    for state in drivetrain.last_setpoints().iter() {
        assert!(approx_eq!(f64, state.speed(), 1.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, state.angle(), -FRAC_PI_2, epsilon = 1e-9));
    }
}

#[test]
fn when_submitting_vision_it_should_correct_the_combined_pose() {
    let (mut drivetrain, handles, clock) = simulated();
    for step in 1..=4 {
        drive_all(&mut drivetrain, &handles, &clock, 0.25 * step as f64, 0.0);
    }

    let sender = drivetrain.vision_sender();
    assert!(sender.submit(VisionMeasurement::new(
        Pose::new(2.0, 0.0, 0.0),
        clock.now_seconds(),
        VisionConfidence::uniform(0.1),
    )));
    let report = drivetrain.periodic();

    assert_eq!(report.vision_applied, 1);
    assert_eq!(report.vision_rejected, 0);
    assert!(approx_eq!(f64, report.poses.combined.x(), 1.5, epsilon = 1e-9));
    assert!(approx_eq!(f64, report.poses.wheel_only.x(), 1.0, epsilon = 1e-9));
    assert!(report.poses.vision_only.x() > 0.0);
}

#[test]
fn when_vision_is_from_the_future_it_should_wait_for_the_odometry() {
    let (mut drivetrain, handles, clock) = simulated();
    drive_all(&mut drivetrain, &handles, &clock, 0.25, 0.0);

    drivetrain.add_vision_measurement(VisionMeasurement::new(
        Pose::new(0.25, 0.0, 0.0),
        clock.now_seconds() + 0.008,
        VisionConfidence::uniform(0.1),
    ));
    let first = drivetrain.periodic();
    assert_eq!(first.vision_applied, 0);

    drive_all(&mut drivetrain, &handles, &clock, 0.5, 0.0);
    drive_all(&mut drivetrain, &handles, &clock, 0.75, 0.0);
    let second = drivetrain.periodic();
    assert_eq!(second.vision_applied, 1);
}

#[test]
fn when_predicting_it_should_extrapolate_with_the_measured_speeds() {
    let (mut drivetrain, handles, _) = simulated();
    for module in handles.modules.iter() {
        module.set_velocity(2.0);
    }
    let report = drivetrain.periodic();

    let predicted = drivetrain.predicted_pose(0.5);

    assert!(approx_eq!(f64, predicted.x(), 1.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, predicted.y(), 0.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, report.predicted_pose.x(), 2.0 * 0.05, epsilon = 1e-9));
    assert_eq!(drivetrain.predicted_pose_default(), report.predicted_pose);
}

#[test]
fn when_disabled_it_should_stop_the_modules() {
    let (mut drivetrain, handles, _) = simulated();
    drivetrain.run_velocity(ChassisSpeeds::new(1.0, 0.0, 0.0));

    drivetrain.set_enabled(false);
    drivetrain.periodic();

    assert!(!drivetrain.is_enabled());
    for module in handles.modules.iter() {
        assert_eq!(module.commanded_velocity(), Some(0.0));
    }
}

#[test]
fn when_running_characterization_it_should_drive_open_loop() {
    let (mut drivetrain, handles, _) = simulated();

    drivetrain.run_characterization(6.0);

    for module in handles.modules.iter() {
        assert_eq!(module.commanded_velocity(), None);
        assert_eq!(module.drive_applied_volts(), 6.0);
        assert_eq!(module.position().angle(), 0.0);
    }
}

#[test]
fn when_setting_brake_mode_it_should_reach_all_modules() {
    let (mut drivetrain, handles, _) = simulated();

    drivetrain.set_brake_mode(true);

    assert!(handles.modules.iter().all(|module| module.brake_enabled()));
}

#[test]
fn when_a_module_fails_to_report_it_should_skip_the_sample() {
    let (mut drivetrain, handles, clock) = simulated();
    handles.modules[2].set_connected(false);

    clock.advance(0.005);
    assert_eq!(drivetrain.sample_odometry(), Some(TickOutcome::Skipped));

    let report = drivetrain.periodic();
    assert_eq!(report.samples_processed, 0);
    assert_eq!(report.poses.combined, Pose::identity());
}

#[test]
fn when_using_the_disabled_backend_it_should_not_produce_samples() {
    let config = DrivetrainConfig {
        backend: HardwareBackend::Disabled,
        ..DrivetrainConfig::default()
    };
    let (mut drivetrain, handles) =
        Drivetrain::from_config(config, Arc::new(ManualClock::new(0.0))).unwrap();

    let report = drivetrain.periodic();

    assert!(handles.is_none());
    assert_eq!(drivetrain.sample_odometry(), Some(TickOutcome::Idle));
    assert_eq!(report.samples_processed, 0);
    assert_eq!(report.poses.combined, Pose::identity());
}

#[test]
fn when_the_configuration_is_invalid_it_should_not_create_the_drivetrain() {
    let config = DrivetrainConfig {
        module_offsets: vec![[0.3, 0.3], [0.3, -0.3]],
        ..DrivetrainConfig::default()
    };

    let result = Drivetrain::from_config(config, Arc::new(ManualClock::new(0.0)));

    assert!(matches!(result, Err(Error::InvalidModuleCount { count: 2 })));
}

#[test]
fn when_the_module_offsets_coincide_it_should_not_create_the_drivetrain() {
    let config = DrivetrainConfig {
        module_offsets: vec![[0.3, 0.3]; 4],
        ..DrivetrainConfig::default()
    };

    let result = Drivetrain::from_config(config, Arc::new(ManualClock::new(0.0)));

    assert!(matches!(result, Err(Error::InvalidGeometry { .. })));
}

#[test]
fn when_computing_the_maximum_angular_speed_it_should_use_the_drive_base_radius() {
    let (drivetrain, _, _) = simulated();

    let radius = (0.3556f64 * 0.3556 * 2.0).sqrt();
    assert!(approx_eq!(
        f64,
        drivetrain.max_angular_speed(),
        4.4196 / radius,
        epsilon = 1e-9
    ));
    assert!(approx_eq!(
        f64,
        drivetrain.kinematics().module_offset_angles()[0],
        FRAC_PI_4,
        epsilon = 1e-12
    ));
}

#[test]
fn when_sampling_in_the_background_it_should_feed_the_pose_estimate() {
    let (mut drivetrain, handles) =
        Drivetrain::from_config(DrivetrainConfig::default(), Arc::new(MonotonicClock::new()))
            .unwrap();
    let handles = handles.unwrap();

    for module in handles.modules.iter() {
        module.set_position(0.5, 0.0);
    }

    drivetrain.start_odometry_sampling().unwrap();
    assert!(matches!(
        drivetrain.start_odometry_sampling(),
        Err(Error::OdometrySamplerAlreadyRunning)
    ));
    assert_eq!(drivetrain.sample_odometry(), None);

    thread::sleep(Duration::from_millis(100));
    let report = drivetrain.periodic();

    assert!(drivetrain.stop_odometry_sampling());
    assert!(!drivetrain.stop_odometry_sampling());
    assert!(report.samples_processed > 0);
    assert!(approx_eq!(f64, drivetrain.pose().x(), 0.5, epsilon = 1e-9));
    assert!(drivetrain.sample_odometry().is_some());
}
