//! The assembly of the swerve drivetrain.
//!
//! The [Drivetrain] owns the four [Module]s, the gyro, the [OdometrySampler] and the
//! [PoseFusion]. It is driven by an external control loop which calls [Drivetrain::periodic]
//! once per control period. A periodic cycle:
//!
//! 1. Reads the gyro and drains the odometry samples captured since the previous cycle.
//! 2. Hands the samples to the modules and refreshes their inputs.
//! 3. Replays the samples, in capture order, through the pose fusion and applies the vision
//!    measurements that arrived in the meantime.
//! 4. Predicts the pose a short time ahead.
//!
//! Velocity requests are converted to module setpoints by [Drivetrain::run_velocity] and
//! [Drivetrain::run_velocity_field].

use std::{mem, sync::Arc};

use crossbeam_channel::Receiver;
use log::{debug, trace, warn};

use crate::config::DrivetrainConfig;
use crate::estimation::pose_fusion::{FusedPoses, OdometrySample, PoseFusion};
use crate::estimation::prediction::PosePredictor;
use crate::estimation::vision::{vision_channel, VisionMeasurement, VisionSender};
use crate::geometry::pose::Pose;
use crate::hardware::gyro_io::{GyroInputs, GyroIo};
use crate::hardware::module_io::ModuleIo;
use crate::hardware::{create_backend, SimulationHandles};
use crate::kinematics::chassis_speeds::ChassisSpeeds;
use crate::kinematics::module_state::{ModulePosition, ModuleState};
use crate::kinematics::swerve_kinematics::SwerveKinematics;
use crate::module::Module;
use crate::odometry::clock::Clock;
use crate::odometry::sample_buffer::SampleBuffer;
use crate::odometry::sampler::{OdometrySampler, OdometrySamplerHandle, TickOutcome};
use crate::{Error, MODULE_COUNT};

#[cfg(test)]
#[path = "drivetrain_tests.rs"]
mod drivetrain_tests;

/// Module speeds below this value, in meters per second, keep the previous module heading.
const STATIONARY_MODULE_SPEED: f64 = 1e-9;

/// The outcome of a single [Drivetrain::periodic] cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleReport {
    /// The pose estimates after the cycle.
    pub poses: FusedPoses,

    /// The combined pose predicted ahead by the default lookahead.
    pub predicted_pose: Pose,

    /// The number of odometry samples that were processed.
    pub samples_processed: usize,

    /// The number of vision measurements that were applied.
    pub vision_applied: u64,

    /// The number of vision measurements that were discarded.
    pub vision_rejected: u64,
}

enum SamplerState {
    /// The sampler is owned by the drivetrain and is only ticked on request.
    Idle(OdometrySampler),

    /// The sampler runs on its own thread.
    Running(OdometrySamplerHandle),

    /// The sampler thread failed and the sampler is gone.
    Lost,
}

/// A swerve drivetrain with four modules.
pub struct Drivetrain {
    config: DrivetrainConfig,
    kinematics: SwerveKinematics,
    gyro: Box<dyn GyroIo>,
    gyro_inputs: GyroInputs,
    modules: [Module; MODULE_COUNT],
    clock: Arc<dyn Clock>,

    /// The queues the sampler writes into, shared with the sampler.
    sample_buffer: SampleBuffer,
    sampler: SamplerState,

    fusion: PoseFusion,
    predictor: PosePredictor,
    vision_sender: VisionSender,
    vision_receiver: Receiver<VisionMeasurement>,

    /// The module headings used when a module is asked to stand still.
    retained_headings: [f64; MODULE_COUNT],
    last_setpoints: [ModuleState; MODULE_COUNT],
    last_optimized_setpoints: [ModuleState; MODULE_COUNT],
    enabled: bool,
}

impl Drivetrain {
    /// Queues a vision measurement for the next [Drivetrain::periodic] cycle.
    pub fn add_vision_measurement(&mut self, measurement: VisionMeasurement) {
        self.fusion.add_vision_measurement(measurement);
    }

    /// Returns the chassis speeds derived from the measured module states.
    pub fn chassis_speeds(&self) -> ChassisSpeeds {
        self.kinematics
            .module_states_to_chassis_speeds(&self.module_states())
    }

    fn collect_samples(&self) -> Vec<OdometrySample> {
        let counts = self
            .modules
            .iter()
            .map(|module| module.odometry_timestamps().len());
        let count = counts.clone().min().unwrap_or(0);
        if counts.clone().max().unwrap_or(0) != count {
            warn!(
                "Module sample counts differ, only using the first {} samples",
                count
            );
        }

        let heading = if self.gyro_inputs.connected {
            Some(self.gyro_inputs.yaw)
        } else {
            None
        };

        let timestamps = self.modules[0].odometry_timestamps();
        (0..count)
            .map(|sample| {
                let mut positions = [ModulePosition::default(); MODULE_COUNT];
                for (position, module) in positions.iter_mut().zip(self.modules.iter()) {
                    *position = module.odometry_positions()[sample];
                }

                OdometrySample {
                    timestamp: timestamps[sample],
                    positions,
                    heading,
                }
            })
            .collect()
    }

    /// Returns the configuration of the drivetrain.
    pub fn config(&self) -> &DrivetrainConfig {
        &self.config
    }

    /// Returns the number of odometry samples lost because the sample queues overflowed.
    pub fn dropped_samples(&self) -> u64 {
        self.sample_buffer.dropped_samples()
    }

    /// Creates a drivetrain with the hardware selected by [DrivetrainConfig::backend].
    ///
    /// Returns the handles that control the simulated hardware if the backend is simulated.
    ///
    /// ## Parameters
    ///
    /// * 'config' - The configuration of the drivetrain
    /// * 'clock' - The source of the sample timestamps
    ///
    /// ## Errors
    ///
    /// See [Drivetrain::new].
    pub fn from_config(
        config: DrivetrainConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, Option<SimulationHandles>), Error> {
        let backend = create_backend(config.backend);
        let drivetrain = Self::new(config, backend.gyro, backend.modules, clock)?;
        Ok((drivetrain, backend.simulation))
    }

    /// Returns the heading of the combined pose estimate in radians.
    pub fn heading(&self) -> f64 {
        self.pose().heading()
    }

    /// Returns a value indicating whether the drivetrain is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the kinematics of the drivetrain.
    pub fn kinematics(&self) -> &SwerveKinematics {
        &self.kinematics
    }

    /// Returns the optimized module setpoints that were sent to the modules last.
    pub fn last_optimized_setpoints(&self) -> &[ModuleState; MODULE_COUNT] {
        &self.last_optimized_setpoints
    }

    /// Returns the module setpoints, before optimization, that were requested last.
    pub fn last_setpoints(&self) -> &[ModuleState; MODULE_COUNT] {
        &self.last_setpoints
    }

    /// Returns the maximum angular speed in radians per second.
    pub fn max_angular_speed(&self) -> f64 {
        self.config.max_linear_speed_mps / self.kinematics.drive_base_radius()
    }

    /// Returns the maximum wheel speed in meters per second.
    pub fn max_linear_speed(&self) -> f64 {
        self.config.max_linear_speed_mps
    }

    /// Returns the latest cumulative module positions.
    pub fn module_positions(&self) -> [ModulePosition; MODULE_COUNT] {
        let mut positions = [ModulePosition::default(); MODULE_COUNT];
        for (position, module) in positions.iter_mut().zip(self.modules.iter()) {
            *position = module.position();
        }

        positions
    }

    /// Returns the latest measured module states.
    pub fn module_states(&self) -> [ModuleState; MODULE_COUNT] {
        let mut states = [ModuleState::default(); MODULE_COUNT];
        for (state, module) in states.iter_mut().zip(self.modules.iter()) {
            *state = module.state();
        }

        states
    }

    /// Creates a new [Drivetrain].
    ///
    /// The position signals of the modules are registered with a new odometry sampler. The
    /// sampler is not started, see [Drivetrain::start_odometry_sampling]. The pose starts at
    /// the origin, and the tracked heading starts at the gyro yaw if the gyro is connected.
    ///
    /// ## Parameters
    ///
    /// * 'config' - The configuration of the drivetrain
    /// * 'gyro' - The orientation sensor
    /// * 'module_ios' - The module hardware in the order front left, front right, back left,
    ///   back right
    /// * 'clock' - The source of the sample timestamps
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when a configuration value is out of range.
    /// * [Error::InvalidModuleCount] - Returned when the configuration does not have four
    ///   module offsets.
    /// * [Error::InvalidGeometry] - Returned when the module offsets are degenerate.
    pub fn new(
        config: DrivetrainConfig,
        mut gyro: Box<dyn GyroIo>,
        module_ios: [Box<dyn ModuleIo>; MODULE_COUNT],
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let kinematics = SwerveKinematics::new(config.module_offset_vectors()?)?;

        let mut sampler = OdometrySampler::new(clock.clone(), config.sample_queue_capacity);
        let sample_buffer = sampler.buffer();

        let mut modules = Vec::with_capacity(MODULE_COUNT);
        for (index, mut io) in module_ios.into_iter().enumerate() {
            let channel = io.odometry_source().map(|source| sampler.register(source));
            let mut module = Module::new(index, io, channel, config.cosine_compensation)?;
            module.update_inputs();
            modules.push(module);
        }
        let modules: [Module; MODULE_COUNT] =
            modules
                .try_into()
                .map_err(|modules: Vec<Module>| Error::InvalidModuleCount {
                    count: modules.len(),
                })?;

        let mut gyro_inputs = GyroInputs::default();
        gyro.update_inputs(&mut gyro_inputs);
        let heading = if gyro_inputs.connected {
            gyro_inputs.yaw
        } else {
            0.0
        };

        let mut positions = [ModulePosition::default(); MODULE_COUNT];
        let mut retained_headings = [0.0; MODULE_COUNT];
        for (index, module) in modules.iter().enumerate() {
            positions[index] = module.position();
            retained_headings[index] = module.angle();
        }

        let fusion = PoseFusion::new(
            kinematics.clone(),
            heading,
            &positions,
            Pose::identity(),
            config.vision.clone(),
        );
        let (vision_sender, vision_receiver) = vision_channel(config.vision.queue_capacity);

        debug!(
            "Created the drivetrain with {} sampled modules, gyro connected: {}",
            sampler.channel_count(),
            gyro_inputs.connected
        );

        Ok(Self {
            predictor: PosePredictor::new(config.lookahead_seconds),
            config,
            kinematics,
            gyro,
            gyro_inputs,
            modules,
            clock,
            sample_buffer,
            sampler: SamplerState::Idle(sampler),
            fusion,
            vision_sender,
            vision_receiver,
            retained_headings,
            last_setpoints: [ModuleState::default(); MODULE_COUNT],
            last_optimized_setpoints: [ModuleState::default(); MODULE_COUNT],
            enabled: true,
        })
    }

    /// Runs a single control cycle and returns what happened in it.
    ///
    /// When the drivetrain is disabled all modules are stopped.
    pub fn periodic(&mut self) -> CycleReport {
        self.gyro.update_inputs(&mut self.gyro_inputs);

        let mut drained = self.sample_buffer.drain_all();
        for module in self.modules.iter_mut() {
            module.periodic(&mut drained);
        }

        if !self.enabled {
            for module in self.modules.iter_mut() {
                module.stop();
            }
        }

        for measurement in self.vision_receiver.try_iter() {
            self.fusion.add_vision_measurement(measurement);
        }

        let samples = self.collect_samples();
        let samples_processed = self.fusion.process_samples(&samples);

        let now = match self.fusion.last_timestamp() {
            Some(timestamp) if samples_processed > 0 => timestamp,
            _ => self.clock.now_seconds(),
        };
        self.fusion.apply_pending_vision(now);

        let statistics = self.fusion.take_statistics();
        let poses = self.fusion.poses();
        let predicted_pose = self.predictor.predict(&poses.combined, &self.chassis_speeds());

        trace!(
            "Processed {} odometry samples, pose ({:.3}, {:.3}, {:.3})",
            samples_processed,
            poses.combined.x(),
            poses.combined.y(),
            poses.combined.heading()
        );

        CycleReport {
            poses,
            predicted_pose,
            samples_processed,
            vision_applied: statistics.vision_applied,
            vision_rejected: statistics.vision_rejected,
        }
    }

    /// Returns the combined pose estimate.
    pub fn pose(&self) -> Pose {
        self.fusion.pose()
    }

    /// Returns the estimates of all three pose estimators.
    pub fn poses(&self) -> FusedPoses {
        self.fusion.poses()
    }

    /// Returns the combined pose extrapolated `lookahead_seconds` ahead with the measured
    /// chassis speeds.
    pub fn predicted_pose(&self, lookahead_seconds: f64) -> Pose {
        self.predictor
            .predict_with(&self.pose(), &self.chassis_speeds(), lookahead_seconds)
    }

    /// Returns the combined pose extrapolated ahead by the configured lookahead.
    pub fn predicted_pose_default(&self) -> Pose {
        self.predictor.predict(&self.pose(), &self.chassis_speeds())
    }

    /// Drives all modules open loop at the given voltage, pointing forward.
    pub fn run_characterization(&mut self, volts: f64) {
        for module in self.modules.iter_mut() {
            module.run_characterization(volts);
        }
    }

    /// Drives the vehicle with the given robot relative speeds and returns the optimized module
    /// setpoints.
    ///
    /// The speeds are discretized over the control period, converted to module states and
    /// desaturated against the maximum wheel speed. Modules that should stand still keep their
    /// previous heading.
    ///
    /// ## Parameters
    ///
    /// * 'speeds' - The robot relative chassis speeds.
    pub fn run_velocity(&mut self, speeds: ChassisSpeeds) -> [ModuleState; MODULE_COUNT] {
        let discrete = speeds.discretize(self.config.control_period_seconds);
        let mut setpoints = self.kinematics.chassis_to_module_states(&discrete);

        for (setpoint, retained) in setpoints.iter_mut().zip(self.retained_headings.iter_mut()) {
            if setpoint.speed().abs() < STATIONARY_MODULE_SPEED {
                *setpoint = ModuleState::new(0.0, *retained);
            } else {
                *retained = setpoint.angle();
            }
        }

        SwerveKinematics::desaturate(&mut setpoints, self.config.max_linear_speed_mps);

        let mut optimized = [ModuleState::default(); MODULE_COUNT];
        for ((result, module), setpoint) in optimized
            .iter_mut()
            .zip(self.modules.iter_mut())
            .zip(setpoints.iter())
        {
            *result = module.run_setpoint(*setpoint);
        }

        self.last_setpoints = setpoints;
        self.last_optimized_setpoints = optimized;
        optimized
    }

    /// Drives the vehicle with the given field relative speeds, using the tracked heading to
    /// convert them to robot relative speeds.
    pub fn run_velocity_field(&mut self, speeds: ChassisSpeeds) -> [ModuleState; MODULE_COUNT] {
        let robot_relative =
            ChassisSpeeds::from_field_relative(&speeds, self.fusion.tracked_heading());
        self.run_velocity(robot_relative)
    }

    /// Samples the module positions once, if the odometry sampler is not running on its own
    /// thread.
    ///
    /// Returns `None` if the sampler is running on its own thread.
    pub fn sample_odometry(&mut self) -> Option<TickOutcome> {
        match &mut self.sampler {
            SamplerState::Idle(sampler) => Some(sampler.tick()),
            _ => None,
        }
    }

    /// Enables or disables brake mode on all modules.
    pub fn set_brake_mode(&mut self, enabled: bool) {
        for module in self.modules.iter_mut() {
            module.set_brake_mode(enabled);
        }
    }

    /// Enables or disables the drivetrain. A disabled drivetrain stops all modules every cycle.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Resets all pose estimates to `pose`.
    pub fn set_pose(&mut self, pose: Pose) {
        self.fusion.set_pose(pose);
    }

    /// Starts sampling the module positions on a background thread at the configured rate.
    ///
    /// ## Errors
    ///
    /// * [Error::OdometrySamplerAlreadyRunning] - Returned when the sampler is already running.
    /// * [Error::FailedToStartOdometrySampler] - Returned when the thread could not be started.
    ///   The sampler cannot be restarted after this error.
    pub fn start_odometry_sampling(&mut self) -> Result<(), Error> {
        match mem::replace(&mut self.sampler, SamplerState::Lost) {
            SamplerState::Idle(sampler) => {
                let handle = sampler.start(self.config.odometry_frequency_hz)?;
                self.sampler = SamplerState::Running(handle);
                Ok(())
            }
            SamplerState::Running(handle) => {
                self.sampler = SamplerState::Running(handle);
                Err(Error::OdometrySamplerAlreadyRunning)
            }
            SamplerState::Lost => Err(Error::FailedToStartOdometrySampler {
                reason: "the odometry sampler was lost when its thread failed".to_string(),
            }),
        }
    }

    /// Stops the drivetrain. Modules keep their heading.
    pub fn stop(&mut self) {
        self.run_velocity(ChassisSpeeds::zero());
    }

    /// Stops sampling the module positions on the background thread.
    ///
    /// Returns `false` if the sampler was not running.
    pub fn stop_odometry_sampling(&mut self) -> bool {
        match mem::replace(&mut self.sampler, SamplerState::Lost) {
            SamplerState::Running(handle) => {
                if let Some(sampler) = handle.stop() {
                    self.sampler = SamplerState::Idle(sampler);
                } else {
                    warn!("The odometry sampler thread failed");
                }
                true
            }
            other => {
                self.sampler = other;
                false
            }
        }
    }

    /// Stops the drivetrain and turns the modules into an X to resist being pushed.
    ///
    /// The modules return to their normal headings the next time a non-zero velocity is
    /// requested.
    pub fn stop_with_x(&mut self) {
        self.retained_headings = self.kinematics.module_offset_angles();
        self.stop();
    }

    /// Returns the heading fed to the pose estimators, in radians. This is the gyro yaw when
    /// the gyro is connected and the heading integrated from the wheels otherwise.
    pub fn tracked_heading(&self) -> f64 {
        self.fusion.tracked_heading()
    }

    /// Returns a sender that submits vision measurements from any thread.
    pub fn vision_sender(&self) -> VisionSender {
        self.vision_sender.clone()
    }

    /// Returns the vision-only pose estimate.
    pub fn vision_only_pose(&self) -> Pose {
        self.fusion.poses().vision_only
    }

    /// Returns the wheel-only pose estimate.
    pub fn wheel_only_pose(&self) -> Pose {
        self.fusion.poses().wheel_only
    }

    /// Zeroes the gyro and the tracked heading. The translation of the pose is kept and its
    /// heading becomes zero, even if an earlier [Drivetrain::set_pose] used a different heading.
    pub fn zero_heading(&mut self) {
        self.gyro.zero();
        self.gyro_inputs.yaw = 0.0;
        self.fusion.zero_heading();
    }
}
