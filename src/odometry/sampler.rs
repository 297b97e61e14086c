//! The producer side of the odometry pipeline.
//!
//! The [OdometrySampler] reads every registered [ModulePositionSource] once per tick using a
//! single capture timestamp and appends the positions to the [SampleBuffer]. It can be ticked
//! synchronously, or it can be moved onto a background thread that ticks it at a fixed rate,
//! typically several times faster than the control loop.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{select, Receiver, Sender};
use log::{debug, trace};

use crate::{hardware::module_io::ModulePositionSource, kinematics::module_state::ModulePosition};
use crate::Error;

use super::clock::Clock;
use super::sample_buffer::{SampleBuffer, SampleChannel};

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod sampler_tests;

/// The result of a single sampler tick.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickOutcome {
    /// No channels are registered, nothing was sampled.
    Idle,

    /// One sample was appended to every channel.
    Recorded,

    /// At least one channel could not be read, nothing was appended.
    Skipped,
}

/// Samples the module position signals into a [SampleBuffer].
pub struct OdometrySampler {
    /// The queues that receive the samples.
    buffer: SampleBuffer,

    /// The signals, in channel order.
    sources: Vec<Box<dyn ModulePositionSource>>,

    /// The source of the capture timestamps.
    clock: Arc<dyn Clock>,

    /// Scratch storage for the positions read in a tick.
    positions: Vec<ModulePosition>,
}

impl OdometrySampler {
    /// Returns a handle to the buffer that receives the samples.
    pub fn buffer(&self) -> SampleBuffer {
        self.buffer.clone()
    }

    /// Returns the number of registered channels.
    pub fn channel_count(&self) -> usize {
        self.sources.len()
    }

    /// Creates a new [OdometrySampler] without any channels.
    ///
    /// ## Parameters
    ///
    /// * 'clock' - The source of the capture timestamps
    /// * 'capacity' - The maximum number of samples kept per channel
    pub fn new(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            buffer: SampleBuffer::new(capacity),
            sources: Vec::new(),
            clock,
            positions: Vec::new(),
        }
    }

    /// Registers a position signal and returns the channel its samples are stored in.
    ///
    /// ## Parameters
    ///
    /// * 'source' - The signal that should be sampled.
    pub fn register(&mut self, source: Box<dyn ModulePositionSource>) -> SampleChannel {
        let channel = self.buffer.add_channel();
        self.sources.push(source);
        channel
    }

    /// Runs the sampling loop until a message arrives on, or the sender drops, `shutdown`.
    #[cfg_attr(test, mutants::skip)] // Cannot easily check mutations as this is a threaded loop
    fn run(&mut self, period: Duration, shutdown: &Receiver<()>) {
        let ticker = crossbeam_channel::tick(period);
        loop {
            select! {
                recv(ticker) -> _ => {
                    self.tick();
                },
                recv(shutdown) -> _ => break,
            }
        }
    }

    /// Moves the sampler onto a background thread that ticks it at the given rate.
    ///
    /// ## Parameters
    ///
    /// * 'frequency_hz' - The number of ticks per second.
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when the frequency is not a positive number or
    ///   is too low for its period to be represented.
    /// * [Error::FailedToStartOdometrySampler] - Returned when the thread could not be created.
    pub fn start(self, frequency_hz: f64) -> Result<OdometrySamplerHandle, Error> {
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(Error::InvalidConfiguration {
                field: "odometry_frequency_hz".to_string(),
                reason: format!("expected a positive frequency, got {}", frequency_hz),
            });
        }

        let period = Duration::try_from_secs_f64(1.0 / frequency_hz).map_err(|err| {
            Error::InvalidConfiguration {
                field: "odometry_frequency_hz".to_string(),
                reason: format!("the sampling period of {} Hz is {}", frequency_hz, err),
            }
        })?;
        let buffer = self.buffer.clone();
        let channel_count = self.channel_count();
        let (shutdown_sender, shutdown_receiver) = crossbeam_channel::bounded(1);

        let mut sampler = self;
        let background_runner = thread::Builder::new()
            .name("odometry-sampler".to_string())
            .spawn(move || {
                sampler.run(period, &shutdown_receiver);
                sampler
            })
            .map_err(|err| Error::FailedToStartOdometrySampler {
                reason: err.to_string(),
            })?;

        debug!(
            "Started the odometry sampler at {} Hz with {} channels",
            frequency_hz, channel_count
        );

        Ok(OdometrySamplerHandle {
            shutdown: Some(shutdown_sender),
            background_runner: Some(background_runner),
            buffer,
        })
    }

    /// Samples all channels once.
    ///
    /// The capture timestamp is taken once and shared by all channels. The signals are read
    /// without holding the buffer lock. If any signal fails to read the whole tick is skipped
    /// so that the channels stay in step with each other.
    pub fn tick(&mut self) -> TickOutcome {
        if self.sources.is_empty() {
            return TickOutcome::Idle;
        }

        let timestamp = self.clock.now_seconds();
        self.positions.clear();
        for (index, source) in self.sources.iter_mut().enumerate() {
            match source.read_position() {
                Some(position) => self.positions.push(position),
                None => {
                    trace!(
                        "Skipping odometry tick at {:.4}s, channel {} failed to read",
                        timestamp,
                        index
                    );
                    self.buffer.record_skipped_tick();
                    return TickOutcome::Skipped;
                }
            }
        }

        self.buffer.push_tick(timestamp, &self.positions);
        TickOutcome::Recorded
    }
}

/// Controls an [OdometrySampler] running on a background thread.
///
/// Dropping the handle stops the thread and waits for it to finish.
pub struct OdometrySamplerHandle {
    /// Signals the background thread to stop.
    shutdown: Option<Sender<()>>,

    /// The thread handle for the background sampling thread.
    background_runner: Option<JoinHandle<OdometrySampler>>,

    /// The buffer that receives the samples.
    buffer: SampleBuffer,
}

impl OdometrySamplerHandle {
    /// Returns a handle to the buffer that receives the samples.
    pub fn buffer(&self) -> SampleBuffer {
        self.buffer.clone()
    }

    /// Returns a value indicating whether the background thread is still running.
    pub fn is_running(&self) -> bool {
        self.background_runner
            .as_ref()
            .map(|runner| !runner.is_finished())
            .unwrap_or(false)
    }

    fn shutdown_and_join(&mut self) -> Option<OdometrySampler> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        let sampler = self
            .background_runner
            .take()
            .and_then(|runner| runner.join().ok());

        if sampler.is_some() {
            debug!("Stopped the odometry sampler");
        }

        sampler
    }

    /// Stops the background thread and returns the sampler so that it can be restarted.
    ///
    /// Returns `None` if the background thread panicked.
    pub fn stop(mut self) -> Option<OdometrySampler> {
        self.shutdown_and_join()
    }
}

impl Drop for OdometrySamplerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_and_join();
    }
}
