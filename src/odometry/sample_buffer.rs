//! The queues shared between the odometry sampler and the control loop.
//!
//! The sampler appends one sample per channel per tick and the control loop drains all channels
//! once per cycle. The lock that guards the queues is only held to append a tick or to drain the
//! queues, never while reading hardware or running the pose fusion.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use log::warn;

use crate::kinematics::module_state::ModulePosition;

#[cfg(test)]
#[path = "sample_buffer_tests.rs"]
mod sample_buffer_tests;

/// A module position together with the time at which it was captured.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimestampedPosition {
    /// The capture time in seconds.
    pub timestamp: f64,

    /// The captured module position.
    pub position: ModulePosition,
}

/// Identifies a single channel in a [SampleBuffer].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SampleChannel {
    index: usize,
}

impl SampleChannel {
    /// Returns the index of the channel in the order in which the channels were added.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// The samples taken out of a [SampleBuffer] by a single drain, per channel, oldest first.
#[derive(Debug, Default)]
pub struct DrainedSamples {
    channels: Vec<Vec<TimestampedPosition>>,
}

impl DrainedSamples {
    /// Returns a value indicating whether none of the channels had any samples.
    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(|samples| samples.is_empty())
    }

    /// Takes the samples of a channel. Taking a channel a second time, or taking a channel that
    /// does not exist, returns an empty collection.
    pub fn take(&mut self, channel: SampleChannel) -> Vec<TimestampedPosition> {
        self.channels
            .get_mut(channel.index)
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

struct SampleBufferState {
    channels: Vec<VecDeque<TimestampedPosition>>,
    capacity: usize,
    dropped_samples: u64,
    skipped_ticks: u64,
}

/// Bounded, ordered queues of module positions, one per channel.
///
/// Cloning the buffer creates a new handle to the same queues.
#[derive(Clone)]
pub struct SampleBuffer {
    state: Arc<Mutex<SampleBufferState>>,
}

impl SampleBuffer {
    /// Adds a new, empty, channel.
    pub fn add_channel(&self) -> SampleChannel {
        let mut state = self.lock();
        let capacity = state.capacity;
        state.channels.push(VecDeque::with_capacity(capacity));
        SampleChannel {
            index: state.channels.len() - 1,
        }
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> usize {
        self.lock().channels.len()
    }

    /// Returns the number of samples that were evicted because a queue was full.
    pub fn dropped_samples(&self) -> u64 {
        self.lock().dropped_samples
    }

    /// Removes and returns all samples of all channels, oldest first.
    pub fn drain_all(&self) -> DrainedSamples {
        let mut state = self.lock();
        DrainedSamples {
            channels: state
                .channels
                .iter_mut()
                .map(|queue| queue.drain(..).collect())
                .collect(),
        }
    }

    /// Removes and returns all samples of a single channel, oldest first.
    ///
    /// Returns an empty collection if the channel does not exist.
    pub fn drain_channel(&self, channel: SampleChannel) -> Vec<TimestampedPosition> {
        let mut state = self.lock();
        state
            .channels
            .get_mut(channel.index)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, SampleBufferState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Creates a new [SampleBuffer] without any channels.
    ///
    /// ## Parameters
    ///
    /// * 'capacity' - The maximum number of samples kept per channel. A capacity of zero is
    ///   treated as a capacity of one.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SampleBufferState {
                channels: Vec::new(),
                capacity: capacity.max(1),
                dropped_samples: 0,
                skipped_ticks: 0,
            })),
        }
    }

    /// Appends the positions captured in a single tick, one per channel, in channel order.
    ///
    /// All channels are updated while holding the lock so the control loop never sees a tick
    /// that is only partially stored. If a queue is full its oldest sample is evicted and
    /// counted as dropped.
    ///
    /// ## Parameters
    ///
    /// * 'timestamp' - The capture time shared by all positions
    /// * 'positions' - The positions in channel order
    pub fn push_tick(&self, timestamp: f64, positions: &[ModulePosition]) {
        let mut dropped = 0;
        {
            let mut state = self.lock();
            let capacity = state.capacity;
            for (queue, position) in state.channels.iter_mut().zip(positions.iter()) {
                if queue.len() >= capacity {
                    queue.pop_front();
                    dropped += 1;
                }

                queue.push_back(TimestampedPosition {
                    timestamp,
                    position: *position,
                });
            }

            state.dropped_samples += dropped;
        }

        if dropped > 0 {
            warn!(
                "Odometry sample queue is full, dropped {} samples at {:.4}s",
                dropped, timestamp
            );
        }
    }

    /// Records that a tick was skipped because not all channels could be read.
    pub fn record_skipped_tick(&self) {
        self.lock().skipped_ticks += 1;
    }

    /// Returns the number of ticks that were skipped.
    pub fn skipped_ticks(&self) -> u64 {
        self.lock().skipped_ticks
    }
}
