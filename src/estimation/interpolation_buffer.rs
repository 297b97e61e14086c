use std::collections::VecDeque;

#[cfg(test)]
#[path = "interpolation_buffer_tests.rs"]
mod interpolation_buffer_tests;

/// Defines values that can be interpolated between two samples.
pub trait Interpolate: Clone {
    /// Returns the value at the fraction `t`, in [0, 1], between `self` and `end`.
    fn interpolate(&self, end: &Self, t: f64) -> Self;
}

impl Interpolate for f64 {
    fn interpolate(&self, end: &Self, t: f64) -> Self {
        self + (end - self) * t
    }
}

/// A history of timestamped values which can be sampled at any time within the history.
///
/// Values are kept ordered by timestamp. Values that are older than the history window, as
/// measured from the newest value, are discarded when new values are added.
#[derive(Clone, Debug)]
pub struct InterpolationBuffer<T> {
    /// The length of the history in seconds.
    history_seconds: f64,

    /// The samples, oldest first.
    samples: VecDeque<(f64, T)>,
}

impl<T: Clone> InterpolationBuffer<T> {
    /// Adds a value. A value with the same timestamp as an existing value replaces it.
    ///
    /// ## Parameters
    ///
    /// * 'timestamp' - The time of the value in seconds
    /// * 'value' - The value
    pub fn add_sample(&mut self, timestamp: f64, value: T) {
        let index = self
            .samples
            .partition_point(|(existing, _)| *existing < timestamp);

        let is_duplicate = self
            .samples
            .get(index)
            .map(|(existing, _)| *existing == timestamp)
            .unwrap_or(false);
        if is_duplicate {
            self.samples[index].1 = value;
        } else {
            self.samples.insert(index, (timestamp, value));
        }

        if let Some(newest) = self.newest_timestamp() {
            let cutoff = newest - self.history_seconds;
            while self
                .samples
                .front()
                .map(|(time, _)| *time < cutoff)
                .unwrap_or(false)
            {
                self.samples.pop_front();
            }
        }
    }

    /// Removes all values.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Returns the values with a timestamp strictly after `timestamp`, oldest first.
    pub fn entries_after(&self, timestamp: f64) -> Vec<(f64, T)> {
        let index = self
            .samples
            .partition_point(|(existing, _)| *existing <= timestamp);
        self.samples.range(index..).cloned().collect()
    }

    /// Returns a value indicating whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the number of values in the buffer.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Creates a new, empty, [InterpolationBuffer].
    ///
    /// ## Parameters
    ///
    /// * 'history_seconds' - The length of the history in seconds.
    pub fn new(history_seconds: f64) -> Self {
        Self {
            history_seconds,
            samples: VecDeque::new(),
        }
    }

    /// Returns the timestamp of the newest value.
    pub fn newest_timestamp(&self) -> Option<f64> {
        self.samples.back().map(|(time, _)| *time)
    }

    /// Returns the timestamp of the oldest value.
    pub fn oldest_timestamp(&self) -> Option<f64> {
        self.samples.front().map(|(time, _)| *time)
    }

    /// Returns the value at `timestamp`, using `interpolate` to blend the two values around it.
    ///
    /// Timestamps before the oldest value return the oldest value, timestamps after the newest
    /// value return the newest value. Returns `None` if the buffer is empty.
    ///
    /// ## Parameters
    ///
    /// * 'timestamp' - The time at which the buffer should be sampled
    /// * 'interpolate' - Blends two values given the fraction between them
    pub fn sample_with<F>(&self, timestamp: f64, interpolate: F) -> Option<T>
    where
        F: Fn(&T, &T, f64) -> T,
    {
        let (first_time, first) = self.samples.front()?;
        if timestamp <= *first_time {
            return Some(first.clone());
        }

        let (last_time, last) = self.samples.back()?;
        if timestamp >= *last_time {
            return Some(last.clone());
        }

        let upper = self
            .samples
            .partition_point(|(existing, _)| *existing < timestamp);
        let (upper_time, upper_value) = self.samples.get(upper)?;
        if *upper_time == timestamp {
            return Some(upper_value.clone());
        }

        let (lower_time, lower_value) = self.samples.get(upper.checked_sub(1)?)?;
        let t = (timestamp - lower_time) / (upper_time - lower_time);
        Some(interpolate(lower_value, upper_value, t))
    }
}

impl<T: Interpolate> InterpolationBuffer<T> {
    /// Returns the value at `timestamp`, interpolating between the two values around it.
    ///
    /// See [InterpolationBuffer::sample_with].
    pub fn sample(&self, timestamp: f64) -> Option<T> {
        self.sample_with(timestamp, |start, end, t| start.interpolate(end, t))
    }
}
