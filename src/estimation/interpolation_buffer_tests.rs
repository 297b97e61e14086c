use super::*;
use float_cmp::approx_eq;

#[test]
fn when_sampling_an_empty_buffer_it_should_return_nothing() {
    let buffer: InterpolationBuffer<f64> = InterpolationBuffer::new(1.0);

    assert_eq!(buffer.sample(0.0), None);
    assert!(buffer.is_empty());
}

#[test]
fn when_sampling_between_values_it_should_interpolate() {
    let mut buffer = InterpolationBuffer::new(10.0);
    buffer.add_sample(1.0, 10.0);
    buffer.add_sample(2.0, 20.0);

    let value = buffer.sample(1.25).unwrap();

    assert!(approx_eq!(f64, value, 12.5, epsilon = 1e-12));
    assert_eq!(buffer.sample(2.0), Some(20.0));
}

#[test]
fn when_sampling_outside_of_the_history_it_should_clamp() {
    let mut buffer = InterpolationBuffer::new(10.0);
    buffer.add_sample(1.0, 10.0);
    buffer.add_sample(2.0, 20.0);

    assert_eq!(buffer.sample(0.0), Some(10.0));
    assert_eq!(buffer.sample(5.0), Some(20.0));
}

#[test]
fn when_adding_out_of_order_it_should_keep_the_values_sorted() {
    let mut buffer = InterpolationBuffer::new(10.0);
    buffer.add_sample(3.0, 30.0);
    buffer.add_sample(1.0, 10.0);
    buffer.add_sample(2.0, 20.0);

    let entries = buffer.entries_after(0.0);
    let timestamps: Vec<f64> = entries.iter().map(|(time, _)| *time).collect();

    assert_eq!(timestamps, vec![1.0, 2.0, 3.0]);
    assert_eq!(buffer.oldest_timestamp(), Some(1.0));
    assert_eq!(buffer.newest_timestamp(), Some(3.0));
}

#[test]
fn when_adding_an_existing_timestamp_it_should_replace_the_value() {
    let mut buffer = InterpolationBuffer::new(10.0);
    buffer.add_sample(1.0, 10.0);
    buffer.add_sample(1.0, 15.0);

    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.sample(1.0), Some(15.0));
}

#[test]
fn when_values_fall_outside_of_the_history_it_should_discard_them() {
    let mut buffer = InterpolationBuffer::new(1.5);
    for step in 0..10 {
        buffer.add_sample(step as f64 * 0.5, step as f64);
    }

    assert_eq!(buffer.newest_timestamp(), Some(4.5));
    assert_eq!(buffer.oldest_timestamp(), Some(3.0));
    assert_eq!(buffer.len(), 4);
}

#[test]
fn when_requesting_entries_after_a_time_it_should_exclude_that_time() {
    let mut buffer = InterpolationBuffer::new(10.0);
    buffer.add_sample(1.0, 10.0);
    buffer.add_sample(2.0, 20.0);
    buffer.add_sample(3.0, 30.0);

    let entries = buffer.entries_after(2.0);

    assert_eq!(entries, vec![(3.0, 30.0)]);

    buffer.clear();
    assert!(buffer.entries_after(0.0).is_empty());
}

#[test]
fn when_sampling_with_a_custom_function_it_should_use_it() {
    let mut buffer = InterpolationBuffer::new(10.0);
    buffer.add_sample(0.0, 0.0);
    buffer.add_sample(1.0, 10.0);

    let value = buffer.sample_with(0.5, |start, _, _| *start).unwrap();

    assert_eq!(value, 0.0);
}
