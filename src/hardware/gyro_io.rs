/// The values read from the orientation sensor in a single control cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GyroInputs {
    /// Indicates whether the sensor is connected and reporting valid data.
    pub connected: bool,

    /// The yaw of the vehicle in radians, counter-clockwise positive.
    pub yaw: f64,

    /// The yaw rate in radians per second.
    pub yaw_velocity_rad_per_sec: f64,
}

/// Defines the interface for the orientation sensor of the vehicle.
pub trait GyroIo: Send {
    /// Updates `inputs` with the latest values from the sensor.
    fn update_inputs(&mut self, inputs: &mut GyroInputs);

    /// Resets the yaw reported by the sensor to zero.
    fn zero(&mut self);
}
