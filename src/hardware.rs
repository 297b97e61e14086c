//! Hardware abstraction for the drivetrain.
//!
//! The drivetrain only talks to its motors and sensors through the [ModuleIo](module_io::ModuleIo)
//! and [GyroIo](gyro_io::GyroIo) traits. The implementation behind those traits is picked when
//! the drivetrain is assembled, based on the [HardwareBackend] from the configuration.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::MODULE_COUNT;

use self::gyro_io::GyroIo;
use self::module_io::ModuleIo;
use self::simulation::{
    DisabledGyroIo, DisabledModuleIo, SimGyroHandle, SimGyroIo, SimModuleHandle, SimModuleIo,
};

#[cfg(test)]
#[path = "hardware_tests.rs"]
mod hardware_tests;

/// Defines the interface for the orientation sensor
pub mod gyro_io;

/// Defines the interface for a single swerve module
pub mod module_io;

/// Provides the simulated and disabled hardware backends
pub mod simulation;

/// The hardware implementation used by the drivetrain.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareBackend {
    /// Simulated modules and gyro which can be driven from [SimulationHandles].
    #[default]
    Simulated,

    /// Hardware that is never connected and ignores all commands.
    Disabled,
}

/// The handles that control the simulated hardware.
pub struct SimulationHandles {
    /// The handle for the simulated gyro.
    pub gyro: SimGyroHandle,

    /// The handles for the simulated modules, in module order.
    pub modules: [SimModuleHandle; MODULE_COUNT],
}

/// The hardware created for a [HardwareBackend].
pub struct Backend {
    /// The orientation sensor.
    pub gyro: Box<dyn GyroIo>,

    /// The module hardware, in module order.
    pub modules: [Box<dyn ModuleIo>; MODULE_COUNT],

    /// The handles for the simulated hardware, if the backend is simulated.
    pub simulation: Option<SimulationHandles>,
}

/// Creates the hardware for the given backend.
///
/// ## Parameters
///
/// * 'kind' - The backend that should be created.
pub fn create_backend(kind: HardwareBackend) -> Backend {
    debug!("Creating the {:?} hardware backend", kind);

    match kind {
        HardwareBackend::Simulated => {
            let (gyro, gyro_handle) = SimGyroIo::new();
            let [(fl, fl_handle), (fr, fr_handle), (bl, bl_handle), (br, br_handle)] =
                [(); MODULE_COUNT].map(|_| SimModuleIo::new());

            Backend {
                gyro: Box::new(gyro),
                modules: [Box::new(fl), Box::new(fr), Box::new(bl), Box::new(br)],
                simulation: Some(SimulationHandles {
                    gyro: gyro_handle,
                    modules: [fl_handle, fr_handle, bl_handle, br_handle],
                }),
            }
        }
        HardwareBackend::Disabled => Backend {
            gyro: Box::new(DisabledGyroIo),
            modules: [(); MODULE_COUNT].map(|_| Box::new(DisabledModuleIo) as Box<dyn ModuleIo>),
            simulation: None,
        },
    }
}
