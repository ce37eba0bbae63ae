//! Optional digital level sensor (door contact, gate position).

use embedded_hal::digital::InputPin;
use log::warn;

use crate::app::ports::SensorPort;

/// Reads a configured input pin.
pub struct LevelSensor<P: InputPin> {
    pin: P,
}

impl<P: InputPin> LevelSensor<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: InputPin> SensorPort for LevelSensor<P> {
    fn read_level(&mut self) -> Option<bool> {
        match self.pin.is_high() {
            Ok(level) => Some(level),
            Err(_) => {
                warn!("Sensor: read failed");
                None
            }
        }
    }
}

/// Stand-in when no sensor pin is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSensor;

impl SensorPort for NoSensor {
    fn read_level(&mut self) -> Option<bool> {
        None
    }
}
