use aht20_driver::{AHT20, SENSOR_ADDRESS};
use embedded_hal::{
    delay::DelayNs,
    i2c::{Error as _, ErrorKind, I2c},
};
use log::info;
use thiserror::Error;

use crate::types::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("i2c bus error: {0:?}")]
    Bus(ErrorKind),
    #[error("sensor reports it is not calibrated")]
    NotCalibrated,
    #[error("sensor stayed busy")]
    Busy,
    #[error("measurement failed its CRC check")]
    Checksum,
}

impl<E: embedded_hal::i2c::Error> From<aht20_driver::Error<E>> for SensorError {
    fn from(err: aht20_driver::Error<E>) -> Self {
        match err {
            aht20_driver::Error::I2c(bus) => SensorError::Bus(bus.kind()),
            aht20_driver::Error::InvalidCrc => SensorError::Checksum,
            aht20_driver::Error::UnexpectedBusy => SensorError::Busy,
        }
    }
}

/// Temperature/humidity sensor polled by the monitor loop.
pub trait ClimateSensor {
    /// Bus-level handshake. Failure means the sensor is absent or miswired.
    fn initialize(&mut self) -> Result<(), SensorError>;

    fn read_event(&mut self) -> Result<Reading, SensorError>;
}

/// AHT20 on any `embedded-hal` I2C bus, driven by `aht20-driver`.
pub struct Aht20<I2C: I2c, D> {
    device: AHT20<I2C>,
    delay: D,
}

impl<I2C, D> Aht20<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            device: AHT20::new(i2c, SENSOR_ADDRESS),
            delay,
        }
    }
}

impl<I2C, D> ClimateSensor for Aht20<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    fn initialize(&mut self) -> Result<(), SensorError> {
        self.device.init(&mut self.delay)?;
        info!("AHT20 handshake ok at {SENSOR_ADDRESS:#04x}");
        Ok(())
    }

    fn read_event(&mut self) -> Result<Reading, SensorError> {
        // init only re-sends calibration when the status byte lacks it.
        let mut sensor = self.device.init(&mut self.delay)?;
        let measurement = sensor.measure(&mut self.delay)?;
        Ok(Reading::new(measurement.temperature, measurement.humidity))
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::i2c::{ErrorType, NoAcknowledgeSource, Operation};

    use super::*;
    use crate::retry::testing::RecordingDelay;

    /// Bus with nothing attached: every transaction is NACKed.
    struct EmptyBus;

    impl ErrorType for EmptyBus {
        type Error = ErrorKind;
    }

    impl I2c for EmptyBus {
        fn transaction(
            &mut self,
            _address: u8,
            _operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
        }
    }

    const NACK: SensorError =
        SensorError::Bus(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));

    #[test]
    fn initialize_fails_when_sensor_absent() {
        let mut sensor = Aht20::new(EmptyBus, RecordingDelay::default());

        assert_eq!(sensor.initialize(), Err(NACK));
    }

    #[test]
    fn read_on_empty_bus_reports_bus_error() {
        let mut sensor = Aht20::new(EmptyBus, RecordingDelay::default());

        assert_eq!(sensor.read_event(), Err(NACK));
    }

    #[test]
    fn driver_errors_map_to_sensor_errors() {
        let crc = aht20_driver::Error::<ErrorKind>::InvalidCrc;
        let busy = aht20_driver::Error::<ErrorKind>::UnexpectedBusy;
        let bus = aht20_driver::Error::I2c(ErrorKind::ArbitrationLoss);

        assert_eq!(SensorError::from(crc), SensorError::Checksum);
        assert_eq!(SensorError::from(busy), SensorError::Busy);
        assert_eq!(
            SensorError::from(bus),
            SensorError::Bus(ErrorKind::ArbitrationLoss)
        );
    }
}
