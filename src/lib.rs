//! A platform agnostic driver to interface the BOSCH BMP180 sensor
//!
//! This driver was built using [`embedded-hal`] traits. It also works
//! with the register compatible BMP085.
//!
//! The calibration coefficients are read once when the driver is
//! created. Each [`Bmp180::read`] then runs one temperature and one
//! pressure conversion and compensates them with the fixed-point
//! formulas of the data-sheet. The compensation itself is available as
//! the pure function [`compensate`] for raw samples obtained elsewhere.
//!
//! ```no_run
//! use bmp180_driver::{Bmp180, Oversampling};
//! use linux_embedded_hal::{Delay, I2cdev};
//!
//! let i2c = I2cdev::new("/dev/i2c-1").unwrap();
//! let mut bmp180 = Bmp180::new(i2c, Delay, Oversampling::Standard).unwrap();
//! let reading = bmp180.read().unwrap();
//! println!("{} ℃, {} Pa", reading.temperature_celsius(), reading.pressure);
//! ```
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal/0.2

#![no_std]
#![deny(missing_docs)]
#![allow(clippy::trivially_copy_pass_by_ref, clippy::new_ret_no_self)]

#[cfg(test)]
#[macro_use]
extern crate std;

#[macro_use]
mod fmt;

mod bus;
mod compensation;
mod error;

use cast::{u16, u32};
use generic_array::typenum::consts::*;
use generic_array::GenericArray;
use hal::blocking::delay::DelayUs;
use hal::blocking::i2c::{Write, WriteRead};

use crate::bus::Register;

pub use crate::bus::{I2cBus, RegisterBus, DEFAULT_ADDRESS};
pub use crate::compensation::{
    altitude, compensate, conversion_time, pressure_to_normal_null, Coefficients,
    CompensatedReading, DeciCelsius, Meters, Microseconds, Oversampling, Pascal, RawSample,
};
pub use crate::error::Error;

/// Content of the chip id register of a BMP180 (and BMP085)
pub const CHIP_ID: u8 = 0x55;

/// Temperature conversion, max. conversion time 4.5ms
const CONTROL_VALUE_TEMPERATURE: u8 = 0x2E;

/// Pressure conversion, the oversampling setting goes into bits 6 and 7
const CONTROL_VALUE_PRESSURE: u8 = 0x34;

/// Value for the soft reset register, same sequence as power on reset
const SOFT_RESET_VALUE: u8 = 0xB6;

/// Start-up time after a reset
const STARTUP_TIME_US: u16 = 10_000;

/// BMP180 driver
pub struct Bmp180<BUS, TIMER: DelayUs<u16>> {
    bus: BUS,
    timer: TIMER,
    coeff: Coefficients,
    oss: Oversampling,
}

impl<I2C, TIMER, E> Bmp180<I2cBus<I2C>, TIMER>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
    TIMER: DelayUs<u16>,
{
    /// Create a new driver from a I2C peripheral with given oversampling
    /// settings. The sensor is expected at [`DEFAULT_ADDRESS`].
    pub fn new(i2c: I2C, timer: TIMER, oss: Oversampling) -> Result<Self, Error<E>> {
        Self::with_bus(I2cBus::new(i2c), timer, oss)
    }
}

impl<BUS, TIMER> Bmp180<BUS, TIMER>
where
    BUS: RegisterBus,
    TIMER: DelayUs<u16>,
{
    /// Create a new driver on any register bus. The calibration
    /// coefficients are read right away; if that fails no driver is
    /// created.
    pub fn with_bus(mut bus: BUS, timer: TIMER, oss: Oversampling) -> Result<Self, Error<BUS::Error>> {
        let coeff = Coefficients::load(&mut bus)?;
        debug!(
            "calibration loaded: ac1={} ac2={} ac3={} ac4={} ac5={} ac6={} b1={} b2={} mb={} mc={} md={}",
            coeff.ac1, coeff.ac2, coeff.ac3, coeff.ac4, coeff.ac5, coeff.ac6,
            coeff.b1, coeff.b2, coeff.mb, coeff.mc, coeff.md,
        );

        Ok(Bmp180 {
            bus,
            timer,
            coeff,
            oss,
        })
    }

    /// Calibration coefficients read from the sensor
    pub fn coefficients(&self) -> &Coefficients {
        &self.coeff
    }

    /// Current oversampling setting
    pub fn oversampling(&self) -> Oversampling {
        self.oss
    }

    /// Change the oversampling setting for the following reads.
    pub fn set_oversampling(&mut self, oss: Oversampling) {
        self.oss = oss;
    }

    /// Read the chip id register, [`CHIP_ID`] for a working sensor.
    pub fn chip_id(&mut self) -> Result<u8, Error<BUS::Error>> {
        Ok(self.bus.read_byte(Register::CHIP_ID.addr())?)
    }

    /// Soft reset the sensor and wait until it is up again. The
    /// calibration coefficients stay valid.
    pub fn reset(&mut self) -> Result<(), Error<BUS::Error>> {
        self.bus.write_byte(Register::SOFT_RESET.addr(), SOFT_RESET_VALUE)?;
        self.timer.delay_us(STARTUP_TIME_US);
        Ok(())
    }

    /// Run one temperature and one pressure conversion and return the
    /// uncompensated values.
    pub fn read_raw(&mut self) -> Result<RawSample, Error<BUS::Error>> {
        // Read temperature, wait 4.5ms before reading the value
        self.bus
            .write_byte(Register::CONTROL_REG.addr(), CONTROL_VALUE_TEMPERATURE)?;
        self.timer.delay_us(conversion_time(0));
        let ut: GenericArray<u8, U2> = self.bus.read_block(Register::VALUE_REG.addr())?;
        let ut = (u16(ut[0]) << 8) | u16(ut[1]);

        // Read pressure
        let oss = self.oss.value();
        self.bus.write_byte(
            Register::CONTROL_REG.addr(),
            CONTROL_VALUE_PRESSURE + (oss << 6),
        )?;
        self.timer.delay_us(self.oss.conversion_time());
        let up: GenericArray<u8, U3> = self.bus.read_block(Register::VALUE_REG.addr())?;
        let up = ((u32(up[0]) << 16) | (u32(up[1]) << 8) | u32(up[2])) >> (8 - oss);

        trace!("raw sample ut={} up={} oss={}", ut, up, oss);
        Ok(RawSample { ut, up })
    }

    /// Read temperature and pressure from sensor.
    pub fn read(&mut self) -> Result<CompensatedReading, Error<BUS::Error>> {
        let raw = self.read_raw()?;
        Ok(compensate(raw, &self.coeff, self.oss))
    }

    /// Destroy the driver and return the bus and the timer.
    pub fn release(self) -> (BUS, TIMER) {
        (self.bus, self.timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use embedded_hal_mock::MockError;
    use std::io::ErrorKind;
    use std::vec::Vec;

    const ADDR: u8 = DEFAULT_ADDRESS;

    // Calibration eeprom of the data-sheet example, starting at 0xAA
    const EEPROM: [u8; 22] = [
        0x01, 0x98, 0xFF, 0xB8, 0xC7, 0xD1, 0x7F, 0xE5, 0x7F, 0xF5, 0x5A, 0x71, 0x18, 0x2E, 0x00,
        0x04, 0x80, 0x00, 0xDD, 0xF9, 0x0B, 0x34,
    ];

    /// Records every requested delay
    #[derive(Default)]
    struct RecordingDelay {
        delays: Vec<u16>,
    }

    impl DelayUs<u16> for RecordingDelay {
        fn delay_us(&mut self, us: u16) {
            self.delays.push(us);
        }
    }

    /// Register file with access counters, optionally failing at a
    /// given access
    struct FakeBus {
        registers: [u8; 256],
        reads: usize,
        writes: Vec<(u8, u8)>,
        fail_at_read: Option<usize>,
    }

    impl FakeBus {
        fn new() -> Self {
            let mut registers = [0u8; 256];
            registers[0xAA..0xAA + 22].copy_from_slice(&EEPROM);
            registers[0xD0] = CHIP_ID;
            FakeBus {
                registers,
                reads: 0,
                writes: Vec::new(),
                fail_at_read: None,
            }
        }
    }

    impl RegisterBus for FakeBus {
        type Error = ();

        fn read_byte(&mut self, reg: u8) -> Result<u8, ()> {
            if self.fail_at_read == Some(self.reads) {
                return Err(());
            }
            self.reads += 1;
            Ok(self.registers[reg as usize])
        }

        fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), ()> {
            self.writes.push((reg, value));
            self.registers[reg as usize] = value;
            Ok(())
        }
    }

    fn calibration_transactions() -> Vec<I2cTransaction> {
        EEPROM
            .iter()
            .enumerate()
            .map(|(i, byte)| I2cTransaction::write_read(ADDR, vec![0xAA + i as u8], vec![*byte]))
            .collect()
    }

    #[test]
    fn calibration_load_reads_22_bytes() {
        let bmp180 = Bmp180::with_bus(FakeBus::new(), RecordingDelay::default(), Oversampling::Standard)
            .unwrap();

        assert_eq!(bmp180.coefficients().ac3, -14383);
        assert_eq!(bmp180.coefficients().md, 2868);

        let (bus, timer) = bmp180.release();
        assert_eq!(bus.reads, 22);
        assert!(bus.writes.is_empty());
        assert!(timer.delays.is_empty());
    }

    #[test]
    fn calibration_load_fails_on_any_byte() {
        for failing in 0..22 {
            let mut bus = FakeBus::new();
            bus.fail_at_read = Some(failing);
            let result = Bmp180::with_bus(bus, RecordingDelay::default(), Oversampling::Standard);
            assert!(matches!(result, Err(Error::Transport(()))), "read {}", failing);
        }
    }

    #[test]
    fn blank_eeprom_is_rejected() {
        let mut bus = FakeBus::new();
        bus.registers[0xAA..0xAA + 22].copy_from_slice(&[0xFF; 22]);
        let result = Bmp180::with_bus(bus, RecordingDelay::default(), Oversampling::Standard);
        assert!(matches!(result, Err(Error::InvalidCalibration)));
    }

    #[test]
    fn read_datasheet_example() {
        let mut expectations = calibration_transactions();
        expectations.extend(vec![
            I2cTransaction::write(ADDR, vec![0xF4, 0x2E]),
            I2cTransaction::write_read(ADDR, vec![0xF6], vec![0x6C]),
            I2cTransaction::write_read(ADDR, vec![0xF7], vec![0xFA]),
            I2cTransaction::write(ADDR, vec![0xF4, 0x34]),
            I2cTransaction::write_read(ADDR, vec![0xF6], vec![0x5D]),
            I2cTransaction::write_read(ADDR, vec![0xF7], vec![0x23]),
            I2cTransaction::write_read(ADDR, vec![0xF8], vec![0x00]),
        ]);
        let i2c = I2cMock::new(&expectations);

        let mut bmp180 =
            Bmp180::new(i2c, RecordingDelay::default(), Oversampling::UltraLowPower).unwrap();
        let reading = bmp180.read().unwrap();
        assert_eq!(reading.temperature, 150);
        assert_eq!(reading.pressure, 69964);

        let (bus, timer) = bmp180.release();
        assert_eq!(timer.delays, vec![4500, 4500]);
        bus.into_inner().done();
    }

    #[test]
    fn read_raw_ultra_high_resolution() {
        let mut bus = FakeBus::new();
        bus.registers[0xF6] = 0x5D;
        bus.registers[0xF7] = 0x23;
        bus.registers[0xF8] = 0xA0;
        let mut bmp180 =
            Bmp180::with_bus(bus, RecordingDelay::default(), Oversampling::UltraHighResolution)
                .unwrap();

        let raw = bmp180.read_raw().unwrap();
        assert_eq!(raw.up, 0x5D23A0 >> 5);

        let (bus, timer) = bmp180.release();
        assert_eq!(bus.writes, vec![(0xF4, 0x2E), (0xF4, 0xF4)]);
        assert_eq!(bus.reads, 22 + 2 + 3);
        assert_eq!(timer.delays, vec![4500, 25500]);
    }

    #[test]
    fn set_oversampling_changes_control_value() {
        let mut bmp180 =
            Bmp180::with_bus(FakeBus::new(), RecordingDelay::default(), Oversampling::Standard)
                .unwrap();
        bmp180.set_oversampling(Oversampling::HighResolution);
        assert_eq!(bmp180.oversampling(), Oversampling::HighResolution);
        bmp180.read_raw().unwrap();

        let (bus, timer) = bmp180.release();
        assert_eq!(bus.writes[1], (0xF4, 0xB4));
        assert_eq!(timer.delays, vec![4500, 13500]);
    }

    #[test]
    fn transport_error_during_read() {
        let mut expectations = calibration_transactions();
        expectations.extend(vec![
            I2cTransaction::write(ADDR, vec![0xF4, 0x2E]),
            I2cTransaction::write_read(ADDR, vec![0xF6], vec![0x6C])
                .with_error(MockError::Io(ErrorKind::Other)),
        ]);
        let i2c = I2cMock::new(&expectations);

        let mut bmp180 =
            Bmp180::new(i2c, RecordingDelay::default(), Oversampling::UltraLowPower).unwrap();
        assert!(matches!(bmp180.read(), Err(Error::Transport(_))));

        let (bus, _) = bmp180.release();
        bus.into_inner().done();
    }

    #[test]
    fn chip_id_and_reset() {
        let mut bmp180 =
            Bmp180::with_bus(FakeBus::new(), RecordingDelay::default(), Oversampling::Standard)
                .unwrap();
        assert_eq!(bmp180.chip_id().unwrap(), CHIP_ID);
        bmp180.reset().unwrap();

        let (bus, timer) = bmp180.release();
        assert_eq!(bus.writes, vec![(0xE0, 0xB6)]);
        assert_eq!(timer.delays, vec![10_000]);
    }
}
