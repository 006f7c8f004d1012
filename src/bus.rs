//! Register level access to the sensor.

use generic_array::{ArrayLength, GenericArray};
use hal::blocking::i2c::{Write, WriteRead};

/// Default BMP180 module address.
// The LSB of the device address distinguishes between read (1) and
// write (0) operation, corresponding to address 0xEF (read) and 0xEE
// (write). Note: embedded-hal/blocking/i2c uses 7-bit addresses.
#[allow(clippy::unreadable_literal)]
pub const DEFAULT_ADDRESS: u8 = 0b1110111; // 7-bit I²C address, missing least significant r/w bit

/// BMP180 registers
#[allow(non_camel_case_types)]
#[derive(Copy, Clone)]
pub(crate) enum Register {
    /// First calibration register, the block ends at 0xBF
    COEFF_AC1 = 0xAA,
    CHIP_ID = 0xD0,
    SOFT_RESET = 0xE0,
    /// Control register
    CONTROL_REG = 0xF4,
    /// First value register, next is 0xF7, 0xF8
    VALUE_REG = 0xF6,
}

impl Register {
    pub fn addr(&self) -> u8 {
        *self as u8
    }
}

/// Byte wide access to the registers of a sensor.
///
/// The driver only ever reads and writes single bytes, so any transport
/// that can do that (I²C, a register file in a test, a bus shared with
/// other peripherals) can sit behind it.
pub trait RegisterBus {
    /// Error of the underlying transport
    type Error;

    /// Read the byte in register `reg`.
    fn read_byte(&mut self, reg: u8) -> Result<u8, Self::Error>;

    /// Write `value` to register `reg`.
    fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), Self::Error>;

    /// Read `N` consecutive registers starting at `reg`, one byte at a
    /// time, in ascending address order.
    fn read_block<N>(&mut self, reg: u8) -> Result<GenericArray<u8, N>, Self::Error>
    where
        N: ArrayLength<u8>,
    {
        let mut buffer: GenericArray<u8, N> = GenericArray::default();
        for (offset, byte) in buffer.iter_mut().enumerate() {
            *byte = self.read_byte(reg.wrapping_add(offset as u8))?;
        }
        Ok(buffer)
    }
}

/// [`RegisterBus`] over an `embedded-hal` blocking I²C peripheral
pub struct I2cBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cBus<I2C> {
    /// Use the sensor at the default address `0x77`.
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    /// Use the sensor at a 7-bit `address`.
    pub fn with_address(i2c: I2C, address: u8) -> Self {
        I2cBus { i2c, address }
    }

    /// Destroy the adapter and return the I²C peripheral.
    pub fn into_inner(self) -> I2C {
        self.i2c
    }
}

impl<I2C, E> RegisterBus for I2cBus<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    type Error = E;

    fn read_byte(&mut self, reg: u8) -> Result<u8, E> {
        let mut buffer = [0u8; 1];
        self.i2c.write_read(self.address, &[reg], &mut buffer)?;
        Ok(buffer[0])
    }

    fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), E> {
        self.i2c.write(self.address, &[reg, value])
    }
}
