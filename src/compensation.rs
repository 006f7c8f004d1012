//! Calibration coefficients and the fixed-point compensation of the
//! data-sheet (BST-BMP180-DS000, section 3.5).
//!
//! Everything in here is pure arithmetic. Signed intermediates use `i32`
//! and the data-sheet's `unsigned long` values use `u32`, so shifts and
//! truncating divisions behave exactly like the vendor's C reference.

use cast::{i32, u16, u32};
use generic_array::typenum::consts::U22;
use generic_array::GenericArray;

use crate::bus::{Register, RegisterBus};
use crate::Error;

/// Temperature in deci Celsius (dC)
pub type DeciCelsius = i32;

/// Pressure in Pascal (Pa)
pub type Pascal = i32;

/// Altitude in meters (m)
pub type Meters = f32;

/// Duration in microseconds (µs)
pub type Microseconds = u16;

/// Pressure at sea level, 15 ℃
const STANDARD_PRESSURE: f32 = 101_325.0;

/// Max. conversion times per oversampling setting, data-sheet table 3
const CONVERSION_TIME: [Microseconds; 4] = [4500, 7500, 13500, 25500];

/// Threshold above which `B7 * 2` would overflow an unsigned 32 bit value
const OVERFLOW_BIT: u32 = 0x8000_0000;

/// Oversampling modes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oversampling {
    /// Number of samples 1, conversion time max 4.5ms, average current 3µA
    UltraLowPower = 0,
    /// Number of samples 2, conversion time max 7.5ms, average current 5µA
    Standard = 1,
    /// Number of samples 4, conversion time max 13.5ms, average current 7µA
    HighResolution = 2,
    /// Number of samples 8, conversion time max 25.5ms, average current 12µA
    UltraHighResolution = 3,
}

impl Oversampling {
    /// The oversampling setting (oss) as used in the data-sheet formulas.
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Time to wait between starting a pressure conversion and reading
    /// the result.
    pub fn conversion_time(&self) -> Microseconds {
        CONVERSION_TIME[self.value() as usize]
    }
}

impl Default for Oversampling {
    fn default() -> Self {
        Oversampling::UltraLowPower
    }
}

/// Convert a numeric oversampling setting.
///
/// Settings outside of `0..=3` are not rejected, they fall back to
/// [`Oversampling::UltraLowPower`].
impl From<i32> for Oversampling {
    fn from(oss: i32) -> Self {
        match oss {
            0 => Oversampling::UltraLowPower,
            1 => Oversampling::Standard,
            2 => Oversampling::HighResolution,
            3 => Oversampling::UltraHighResolution,
            _ => {
                debug!("oversampling setting {} out of range, using 0", oss);
                Oversampling::UltraLowPower
            }
        }
    }
}

/// Conversion time for a numeric oversampling setting. Settings outside
/// of `0..=3` get the time of setting 0.
pub fn conversion_time(oss: i32) -> Microseconds {
    Oversampling::from(oss).conversion_time()
}

/// Calibration coefficients from BMP180 eeprom. These are used to
/// calculate the temperature and the pressure. They are
/// calibrated by the manufacturer, individually for each silicon.
///
/// A value of this type is always complete: it is either built from the
/// whole 22 byte eeprom block or spelled out field by field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub struct Coefficients {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl Coefficients {
    /// Read the calibration block (0xAA..=0xBF) byte by byte.
    pub fn load<B: RegisterBus>(bus: &mut B) -> Result<Self, Error<B::Error>> {
        let block: GenericArray<u8, U22> = bus.read_block(Register::COEFF_AC1.addr())?;
        let mut bytes = [0u8; 22];
        bytes.copy_from_slice(&block);
        Self::from_bytes(&bytes)
    }

    /// Parse a calibration block, most significant byte first.
    ///
    /// Words of `0x0000` or `0xFFFF` mean the block did not come from a
    /// working sensor and yield [`Error::InvalidCalibration`].
    pub fn from_bytes<E>(bytes: &[u8; 22]) -> Result<Self, Error<E>> {
        let mut words = [0u16; 11];
        for (word, pair) in words.iter_mut().zip(bytes.chunks(2)) {
            *word = (u16(pair[0]) << 8) | u16(pair[1]);
            if *word == 0x0000 || *word == 0xFFFF {
                warn!("invalid calibration word {}", *word);
                return Err(Error::InvalidCalibration);
            }
        }

        Ok(Coefficients {
            ac1: words[0] as i16,
            ac2: words[1] as i16,
            ac3: words[2] as i16,
            ac4: words[3],
            ac5: words[4],
            ac6: words[5],
            b1: words[6] as i16,
            b2: words[7] as i16,
            mb: words[8] as i16,
            mc: words[9] as i16,
            md: words[10] as i16,
        })
    }
}

/// Uncompensated values of one measurement cycle
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    /// Uncompensated temperature (16 bit)
    pub ut: u16,
    /// Uncompensated pressure (16 to 19 bit, depending on oversampling)
    pub up: u32,
}

/// Result of the BMP180 sensor read-out
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompensatedReading {
    /// Temperature in deci Celsius, e.g. 241 for 24.1 ℃
    pub temperature: DeciCelsius,
    /// Pressure in Pascal relative to the location of the sensor.
    /// Note that meteorological pressures are given relative to
    /// normal null sea level in order to be location independent. The
    /// function `pressure_to_normal_null` can be used to convert the
    /// location pressure to normal null.
    pub pressure: Pascal,
    /// Altitude derived from `pressure`, assuming standard pressure at
    /// sea level.
    pub altitude: Meters,
}

impl CompensatedReading {
    /// Temperature in ℃
    pub fn temperature_celsius(&self) -> f32 {
        self.temperature as f32 / 10.0
    }
}

/// Turn a raw sample into temperature, pressure and altitude.
///
/// Never fails and never panics. Products and sums wrap at 32 bit like
/// the data-sheet's C reference, so a garbled sample yields a garbled
/// reading. A zero divisor (`X1 + MD` for the temperature, `B4` for the
/// pressure) makes that quotient 0.
pub fn compensate(raw: RawSample, coeff: &Coefficients, oss: Oversampling) -> CompensatedReading {
    let (temperature, b5) = calculate_temperature(i32(raw.ut), coeff);
    let pressure = calculate_true_pressure(raw.up, b5, oss, coeff);

    CompensatedReading {
        temperature,
        pressure,
        altitude: altitude(pressure),
    }
}

/// Altitude for a pressure, relative to standard pressure at sea level
/// (101325 Pa).
pub fn altitude(pressure: Pascal) -> Meters {
    44330.0 * (1.0 - libm::powf(pressure as f32 / STANDARD_PRESSURE, 1.0 / 5.255))
}

/// Convert pressure from sensor to pressure in hecto Pascal (hPa)
/// relative to normal null.
///
/// # Arguments
///
/// * `p` - Pressure in Pascal
/// * `altitude` - Altitude in Meters
///
pub fn pressure_to_normal_null(p: Pascal, altitude: u16) -> u16 {
    let z = (p as f32) / libm::powf(1f32 - (f32::from(altitude) / 44330f32), 5.255f32);
    libm::roundf(z / 100f32) as u16
}

// Temperature calculation according data-sheet, also returns B5
fn calculate_temperature(ut: i32, coeff: &Coefficients) -> (DeciCelsius, i32) {
    let x1: i32 = ut.wrapping_sub(i32(coeff.ac6)).wrapping_mul(i32(coeff.ac5)) >> 15;
    let x2: i32 = (i32(coeff.mc) << 11)
        .checked_div(x1.wrapping_add(i32(coeff.md)))
        .unwrap_or(0);
    let b5: i32 = x1.wrapping_add(x2); // Value b5 is used in pressure calculation
    let t: DeciCelsius = b5.wrapping_add(8) >> 4;
    (t, b5)
}

// Pressure calculation according data-sheet
fn calculate_true_pressure(up: u32, b5: i32, oss: Oversampling, coeff: &Coefficients) -> Pascal {
    let oss = oss.value();
    let b6: i32 = b5.wrapping_sub(4000);
    let b6_squared: i32 = b6.wrapping_mul(b6) >> 12;

    // B3
    let x1: i32 = i32(coeff.b2).wrapping_mul(b6_squared) >> 11;
    let x2: i32 = i32(coeff.ac2).wrapping_mul(b6) >> 11;
    let x3: i32 = x1.wrapping_add(x2);
    let b3: i32 = ((i32(coeff.ac1) * 4).wrapping_add(x3) << oss).wrapping_add(2) >> 2;

    // B4
    let x1: i32 = i32(coeff.ac3).wrapping_mul(b6) >> 13;
    let x2: i32 = i32(coeff.b1).wrapping_mul(b6_squared) >> 16;
    let x3: i32 = x1.wrapping_add(x2).wrapping_add(2) >> 2;
    let b4: u32 = u32(coeff.ac4).wrapping_mul(x3.wrapping_add(32768) as u32) >> 15;

    // B7
    let b7: u32 = up.wrapping_sub(b3 as u32).wrapping_mul(50000u32 >> oss);

    finish_pressure(divide_b7(b7, b4))
}

// Both paths compute 2 * B7 / B4, the second one without overflowing
fn divide_b7(b7: u32, b4: u32) -> i32 {
    let p = if b7 < OVERFLOW_BIT {
        (b7 * 2).checked_div(b4)
    } else {
        b7.checked_div(b4).map(|q| q.wrapping_mul(2))
    };
    p.unwrap_or(0) as i32
}

fn finish_pressure(p: i32) -> Pascal {
    let x1: i32 = (p >> 8).wrapping_mul(p >> 8);
    let x1: i32 = x1.wrapping_mul(3038) >> 16;
    let x2: i32 = p.wrapping_mul(-7357) >> 16;
    p.wrapping_add(x1.wrapping_add(x2).wrapping_add(3791) >> 4)
}
