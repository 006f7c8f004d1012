//! Print temperature, pressure and altitude of a BMP180 on the I²C bus of
//! a Raspberry Pi every two seconds.
//!
//! Usage: `raspberrypi [oversampling]`, with oversampling 0 to 3.
//! Set `RUST_LOG=debug` to see the calibration coefficients.

use std::env;
use std::process;
use std::thread;
use std::time::Duration;

use bmp180_driver::{pressure_to_normal_null, Bmp180, Error, Oversampling, CHIP_ID};
use linux_embedded_hal::{Delay, I2cdev};

const I2C_DEVICE: &str = "/dev/i2c-1";

fn main() {
    env_logger::init();

    let oss = env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<i32>().ok())
        .map(Oversampling::from)
        .unwrap_or_default();

    let i2c = match I2cdev::new(I2C_DEVICE) {
        Ok(i2c) => i2c,
        Err(e) => {
            log::error!("cannot open {}: {}", I2C_DEVICE, e);
            process::exit(1);
        }
    };

    let mut bmp180 = match Bmp180::new(i2c, Delay, oss) {
        Ok(bmp180) => bmp180,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    match bmp180.chip_id() {
        Ok(CHIP_ID) => {}
        Ok(id) => log::warn!("unexpected chip id {:#04x}", id),
        Err(e) => log::warn!("{}", e),
    }

    loop {
        match bmp180.read() {
            Ok(reading) => println!(
                "Temperature: {:.1} ℃  Pressure: {} Pa ({} hPa at sea level, 500 m)  Altitude: {:.2} m",
                reading.temperature_celsius(),
                reading.pressure,
                pressure_to_normal_null(reading.pressure, 500),
                reading.altitude,
            ),
            // A loose wire should not end the program, try again later
            Err(e @ Error::Transport(_)) => log::warn!("{}", e),
            Err(e) => log::error!("{}", e),
        }
        thread::sleep(Duration::from_secs(2));
    }
}
