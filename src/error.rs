use core::fmt;

/// All possible errors of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The underlying bus failed (NAK, timeout, device not present).
    /// The sensor should be treated as unavailable until a later
    /// attempt succeeds.
    Transport(E),
    /// A calibration word read as `0x0000` or `0xFFFF`, which no
    /// working sensor produces.
    InvalidCalibration,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Transport(e)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "sensor unavailable, bus error: {:?}", e),
            Error::InvalidCalibration => f.write_str("invalid calibration data in sensor eeprom"),
        }
    }
}
