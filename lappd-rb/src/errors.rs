//! Everything which can go wrong while talking
//! to the board

use std::error::Error;
use std::fmt;

use lappd_dataclasses::errors::{
  CalibrationError,
  ParameterError,
  SettingsError,
};

use crate::port::RegisterError;

#[derive(Debug, Clone, PartialEq)]
pub enum LappdError {
  Register(RegisterError),
  InvalidParameter(ParameterError),
  Calibration(CalibrationError),
  /// The DRS PLL did not lock after configuration.
  /// Bring-up reports this, but carries on
  HardwareNotReady { pll_status : u32 },
  Settings(SettingsError),
}

impl fmt::Display for LappdError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = match self {
      LappdError::Register(err)         => err.to_string(),
      LappdError::InvalidParameter(err) => err.to_string(),
      LappdError::Calibration(err)      => err.to_string(),
      LappdError::HardwareNotReady { pll_status }
        => format!("HardwareNotReady DRS PLL not locked, status {pll_status:#04x}"),
      LappdError::Settings(err)         => err.to_string(),
    };
    write!(f, "<LappdError: {}>", repr)
  }
}

impl Error for LappdError {
}

impl From<RegisterError> for LappdError {
  fn from(err : RegisterError) -> Self {
    LappdError::Register(err)
  }
}

impl From<ParameterError> for LappdError {
  fn from(err : ParameterError) -> Self {
    LappdError::InvalidParameter(err)
  }
}

impl From<CalibrationError> for LappdError {
  fn from(err : CalibrationError) -> Self {
    LappdError::Calibration(err)
  }
}

impl From<SettingsError> for LappdError {
  fn from(err : SettingsError) -> Self {
    LappdError::Settings(err)
  }
}

#[test]
fn display_not_ready() {
  let err = LappdError::HardwareNotReady { pll_status : 0 };
  assert_eq!(err.to_string(), "<LappdError: HardwareNotReady DRS PLL not locked, status 0x00>");
}
