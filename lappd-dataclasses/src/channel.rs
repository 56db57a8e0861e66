//! Identifiers for ADC chips, channels and delay taps
//!
//! Everything which ends up in a register address
//! is resolved into one of these types at the
//! boundary, so that an out-of-range value can never
//! reach the hardware.

use std::fmt;

use crate::constants::{
  MAX_DELAY_TAP,
  NCHN,
  N_LANES_PER_CHIP,
  N_CHN_PER_DRS_GROUP,
};
use crate::errors::ParameterError;

/// Number of sub-channels which are calibrated per ADC chip.
/// Each sub-channel occupies a pair of lanes.
pub const N_SUB_CHANNELS : usize = N_LANES_PER_CHIP / 2;

/// One of the two ADC chips of the front end
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
pub enum AdcChip {
  Adc1,
  Adc2,
}

impl AdcChip {
  pub const ALL : [AdcChip;2] = [AdcChip::Adc1, AdcChip::Adc2];

  /// Position of the chip (0 or 1), as used in
  /// register address calculations
  pub fn index(&self) -> u32 {
    match self {
      AdcChip::Adc1 => 0,
      AdcChip::Adc2 => 1,
    }
  }
}

impl TryFrom<u8> for AdcChip {
  type Error = ParameterError;

  fn try_from(value : u8) -> Result<Self, Self::Error> {
    match value {
      0 => Ok(AdcChip::Adc1),
      1 => Ok(AdcChip::Adc2),
      _ => Err(ParameterError::ChipOutOfRange(value as u32)),
    }
  }
}

impl fmt::Display for AdcChip {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      AdcChip::Adc1 => write!(f, "ADC1"),
      AdcChip::Adc2 => write!(f, "ADC2"),
    }
  }
}

/// A single data channel, 0..63
///
/// Maps to exactly one (chip, lane) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Channel(u8);

impl Channel {
  pub fn new(id : u8) -> Result<Self, ParameterError> {
    if id as usize >= NCHN {
      return Err(ParameterError::ChannelOutOfRange(id as u32));
    }
    Ok(Channel(id))
  }

  /// The channel carrying sub-channel `sub` (0..15)
  /// of the given chip. Sub-channels sit on every
  /// second lane.
  pub fn from_sub_channel(chip : AdcChip, sub : u8) -> Result<Self, ParameterError> {
    if sub as usize >= N_SUB_CHANNELS {
      return Err(ParameterError::SubChannelOutOfRange(sub as u32));
    }
    let id = chip.index() as u8 * N_LANES_PER_CHIP as u8 + 2 * sub;
    Channel::new(id)
  }

  pub fn id(&self) -> u8 {
    self.0
  }

  pub fn chip(&self) -> AdcChip {
    if (self.0 as usize) < N_LANES_PER_CHIP {
      AdcChip::Adc1
    } else {
      AdcChip::Adc2
    }
  }

  /// Lane on the ADC chip, 0..31
  pub fn lane(&self) -> u8 {
    self.0 % N_LANES_PER_CHIP as u8
  }

  /// The group of channels sharing one stop
  /// pointer of the sampling chip, 0..7
  pub fn drs_group(&self) -> u8 {
    self.0 / N_CHN_PER_DRS_GROUP as u8
  }

  /// All 64 channels in ascending order
  pub fn all() -> impl Iterator<Item = Channel> {
    (0..NCHN as u8).map(Channel)
  }
}

impl TryFrom<u8> for Channel {
  type Error = ParameterError;

  fn try_from(value : u8) -> Result<Self, Self::Error> {
    Channel::new(value)
  }
}

impl From<Channel> for u8 {
  fn from(ch : Channel) -> u8 {
    ch.0
  }
}

impl fmt::Display for Channel {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "CH{:02}", self.0)
  }
}

/// Setting of an IDELAY line, 0..31
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DelayTap(u8);

impl DelayTap {
  pub fn new(tap : u8) -> Result<Self, ParameterError> {
    if tap > MAX_DELAY_TAP {
      return Err(ParameterError::TapOutOfRange(tap as u32));
    }
    Ok(DelayTap(tap))
  }

  pub fn value(&self) -> u8 {
    self.0
  }

  /// Sweep order used by all scans, 0 to 31 ascending
  pub fn sweep() -> impl Iterator<Item = DelayTap> {
    (0..=MAX_DELAY_TAP).map(DelayTap)
  }
}

impl TryFrom<u8> for DelayTap {
  type Error = ParameterError;

  fn try_from(value : u8) -> Result<Self, Self::Error> {
    DelayTap::new(value)
  }
}

impl From<DelayTap> for u8 {
  fn from(tap : DelayTap) -> u8 {
    tap.0
  }
}

impl fmt::Display for DelayTap {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}
