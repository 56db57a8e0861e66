//! Errors which can occur while calibrating or
//! reading out the board, without touching the
//! registers themselves.
//!
//! Register access errors live with the register
//! port in lappd-rb.

use std::error::Error;
use std::fmt;

use crate::channel::{AdcChip, Channel};

/// A parameter was outside of its valid range.
///
/// These are always raised BEFORE any register
/// is accessed, values are never clamped.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterError {
  ChannelOutOfRange(u32),
  TapOutOfRange(u32),
  ChipOutOfRange(u32),
  SubChannelOutOfRange(u32),
  BitOutOfRange(u32),
  AdcRegisterOutOfRange(u32),
  AdcValueOutOfRange(u32),
  TestPatternOutOfRange(u32),
  StopPointerOutOfRange(u32),
  WordCountOutOfRange(usize),
  EventCountOutOfRange(usize),
  IterationCountOutOfRange(u32),
  SampleCountOutOfRange(usize),
  /// At least one test pattern is needed
  NoTestPattern,
  /// The capture does not have the size expected
  /// for the requested operation
  BufferSizeMismatch { expected : usize, found : usize },
}

impl fmt::Display for ParameterError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = match self {
      ParameterError::ChannelOutOfRange(ch)        => format!("channel {ch} not in 0..63"),
      ParameterError::TapOutOfRange(tap)           => format!("delay tap {tap} not in 0..31"),
      ParameterError::ChipOutOfRange(chip)         => format!("ADC chip {chip} not in 0..1"),
      ParameterError::SubChannelOutOfRange(sub)    => format!("sub-channel {sub} not in 0..15"),
      ParameterError::BitOutOfRange(bit)           => format!("register bit {bit} not in 0..31"),
      ParameterError::AdcRegisterOutOfRange(reg)   => format!("ADC register {reg:#x} not in 0..0xff"),
      ParameterError::AdcValueOutOfRange(val)      => format!("ADC register value {val:#x} not in 0..0xffff"),
      ParameterError::TestPatternOutOfRange(pat)   => format!("test pattern {pat:#x} wider than 12 bit"),
      ParameterError::StopPointerOutOfRange(sp)    => format!("stop pointer {sp} not in 0..1023"),
      ParameterError::WordCountOutOfRange(n)       => format!("word count {n} not supported"),
      ParameterError::EventCountOutOfRange(n)      => format!("event count {n} has to be at least 1"),
      ParameterError::IterationCountOutOfRange(n)  => format!("iteration count {n} has to be at least 1"),
      ParameterError::SampleCountOutOfRange(n)     => format!("sample count {n} has to be at least 1"),
      ParameterError::NoTestPattern                => String::from("no test pattern configured"),
      ParameterError::BufferSizeMismatch {expected, found}
        => format!("expected {expected} words, got {found}"),
    };
    write!(f, "<ParameterError: {}>", repr)
  }
}

impl Error for ParameterError {
}

/// Calibration of a data lane, a frame line
/// or the serializer alignment failed.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
  /// Not a single delay tap sampled the
  /// test pattern correctly
  NoPassingTap { channel : Channel },
  /// The frame status bit was never good
  /// during the whole sweep
  NoPassingFrameRun { line : AdcChip },
  /// The bit-slip loop gave up, mask holds the
  /// sub-channels which were still failing
  BitAlignmentDiverged { line : AdcChip, mask : u32, iterations : u32 },
  /// Aggregate of a bulk scan, all channels
  /// which did not calibrate
  LaneScanFailed { channels : Vec<Channel> },
  /// More than one of the above
  Multiple(Vec<CalibrationError>),
}

impl CalibrationError {
  /// One error for all of them, None if there
  /// is nothing to report
  pub fn combine(mut errors : Vec<CalibrationError>) -> Option<CalibrationError> {
    match errors.len() {
      0 => None,
      1 => errors.pop(),
      _ => Some(CalibrationError::Multiple(errors)),
    }
  }
}

impl fmt::Display for CalibrationError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = match self {
      CalibrationError::NoPassingTap { channel }
        => format!("no passing delay tap for channel {channel}"),
      CalibrationError::NoPassingFrameRun { line }
        => format!("no passing frame delay for {line}"),
      CalibrationError::BitAlignmentDiverged { line, mask, iterations }
        => format!("bit alignment for {line} did not converge after {iterations} iterations, mask {mask:#018b}"),
      CalibrationError::LaneScanFailed { channels } => {
        let chs : Vec<String> = channels.iter().map(|ch| ch.to_string()).collect();
        format!("data lane scan failed for channels [{}]", chs.join(", "))
      }
      CalibrationError::Multiple(errors) => {
        let errs : Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        format!("{} failures {}", errors.len(), errs.join(" "))
      }
    };
    write!(f, "<CalibrationError: {}>", repr)
  }
}

impl Error for CalibrationError {
}

/// Problems with settings files
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
  Io(String),
  TomlDecodingError(String),
  TomlEncodingError(String),
  JsonEncodingError(String),
  JsonDecodingError(String),
}

impl fmt::Display for SettingsError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = match self {
      SettingsError::Io(msg)                => format!("Io {msg}"),
      SettingsError::TomlDecodingError(msg) => format!("TomlDecodingError {msg}"),
      SettingsError::TomlEncodingError(msg) => format!("TomlEncodingError {msg}"),
      SettingsError::JsonEncodingError(msg) => format!("JsonEncodingError {msg}"),
      SettingsError::JsonDecodingError(msg) => format!("JsonDecodingError {msg}"),
    };
    write!(f, "<SettingsError: {}>", repr)
  }
}

impl Error for SettingsError {
}

#[test]
fn display_lane_scan_failure() {
  let chs = vec![Channel::new(2).unwrap(), Channel::new(34).unwrap()];
  let err = CalibrationError::LaneScanFailed { channels : chs };
  assert_eq!(err.to_string(), "<CalibrationError: data lane scan failed for channels [CH02, CH34]>");
}

#[test]
fn combine_calibration_errors() {
  assert_eq!(CalibrationError::combine(vec![]), None);
  let single = CalibrationError::NoPassingFrameRun { line : AdcChip::Adc1 };
  assert_eq!(CalibrationError::combine(vec![single.clone()]), Some(single.clone()));
  let diverged = CalibrationError::BitAlignmentDiverged { line : AdcChip::Adc2, mask : 0x4, iterations : 10 };
  assert_eq!(CalibrationError::combine(vec![single.clone(), diverged.clone()]),
             Some(CalibrationError::Multiple(vec![single, diverged])));
}
