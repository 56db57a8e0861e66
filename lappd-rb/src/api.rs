//! High level board operations
//!
//! The bring-up sequence and the pedestal and
//! waveform helpers. Nothing is cached on the
//! board, all results are handed back to the
//! caller.

use std::fmt;
use std::io;
use std::thread;
use std::time::Duration;

use lappd_dataclasses::calibration::{
  BitAlignReport,
  FrameCalibration,
  LaneScanReport,
};
use lappd_dataclasses::channel::{
  AdcChip,
  Channel,
};
use lappd_dataclasses::errors::{
  CalibrationError,
  ParameterError,
};
use lappd_dataclasses::io::write_pedestal_dump;
use lappd_dataclasses::pedestal::{
  PedestalMode,
  PedestalTable,
};

use crate::acquisition::{
  acquire_full,
  acquire_rotated,
};
use crate::calibration::{
  calibrate_chip,
  correct_lane,
  scan_frame,
};
use crate::control::{
  AdcTestMode,
  LappdBoard,
  TestModeTarget,
};
use crate::errors::LappdError;
use crate::pedestals::{
  estimate_full,
  estimate_roi,
};
use crate::port::RegisterPort;

/// Everything the bring-up found out
#[derive(Debug, Clone, PartialEq)]
pub struct BringUpReport {
  pub frames         : Vec<FrameCalibration>,
  pub lanes          : LaneScanReport,
  /// bit-slips written during the delay scan
  pub lane_alignment : Vec<BitAlignReport>,
  /// final bit alignment check, only for chips
  /// where all lanes passed the delay scan
  pub bit_align      : Vec<BitAlignReport>,
  pub pll_status     : u32,
  /// Problems which did not stop the bring-up
  pub warnings   : Vec<LappdError>,
}

impl BringUpReport {
  pub fn new() -> Self {
    Self {
      frames         : Vec::<FrameCalibration>::new(),
      lanes          : LaneScanReport::new(),
      lane_alignment : Vec::<BitAlignReport>::new(),
      bit_align      : Vec::<BitAlignReport>::new(),
      pll_status     : 0,
      warnings       : Vec::<LappdError>::new(),
    }
  }

  pub fn is_degraded(&self) -> bool {
    !self.warnings.is_empty()
  }
}

impl Default for BringUpReport {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for BringUpReport {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<BringUpReport:");
    for frame in &self.frames {
      repr += &(format!("\n  {} frame {}", frame.line, frame.result));
    }
    for ba in &self.lane_alignment {
      repr += &(format!("\n  scan {}", ba));
    }
    for ba in &self.bit_align {
      repr += &(format!("\n  final {}", ba));
    }
    repr += &(format!("\n  {}", self.lanes));
    repr += &(format!("\n  PLL status {:#04x}", self.pll_status));
    for w in &self.warnings {
      repr += &(format!("\n  WARNING {}", w));
    }
    write!(f, "{}>", repr)
  }
}

/// Full and ROI pedestals of one channel
#[derive(Debug, Clone, PartialEq)]
pub struct PedestalPair {
  pub full : PedestalTable,
  pub roi  : PedestalTable,
}

impl PedestalPair {
  pub fn write_dump<W : io::Write>(&self, writer : &mut W) -> io::Result<()> {
    write_pedestal_dump(writer, &self.full, &self.roi)
  }
}

/// Initialize the ADCs, calibrate all data lanes
/// and configure the DRS.
///
/// A frame line without a passing delay stops the
/// bring-up right away. Bit shifted lanes are
/// slipped and scanned again while the delays are
/// calibrated. Chips where every lane passed get a
/// final bit alignment check. Lane and bit
/// alignment failures are collected over both chips
/// and raised together afterwards. A PLL which does
/// not lock ends up in the warnings of the report.
pub fn bring_up<P : RegisterPort>(board : &mut LappdBoard<P>) -> Result<BringUpReport, LappdError> {
  let policy = board.settings().calibration.iteration_policy()?;
  let mut report = BringUpReport::new();

  board.adc_reset()?;
  for chip in AdcChip::ALL {
    board.adc_init(chip)?;
  }
  board.adc_tx_trigger()?;

  for chip in AdcChip::ALL {
    info!("Calibrate IDELAYs for {chip}");
    board.adc_test_mode(chip, AdcTestMode::Custom, TestModeTarget::DataLanes)?;
    let frame = scan_frame(board, chip)?;
    frame.check()?;
    report.frames.push(frame);
    let (lanes, alignment) = calibrate_chip(board, chip, policy)?;
    if lanes.check().is_ok() && alignment.converged {
      report.bit_align.push(correct_lane(board, chip, policy)?);
    }
    report.lanes.extend(lanes);
    report.lane_alignment.push(alignment);
    board.adc_test_mode(chip, AdcTestMode::Normal, TestModeTarget::DataLanes)?;
  }

  let mut failures = Vec::<CalibrationError>::new();
  if let Err(err) = report.lanes.check() {
    failures.push(err);
  }
  for ba in report.lane_alignment.iter().chain(report.bit_align.iter()) {
    if let Err(err) = ba.check() {
      failures.push(err);
    }
  }
  for err in &failures {
    error!("ADC calibration failed! {err}");
  }
  if let Some(err) = CalibrationError::combine(failures) {
    return Err(err.into());
  }

  let drs = board.settings().drs.clone();
  board.drs_set_config(drs.config)?;
  board.drs_transparent_mode(true)?;
  info!("DRS4 transparent mode is ON");
  board.drs_denable(true)?;
  info!("DENABLE is ON");
  if drs.pll_settle_ms > 0 {
    thread::sleep(Duration::from_millis(drs.pll_settle_ms));
  }
  report.pll_status = board.pll_status()?;
  if report.pll_status == 0 {
    let err = LappdError::HardwareNotReady { pll_status : report.pll_status };
    error!("DRS4 PLL failed to lock! {err}");
    report.warnings.push(err);
  } else {
    info!("DRS4 PLL locked");
  }

  // tune SRCLK to ADCCLK phase
  board.set_drs_valid_delay(drs.valid_delay)?;
  board.set_readout_words(drs.readout_words)?;
  board.set_packet_samples(drs.packet_samples)?;
  let debug_channel = Channel::new(drs.debug_channel)?;
  board.select_debug_channel(debug_channel)?;
  for chip in AdcChip::ALL {
    board.set_adc_channel_mask(chip, drs.adc_channel_masks[chip.index() as usize])?;
  }
  info!("Full waveform readout mode, debug channel {debug_channel}");
  Ok(report)
}

/// Measure full window and ROI pedestals
pub fn measure_pedestals<P : RegisterPort>(board    : &mut LappdBoard<P>,
                                           channel  : Channel,
                                           n_events : usize) -> Result<PedestalPair, LappdError> {
  if n_events == 0 {
    return Err(ParameterError::EventCountOutOfRange(n_events).into());
  }
  let full = estimate_full(board, channel, n_events)?;
  let roi  = estimate_roi(board, channel, n_events)?;
  Ok(PedestalPair { full, roi })
}

/// One acquisition of `channel`, pedestal subtracted
/// per slot. Acquired the same way the pedestals
/// were. Under- and overflows come back as None.
pub fn read_waveform<P : RegisterPort>(board     : &mut LappdBoard<P>,
                                       channel   : Channel,
                                       pedestals : &PedestalTable) -> Result<Vec<Option<f64>>, LappdError> {
  if let Some(ped_channel) = pedestals.channel {
    if ped_channel != channel {
      warn!("Pedestals of {ped_channel} applied to {channel}!");
    }
  }
  let samples = match pedestals.mode {
    PedestalMode::Full => acquire_full(board, channel)?,
    PedestalMode::Roi  => acquire_rotated(board, channel)?.decoded(),
  };
  Ok(pedestals.subtract(&samples)?)
}
