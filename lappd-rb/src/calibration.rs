//! Timing calibration of the ADC data lanes
//!
//! Everything in here is a sweep over the delay
//! taps or a loop over the sub-channels of one
//! ADC chip, checking the output of the test
//! pattern generator through the debug register.

use lappd_dataclasses::calibration::{
  contiguous_runs,
  first_last_window,
  longest_run,
  BitAlignReport,
  CalibrationResult,
  FrameCalibration,
  IterationPolicy,
  LaneCalibration,
  LaneScanReport,
};
use lappd_dataclasses::channel::{
  AdcChip,
  Channel,
  DelayTap,
};
use lappd_dataclasses::constants::{
  ADC_NBITS,
  MASK_ADC_VALUE,
  N_DELAY_TAPS,
};
use lappd_dataclasses::errors::ParameterError;

use crate::control::LappdBoard;
use crate::errors::LappdError;
use crate::port::RegisterPort;

/// Outcome of reading back a test pattern
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PatternCheck {
  /// every read matched
  Match,
  /// every read showed the pattern shifted by
  /// the same number of bits
  Rotated,
  Mismatch,
}

/// `value` is `pattern` rotated by a non-zero
/// number of bits (12bit words)
fn is_rotation(value : u32, pattern : u32) -> bool {
  let mask = MASK_ADC_VALUE as u32;
  (1..ADC_NBITS).any(|k| ((pattern << k) | (pattern >> (ADC_NBITS - k))) & mask == value)
}

/// Read back the debug register of `channel`
/// `samples` times while the pattern generator
/// sends `pattern`.
///
/// All reads have to show the same value, a
/// single outlier gives `Mismatch`.
pub fn check_pattern<P : RegisterPort>(board   : &mut LappdBoard<P>,
                                       channel : Channel,
                                       pattern : u16,
                                       samples : usize) -> Result<PatternCheck, LappdError> {
  if samples == 0 {
    return Err(ParameterError::SampleCountOutOfRange(samples).into());
  }
  if pattern > MASK_ADC_VALUE {
    return Err(ParameterError::TestPatternOutOfRange(pattern as u32).into());
  }
  board.select_debug_channel(channel)?;
  board.adc_set_test_pattern(channel.chip(), pattern)?;
  let debug_data = board.map().adc_debug_data;
  let first = board.read(debug_data)?;
  let check = if first == pattern as u32 {
    PatternCheck::Match
  } else if is_rotation(first, pattern as u32) {
    PatternCheck::Rotated
  } else {
    trace!("{channel} : read {first:#05x}, expected {pattern:#05x}");
    return Ok(PatternCheck::Mismatch);
  };
  for k in 1..samples {
    let val = board.read(debug_data)?;
    if val != first {
      trace!("{channel} : read {val:#05x}, expected {first:#05x} at sample {k}");
      return Ok(PatternCheck::Mismatch);
    }
  }
  Ok(check)
}

/// Check that the debug register of `channel`
/// shows `pattern` for `samples` consecutive reads.
///
/// A single mismatch fails the check.
pub fn verify_pattern<P : RegisterPort>(board   : &mut LappdBoard<P>,
                                        channel : Channel,
                                        pattern : u16,
                                        samples : usize) -> Result<bool, LappdError> {
  Ok(check_pattern(board, channel, pattern, samples)? == PatternCheck::Match)
}

/// Check all configured test patterns. A shifted
/// primary pattern is reported as `Rotated`, the
/// other patterns only have to match.
pub fn check_patterns<P : RegisterPort>(board   : &mut LappdBoard<P>,
                                        channel : Channel) -> Result<PatternCheck, LappdError> {
  let patterns = board.settings().calibration.test_patterns.clone();
  let samples  = board.settings().calibration.pattern_samples;
  let (primary, others) = match patterns.split_first() {
    Some(split) => split,
    None        => return Err(ParameterError::NoTestPattern.into()),
  };
  let check = check_pattern(board, channel, *primary, samples)?;
  if check != PatternCheck::Match {
    return Ok(check);
  }
  for pat in others {
    if !verify_pattern(board, channel, *pat, samples)? {
      return Ok(PatternCheck::Mismatch);
    }
  }
  Ok(PatternCheck::Match)
}

/// Find the delay tap for a single data lane.
///
/// Sweeps all taps, the window spans from the first
/// to the last passing tap. The midpoint of the
/// window is written to the delay register. On
/// failure the delay register gets back the value
/// it had before the sweep.
pub fn scan_channel<P : RegisterPort>(board   : &mut LappdBoard<P>,
                                      channel : Channel) -> Result<LaneCalibration, LappdError> {
  let addr     = board.map().data_delay(channel);
  let previous = board.read(addr)?;
  let mut passed     = Vec::<bool>::with_capacity(N_DELAY_TAPS);
  let mut misaligned = false;
  for tap in DelayTap::sweep() {
    board.set_data_delay(channel, tap)?;
    let check = check_patterns(board, channel)?;
    passed.push(check == PatternCheck::Match);
    misaligned |= check == PatternCheck::Rotated;
  }
  let result = CalibrationResult::from_window(first_last_window(&passed));
  match result {
    CalibrationResult::Selected { tap, window } => {
      board.set_data_delay(channel, tap)?;
      info!("{channel} : delay tap {tap}, passing window {window}");
    }
    CalibrationResult::Failure => {
      board.write(addr, previous)?;
      if misaligned {
        warn!("{channel} : no passing delay tap, pattern is bit shifted!");
      } else {
        warn!("{channel} : no passing delay tap!");
      }
    }
  }
  Ok(LaneCalibration { channel, result, misaligned })
}

/// Scan all sub-channels of one ADC chip.
///
/// Individual failures end up in the report,
/// the scan continues with the next lane.
pub fn scan_chip<P : RegisterPort>(board : &mut LappdBoard<P>,
                                   chip  : AdcChip) -> Result<LaneScanReport, LappdError> {
  let n_sub = board.settings().calibration.sub_channels_per_chip;
  let mut report = LaneScanReport::new();
  for sub in 0..n_sub {
    let channel = Channel::from_sub_channel(chip, sub)?;
    report.push(scan_channel(board, channel)?);
  }
  let n_failed = report.failed_channels().len();
  if n_failed > 0 {
    warn!("{chip} : {n_failed} of {n_sub} data lanes did not calibrate!");
  } else {
    debug!("{chip} : all {n_sub} data lanes calibrated");
  }
  Ok(report)
}

/// Scan the data lanes of both ADC chips
pub fn scan_all<P : RegisterPort>(board : &mut LappdBoard<P>) -> Result<LaneScanReport, LappdError> {
  let mut report = LaneScanReport::new();
  for chip in AdcChip::ALL {
    report.extend(scan_chip(board, chip)?);
  }
  Ok(report)
}

/// Find the frame delay for one ADC chip.
///
/// The frame status bit is the pass signal. Only
/// contiguous runs of passing taps count, the
/// midpoint of the longest one is written.
pub fn scan_frame<P : RegisterPort>(board : &mut LappdBoard<P>,
                                    line  : AdcChip) -> Result<FrameCalibration, LappdError> {
  let mut passed = Vec::<bool>::with_capacity(N_DELAY_TAPS);
  for tap in DelayTap::sweep() {
    board.set_frame_delay(line, tap)?;
    passed.push(board.frame_status_ok(line)?);
  }
  let n_runs = contiguous_runs(&passed).len();
  let result = CalibrationResult::from_window(longest_run(&passed));
  match result {
    CalibrationResult::Selected { tap, window } => {
      board.set_frame_delay(line, tap)?;
      info!("{line} : frame delay tap {tap}, longest of {n_runs} runs {window}");
    }
    CalibrationResult::Failure => {
      error!("{line} : frame status never good!");
    }
  }
  Ok(FrameCalibration { line, result, n_runs })
}

/// Delay scan and bit-slip of all sub-channels
/// of one ADC chip.
///
/// After the first scan, every lane which saw its
/// pattern shifted gets a bit-slip and is scanned
/// again, until no shifted lane is left or
/// `policy.max_iterations` slips were written.
/// Lanes which never showed the pattern are not
/// slipped. The returned report counts scan rounds
/// as checks and written masks as corrections.
pub fn calibrate_chip<P : RegisterPort>(board  : &mut LappdBoard<P>,
                                        chip   : AdcChip,
                                        policy : IterationPolicy)
  -> Result<(LaneScanReport, BitAlignReport), LappdError> {
  policy.validate()?;
  let mut lanes = scan_chip(board, chip)?;
  let mut align = BitAlignReport {
    line        : chip,
    converged   : false,
    checks      : 1,
    corrections : 0,
    last_mask   : 0,
  };
  loop {
    let misaligned = lanes.misaligned_channels();
    let mask = misaligned.iter().fold(0u32, |m, ch| m | (1 << (ch.lane() / 2)));
    align.last_mask = mask;
    if mask == 0 {
      align.converged = true;
      break;
    }
    if align.corrections >= policy.max_iterations {
      error!("{chip} : lanes still bit shifted after {} slips, mask {mask:#018b}", align.corrections);
      break;
    }
    debug!("{chip} : one more try with bitslip {mask:#018b}");
    board.write_bitslip(chip, mask)?;
    align.corrections += 1;
    for channel in misaligned {
      lanes.replace(scan_channel(board, channel)?);
    }
    align.checks += 1;
  }
  Ok((lanes, align))
}

/// Bit-slip correction for one ADC chip.
///
/// Every round checks all sub-channels against the
/// primary pattern. Failing sub-channels are
/// flagged in a mask, which is written to the
/// bit-slip register, shifting each of them by one
/// bit. Sub-channels which pass are never touched.
/// Gives up after `policy.max_iterations` rounds.
pub fn correct_lane<P : RegisterPort>(board  : &mut LappdBoard<P>,
                                      line   : AdcChip,
                                      policy : IterationPolicy) -> Result<BitAlignReport, LappdError> {
  policy.validate()?;
  let pattern = board.settings().calibration.primary_pattern()?;
  let samples = board.settings().calibration.pattern_samples;
  let n_sub   = board.settings().calibration.sub_channels_per_chip;
  let mut report = BitAlignReport {
    line,
    converged   : false,
    checks      : 0,
    corrections : 0,
    last_mask   : 0,
  };
  while report.checks < policy.max_iterations {
    let mut mask = 0u32;
    for sub in 0..n_sub {
      let channel = Channel::from_sub_channel(line, sub)?;
      if !verify_pattern(board, channel, pattern, samples)? {
        mask |= 1 << sub;
      }
    }
    report.checks   += 1;
    report.last_mask = mask;
    if mask == 0 {
      report.converged = true;
      info!("{line} : bit alignment ok after {} corrections", report.corrections);
      return Ok(report);
    }
    debug!("{line} : one more try with bitslip {mask:#018b}");
    board.write_bitslip(line, mask)?;
    report.corrections += 1;
  }
  error!("{line} : bit alignment failed, mask {:#018b}", report.last_mask);
  Ok(report)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::LappdSettings;
  use crate::sim::SimulatedBoard;

  fn board() -> LappdBoard<SimulatedBoard> {
    let mut settings = LappdSettings::for_simulation();
    settings.calibration.pattern_samples = 5;
    let sim = SimulatedBoard::new(settings.register_map.clone());
    LappdBoard::new(sim, settings).unwrap()
  }

  #[test]
  fn single_glitch_fails_verification() {
    let mut b  = board();
    let ch = Channel::new(4).unwrap();
    b.port_mut().set_lane_window(ch, 0, 31);
    assert!(verify_pattern(&mut b, ch, 0xABC, 5).unwrap());
    b.port_mut().glitch_debug_reads(1);
    assert!(!verify_pattern(&mut b, ch, 0xABC, 5).unwrap());
    assert!(verify_pattern(&mut b, ch, 0xABC, 5).unwrap());
  }

  #[test]
  fn verification_checks_arguments_first() {
    let mut b  = board();
    let ch = Channel::new(4).unwrap();
    assert!(verify_pattern(&mut b, ch, 0xABC, 0).is_err());
    assert!(verify_pattern(&mut b, ch, 0x1ABC, 5).is_err());
    assert!(b.port().writes().is_empty());
    assert_eq!(b.port().n_reads(), 0);
  }

  #[test]
  fn dead_lane_fails() {
    let mut b  = board();
    let ch = Channel::new(6).unwrap();
    b.port_mut().set_lane_taps(ch, vec![false;N_DELAY_TAPS]);
    let res = scan_channel(&mut b, ch).unwrap();
    assert!(res.result.is_failure());
  }

  #[test]
  fn failed_scan_restores_previous_tap() {
    let mut b  = board();
    let ch = Channel::new(6).unwrap();
    b.set_data_delay(ch, DelayTap::new(9).unwrap()).unwrap();
    b.port_mut().set_lane_taps(ch, vec![false;N_DELAY_TAPS]);
    let res = scan_channel(&mut b, ch).unwrap();
    assert!(res.result.is_failure());
    assert!(!res.misaligned);
    let addr = b.map().data_delay(ch);
    assert_eq!(b.port().peek(addr), 9);
  }

  #[test]
  fn shifted_pattern_is_told_apart() {
    let mut b  = board();
    let ch = Channel::from_sub_channel(AdcChip::Adc1, 2).unwrap();
    b.port_mut().set_lane_window(ch, 0, 31);
    b.port_mut().set_misalignment(AdcChip::Adc1, 2, 3);
    assert_eq!(check_pattern(&mut b, ch, 0xABC, 5).unwrap(), PatternCheck::Rotated);
    assert!(!verify_pattern(&mut b, ch, 0xABC, 5).unwrap());
    let res = scan_channel(&mut b, ch).unwrap();
    assert!(res.result.is_failure());
    assert!(res.misaligned);
    // a dead tap is garbage, not a shifted pattern
    b.port_mut().set_lane_taps(ch, vec![false;N_DELAY_TAPS]);
    assert_eq!(check_pattern(&mut b, ch, 0xABC, 5).unwrap(), PatternCheck::Mismatch);
  }

  #[test]
  fn chip_calibration_slips_shifted_lanes() {
    let mut b = board();
    b.port_mut().set_misalignment(AdcChip::Adc1, 5, 2);
    let policy = IterationPolicy::new(10).unwrap();
    let (lanes, align) = calibrate_chip(&mut b, AdcChip::Adc1, policy).unwrap();
    assert!(lanes.check().is_ok());
    assert_eq!(lanes.lanes.len(), 16);
    assert!(align.converged);
    assert_eq!(align.corrections, 2);
    assert_eq!(align.checks, 3);
    assert_eq!(b.port().writes_to(0x350), vec![1 << 5;2]);
    assert!(b.port().is_aligned(AdcChip::Adc1, 5));
    let ch = Channel::from_sub_channel(AdcChip::Adc1, 5).unwrap();
    assert_eq!(lanes.tap(ch), Some(DelayTap::new(14).unwrap()));
  }

  #[test]
  fn chip_calibration_does_not_slip_dead_lanes() {
    let mut b = board();
    let ch = Channel::from_sub_channel(AdcChip::Adc1, 1).unwrap();
    b.port_mut().set_lane_taps(ch, vec![false;N_DELAY_TAPS]);
    let policy = IterationPolicy::new(10).unwrap();
    let (lanes, align) = calibrate_chip(&mut b, AdcChip::Adc1, policy).unwrap();
    assert_eq!(lanes.failed_channels(), vec![ch]);
    assert!(align.converged);
    assert_eq!(align.corrections, 0);
    assert!(b.port().writes_to(0x350).is_empty());
  }

  #[test]
  fn frame_without_passing_tap() {
    let mut b = board();
    b.port_mut().set_frame_taps(AdcChip::Adc2, vec![false;N_DELAY_TAPS]);
    let res = scan_frame(&mut b, AdcChip::Adc2).unwrap();
    assert_eq!(res.n_runs, 0);
    assert!(res.check().is_err());
  }

  #[test]
  fn bit_alignment_gives_up() {
    let mut b = board();
    for sub in 0..16 {
      let ch = Channel::from_sub_channel(AdcChip::Adc1, sub).unwrap();
      b.port_mut().set_lane_window(ch, 0, 31);
    }
    let ch = Channel::from_sub_channel(AdcChip::Adc1, 3).unwrap();
    b.port_mut().set_lane_taps(ch, vec![false;N_DELAY_TAPS]);
    let policy = IterationPolicy::new(4).unwrap();
    let report = correct_lane(&mut b, AdcChip::Adc1, policy).unwrap();
    assert!(!report.converged);
    assert_eq!(report.checks, 4);
    assert_eq!(report.last_mask, 1 << 3);
    assert_eq!(b.port().writes_to(0x350), vec![1 << 3;4]);
    assert!(report.check().is_err());
  }
}
