//! Results of the timing calibration and the
//! selection of delay taps from a sweep
//!
//! Data lanes and frame lines use two different
//! strategies on purpose:
//!
//! * data lanes : the window spans from the first
//!   to the last passing tap, failing taps in between
//!   are ignored
//! * frame lines : only contiguous runs of passing
//!   taps count, the longest one wins
//!
//! Both pick the midpoint of the window, truncating.

use std::fmt;

use crate::channel::{AdcChip, Channel, DelayTap};
use crate::constants::N_DELAY_TAPS;
use crate::errors::{
  CalibrationError,
  ParameterError,
};

/// Inclusive range of delay taps
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PassRun {
  pub first : DelayTap,
  pub last  : DelayTap,
}

impl PassRun {
  pub fn len(&self) -> usize {
    (self.last.value() - self.first.value()) as usize + 1
  }

  /// `floor((first + last)/2)`
  pub fn midpoint(&self) -> DelayTap {
    let mid = (self.first.value() + self.last.value()) / 2;
    // can not leave the range, both ends are valid taps
    DelayTap::new(mid).unwrap_or(self.first)
  }
}

impl fmt::Display for PassRun {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "[{},{}]", self.first, self.last)
  }
}

/// Outcome of a delay scan for one channel or line
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CalibrationResult {
  Selected { tap : DelayTap, window : PassRun },
  Failure,
}

impl CalibrationResult {
  pub fn from_window(window : Option<PassRun>) -> Self {
    match window {
      Some(window) => CalibrationResult::Selected { tap : window.midpoint(), window },
      None         => CalibrationResult::Failure,
    }
  }

  pub fn tap(&self) -> Option<DelayTap> {
    match self {
      CalibrationResult::Selected { tap, .. } => Some(*tap),
      CalibrationResult::Failure              => None,
    }
  }

  pub fn is_failure(&self) -> bool {
    matches!(self, CalibrationResult::Failure)
  }
}

impl fmt::Display for CalibrationResult {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      CalibrationResult::Selected { tap, window } => write!(f, "<CalibrationResult: tap {tap} window {window}>"),
      CalibrationResult::Failure                  => write!(f, "<CalibrationResult: Failure>"),
    }
  }
}

fn tap_at(idx : usize) -> Option<DelayTap> {
  if idx >= N_DELAY_TAPS {
    return None;
  }
  DelayTap::new(idx as u8).ok()
}

/// Gap tolerant window: first and last passing tap
///
/// # Arguments
///
/// * passed : verification outcome, indexed by tap
pub fn first_last_window(passed : &[bool]) -> Option<PassRun> {
  let first = passed.iter().position(|p| *p)?;
  let last  = passed.iter().rposition(|p| *p)?;
  Some(PassRun {
    first : tap_at(first)?,
    last  : tap_at(last)?,
  })
}

/// All maximal contiguous runs of passing taps,
/// in sweep order
pub fn contiguous_runs(passed : &[bool]) -> Vec<PassRun> {
  let mut runs  = Vec::<PassRun>::new();
  let mut start : Option<usize> = None;
  for (idx, ok) in passed.iter().enumerate() {
    match (start, *ok) {
      (None, true)     => start = Some(idx),
      (Some(s), false) => {
        if let (Some(first), Some(last)) = (tap_at(s), tap_at(idx - 1)) {
          runs.push(PassRun { first, last });
        }
        start = None;
      }
      _ => (),
    }
  }
  if let Some(s) = start {
    if let (Some(first), Some(last)) = (tap_at(s), tap_at(passed.len() - 1)) {
      runs.push(PassRun { first, last });
    }
  }
  runs
}

/// Gap intolerant window: the longest contiguous run.
/// Ties go to the run found first.
pub fn longest_run(passed : &[bool]) -> Option<PassRun> {
  let mut best : Option<PassRun> = None;
  for run in contiguous_runs(passed) {
    match best {
      Some(b) if b.len() >= run.len() => (),
      _ => best = Some(run),
    }
  }
  best
}

/// Delay scan result for a single data lane
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LaneCalibration {
  pub channel    : Channel,
  pub result     : CalibrationResult,
  /// the primary pattern came back shifted by
  /// whole bits for at least one tap, so the
  /// lane needs a bit-slip rather than a delay
  pub misaligned : bool,
}

/// Delay scan result for a frame line
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameCalibration {
  pub line   : AdcChip,
  pub result : CalibrationResult,
  /// number of contiguous runs seen in the sweep
  pub n_runs : usize,
}

impl FrameCalibration {
  /// A frame line without a passing run is fatal
  /// for every lane on that chip
  pub fn check(&self) -> Result<DelayTap, CalibrationError> {
    self.result.tap().ok_or(CalibrationError::NoPassingFrameRun { line : self.line })
  }
}

/// Delay scan results for many data lanes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaneScanReport {
  pub lanes : Vec<LaneCalibration>,
}

impl LaneScanReport {
  pub fn new() -> Self {
    Self {
      lanes : Vec::<LaneCalibration>::new(),
    }
  }

  pub fn push(&mut self, lane : LaneCalibration) {
    self.lanes.push(lane);
  }

  pub fn extend(&mut self, other : LaneScanReport) {
    self.lanes.extend(other.lanes);
  }

  pub fn failed_channels(&self) -> Vec<Channel> {
    self.lanes.iter()
      .filter(|l| l.result.is_failure())
      .map(|l| l.channel)
      .collect()
  }

  /// Failed lanes which showed a shifted pattern
  pub fn misaligned_channels(&self) -> Vec<Channel> {
    self.lanes.iter()
      .filter(|l| l.result.is_failure() && l.misaligned)
      .map(|l| l.channel)
      .collect()
  }

  /// Put in a new result for an already scanned
  /// channel, or add it
  pub fn replace(&mut self, lane : LaneCalibration) {
    match self.lanes.iter_mut().find(|l| l.channel == lane.channel) {
      Some(old) => *old = lane,
      None      => self.lanes.push(lane),
    }
  }

  pub fn tap(&self, channel : Channel) -> Option<DelayTap> {
    self.lanes.iter()
      .find(|l| l.channel == channel)
      .and_then(|l| l.result.tap())
  }

  /// Fold all individual failures into a single one
  pub fn check(&self) -> Result<(), CalibrationError> {
    let failed = self.failed_channels();
    if failed.is_empty() {
      Ok(())
    } else {
      Err(CalibrationError::LaneScanFailed { channels : failed })
    }
  }
}

impl fmt::Display for LaneScanReport {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<LaneScanReport:");
    for l in &self.lanes {
      match l.result {
        CalibrationResult::Selected { tap, window } => {
          repr += &(format!("\n  {} : tap {:2} window {}", l.channel, tap, window));
        }
        CalibrationResult::Failure => {
          if l.misaligned {
            repr += &(format!("\n  {} : FAILED (misaligned)", l.channel));
          } else {
            repr += &(format!("\n  {} : FAILED", l.channel));
          }
        }
      }
    }
    write!(f, "{}>", repr)
  }
}

/// Upper bound for a convergence loop
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct IterationPolicy {
  pub max_iterations : u32,
}

impl IterationPolicy {
  pub fn new(max_iterations : u32) -> Result<Self, ParameterError> {
    let policy = Self { max_iterations };
    policy.validate()?;
    Ok(policy)
  }

  pub fn validate(&self) -> Result<(), ParameterError> {
    if self.max_iterations == 0 {
      return Err(ParameterError::IterationCountOutOfRange(0));
    }
    Ok(())
  }
}

impl Default for IterationPolicy {
  fn default() -> Self {
    Self { max_iterations : 10 }
  }
}

/// Outcome of the bit-slip loop for one line
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BitAlignReport {
  pub line        : AdcChip,
  pub converged   : bool,
  /// number of verification rounds over all sub-channels
  pub checks      : u32,
  /// number of masks written to the bit-slip register
  pub corrections : u32,
  /// failing sub-channels of the last round
  pub last_mask   : u32,
}

impl BitAlignReport {
  pub fn check(&self) -> Result<(), CalibrationError> {
    if self.converged {
      Ok(())
    } else {
      Err(CalibrationError::BitAlignmentDiverged {
        line       : self.line,
        mask       : self.last_mask,
        iterations : self.checks,
      })
    }
  }
}

impl fmt::Display for BitAlignReport {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<BitAlignReport: {} converged {} checks {} corrections {} mask {:#018b}>",
           self.line, self.converged, self.checks, self.corrections, self.last_mask)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pattern(good : &[usize]) -> Vec<bool> {
    let mut passed = vec![false;N_DELAY_TAPS];
    for k in good {
      passed[*k] = true;
    }
    passed
  }

  #[test]
  fn window_midpoint() {
    let passed = pattern(&[5,6,7,8,9]);
    let res = CalibrationResult::from_window(first_last_window(&passed));
    assert_eq!(res.tap(), Some(DelayTap::new(7).unwrap()));
  }

  #[test]
  fn window_ignores_gaps() {
    let passed = pattern(&[3,4,10,20]);
    let window = first_last_window(&passed).unwrap();
    assert_eq!(window.first.value(), 3);
    assert_eq!(window.last.value(), 20);
    assert_eq!(window.midpoint().value(), 11);
  }

  #[test]
  fn nothing_passes() {
    let passed = pattern(&[]);
    assert_eq!(first_last_window(&passed), None);
    assert_eq!(longest_run(&passed), None);
    assert!(CalibrationResult::from_window(None).is_failure());
  }

  #[test]
  fn longest_run_wins() {
    // runs of length 3 and 6
    let passed = pattern(&[2,3,4, 10,11,12,13,14,15]);
    let runs = contiguous_runs(&passed);
    assert_eq!(runs.len(), 2);
    let best = longest_run(&passed).unwrap();
    assert_eq!(best.len(), 6);
    assert_eq!(best.midpoint().value(), 12);
  }

  #[test]
  fn single_gap_splits_runs() {
    let passed = pattern(&[0,1,2,4,5,6]);
    let runs = contiguous_runs(&passed);
    assert_eq!(runs.len(), 2);
    // tie goes to the first run
    assert_eq!(longest_run(&passed).unwrap().first.value(), 0);
  }

  #[test]
  fn lane_report_aggregates_failures() {
    let mut report = LaneScanReport::new();
    let passed = pattern(&[5,6,7,8,9]);
    report.push(LaneCalibration {
      channel    : Channel::new(0).unwrap(),
      result     : CalibrationResult::from_window(first_last_window(&passed)),
      misaligned : false,
    });
    report.push(LaneCalibration {
      channel    : Channel::new(2).unwrap(),
      result     : CalibrationResult::Failure,
      misaligned : true,
    });
    report.push(LaneCalibration {
      channel    : Channel::new(4).unwrap(),
      result     : CalibrationResult::Failure,
      misaligned : false,
    });
    assert_eq!(report.tap(Channel::new(0).unwrap()).unwrap().value(), 7);
    assert_eq!(report.misaligned_channels(), vec![Channel::new(2).unwrap()]);
    assert_eq!(report.check(),
               Err(CalibrationError::LaneScanFailed {
                 channels : vec![Channel::new(2).unwrap(), Channel::new(4).unwrap()] }));
    report.replace(LaneCalibration {
      channel    : Channel::new(2).unwrap(),
      result     : CalibrationResult::from_window(first_last_window(&passed)),
      misaligned : false,
    });
    assert_eq!(report.lanes.len(), 3);
    assert_eq!(report.failed_channels(), vec![Channel::new(4).unwrap()]);
  }

  #[test]
  fn zero_iterations_rejected() {
    assert!(IterationPolicy::new(0).is_err());
    assert_eq!(IterationPolicy::default().max_iterations, 10);
  }

  #[test]
  fn run_reaching_the_end() {
    let passed = pattern(&[28,29,30,31]);
    let best = longest_run(&passed).unwrap();
    assert_eq!(best.last.value(), 31);
    assert_eq!(best.midpoint().value(), 29);
  }
}
