//! Pedestals (baselines) of the sampling chip
//!
//! A pedestal table holds mean and rms for each of
//! the 1024 ring buffer slots of a channel. It is
//! filled by accumulating decoded samples from a
//! number of repeated acquisitions.

use std::fmt;

use crate::channel::Channel;
use crate::constants::NWORDS;
use crate::errors::ParameterError;
use crate::waveform::Sample;

/// How the samples of an acquisition were obtained
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum PedestalMode {
  /// Full readout window, slots in buffer order
  Full,
  /// Region of interest, rotated to the stop pointer
  Roi,
}

impl fmt::Display for PedestalMode {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      PedestalMode::Full => write!(f, "Full"),
      PedestalMode::Roi  => write!(f, "ROI"),
    }
  }
}

/// Statistics for a single ring buffer slot
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PedestalSlot {
  pub mean       : f64,
  /// population rms around the mean
  pub rms        : f64,
  /// number of valid samples that went in
  pub n_valid    : u32,
  /// number of under- and overflows which
  /// were left out
  pub n_rejected : u32,
}

impl PedestalSlot {
  pub fn new() -> Self {
    Self {
      mean       : f64::NAN,
      rms        : f64::NAN,
      n_valid    : 0,
      n_rejected : 0,
    }
  }

  pub fn is_valid(&self) -> bool {
    self.n_valid > 0
  }
}

impl Default for PedestalSlot {
  fn default() -> Self {
    Self::new()
  }
}

/// Per-slot pedestals for one channel
#[derive(Debug, Clone, PartialEq)]
pub struct PedestalTable {
  pub channel  : Option<Channel>,
  pub mode     : PedestalMode,
  pub n_events : usize,
  pub slots    : Vec<PedestalSlot>,
}

impl PedestalTable {
  pub fn new(mode : PedestalMode) -> Self {
    Self {
      channel  : None,
      mode     : mode,
      n_events : 0,
      slots    : vec![PedestalSlot::new();NWORDS],
    }
  }

  pub fn means(&self) -> Vec<f64> {
    self.slots.iter().map(|s| s.mean).collect()
  }

  pub fn rmss(&self) -> Vec<f64> {
    self.slots.iter().map(|s| s.rms).collect()
  }

  /// Subtract the pedestals slot by slot
  ///
  /// Invalid samples (and slots without a pedestal)
  /// give None.
  pub fn subtract(&self, samples : &[Sample]) -> Result<Vec<Option<f64>>, ParameterError> {
    if samples.len() != self.slots.len() {
      return Err(ParameterError::BufferSizeMismatch { expected : self.slots.len(), found : samples.len() });
    }
    let wf = samples.iter().zip(self.slots.iter()).map(|(s, slot)| {
      match s.value() {
        Some(v) if slot.is_valid() => Some(v as f64 - slot.mean),
        _ => None,
      }
    }).collect();
    Ok(wf)
  }
}

impl fmt::Display for PedestalTable {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<PedestalTable:");
    match self.channel {
      Some(ch) => repr += &(format!("\n  channel  : {ch}")),
      None     => repr += "\n  channel  : -",
    }
    repr += &(format!("\n  mode     : {}", self.mode));
    repr += &(format!("\n  n events : {}", self.n_events));
    let n_bad = self.slots.iter().filter(|s| !s.is_valid()).count();
    repr += &(format!("\n  empty slots : {n_bad}>"));
    write!(f, "{}", repr)
  }
}

/// Collects samples per slot over many events
/// and turns them into a PedestalTable
#[derive(Debug, Clone)]
pub struct PedestalAccumulator {
  mode     : PedestalMode,
  n_events : usize,
  buckets  : Vec<Vec<i16>>,
  rejected : Vec<u32>,
}

impl PedestalAccumulator {
  pub fn new(mode : PedestalMode) -> Self {
    Self {
      mode     : mode,
      n_events : 0,
      buckets  : vec![Vec::<i16>::new();NWORDS],
      rejected : vec![0;NWORDS],
    }
  }

  /// Add the 1024 samples of one event, sample k
  /// goes into bucket k
  pub fn add_event(&mut self, samples : &[Sample]) -> Result<(), ParameterError> {
    if samples.len() != NWORDS {
      return Err(ParameterError::BufferSizeMismatch { expected : NWORDS, found : samples.len() });
    }
    for (k, s) in samples.iter().enumerate() {
      match s.value() {
        Some(v) => self.buckets[k].push(v),
        None    => self.rejected[k] += 1,
      }
    }
    self.n_events += 1;
    Ok(())
  }

  pub fn n_events(&self) -> usize {
    self.n_events
  }

  pub fn finish(self, channel : Option<Channel>) -> PedestalTable {
    let mut table  = PedestalTable::new(self.mode);
    table.channel  = channel;
    table.n_events = self.n_events;
    for (k, bucket) in self.buckets.iter().enumerate() {
      let (mean, rms) = mean_and_rms(bucket);
      table.slots[k] = PedestalSlot {
        mean       : mean,
        rms        : rms,
        n_valid    : bucket.len() as u32,
        n_rejected : self.rejected[k],
      };
    }
    table
  }
}

/// Mean and population rms (no N-1 correction).
/// NaN for an empty input.
pub fn mean_and_rms(values : &[i16]) -> (f64, f64) {
  if values.is_empty() {
    return (f64::NAN, f64::NAN);
  }
  let n    = values.len() as f64;
  let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n;
  let var  = values.iter().map(|v| {
    let d = *v as f64 - mean;
    d*d
  }).sum::<f64>() / n;
  (mean, var.sqrt())
}

/// Round to one decimal place, for reporting only
pub fn round1(value : f64) -> f64 {
  (value * 10.0).round() / 10.0
}
