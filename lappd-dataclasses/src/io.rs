//! Text dumps of pedestals and events
//!
//! Pedestal dump, one line per slot:
//! `index mean_full rms_full mean_roi rms_roi`
//!
//! Event dump, a header line followed by one
//! line per event:
//! `stop_pointer sample_0 ... sample_1023`

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;

use chrono::Utc;

use crate::channel::Channel;
use crate::constants::NWORDS;
use crate::pedestal::{
  PedestalMode,
  PedestalSlot,
  PedestalTable,
};
use crate::waveform::Sample;

// helper
fn read_lines<P>(filename: P) -> io::Result<io::Lines<io::BufReader<File>>>
where P: AsRef<Path>, {
  let file = File::open(filename)?;
  Ok(io::BufReader::new(file).lines())
}

fn invalid_data(msg : String) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// One rotated, decoded acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
  pub stop_pointer : u16,
  pub samples      : Vec<Sample>,
}

/// Write full window and ROI pedestals side by side
pub fn write_pedestal_dump<W : Write>(writer : &mut W,
                                      full   : &PedestalTable,
                                      roi    : &PedestalTable) -> io::Result<()> {
  if full.slots.len() != roi.slots.len() {
    return Err(invalid_data(format!("Pedestal tables differ in size! {} vs {}", full.slots.len(), roi.slots.len())));
  }
  for (k, (f, r)) in full.slots.iter().zip(roi.slots.iter()).enumerate() {
    writeln!(writer, "{} {:.1} {:.1} {:.1} {:.1}", k, f.mean, f.rms, r.mean, r.rms)?;
  }
  Ok(())
}

/// Read a pedestal dump back in.
///
/// Returns (full, roi). Entry counts are not part
/// of the dump, a slot with a number counts as one
/// valid entry.
pub fn read_pedestal_dump<P : AsRef<Path>>(path : P)
  -> io::Result<(PedestalTable, PedestalTable)> {
  let mut full = PedestalTable::new(PedestalMode::Full);
  let mut roi  = PedestalTable::new(PedestalMode::Roi);
  let mut n_lines = 0usize;
  for line in read_lines(path)? {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    let fields : Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 5 {
      return Err(invalid_data(format!("Expected 5 fields, got '{line}'")));
    }
    let idx : usize = fields[0].parse().map_err(|_| invalid_data(format!("Bad slot index in '{line}'")))?;
    if idx >= NWORDS {
      return Err(invalid_data(format!("Slot index {idx} out of range")));
    }
    let mut vals = [0f64;4];
    for k in 0..4 {
      vals[k] = fields[k+1].parse().map_err(|_| invalid_data(format!("Bad number in '{line}'")))?;
    }
    full.slots[idx] = slot_from_dump(vals[0], vals[1]);
    roi.slots[idx]  = slot_from_dump(vals[2], vals[3]);
    n_lines += 1;
  }
  if n_lines != NWORDS {
    warn!("Pedestal dump has {n_lines} lines, expected {NWORDS}!");
  }
  Ok((full, roi))
}

fn slot_from_dump(mean : f64, rms : f64) -> PedestalSlot {
  let mut slot = PedestalSlot::new();
  slot.mean = mean;
  slot.rms  = rms;
  if !mean.is_nan() {
    slot.n_valid = 1;
  }
  slot
}

/// Write a set of events recorded for one channel
pub fn write_event_dump<W : Write>(writer  : &mut W,
                                   channel : Channel,
                                   events  : &[EventRecord]) -> io::Result<()> {
  writeln!(writer, "# channel {} nevents {} created {}", channel, events.len(), Utc::now().to_rfc3339())?;
  for ev in events {
    let mut line = ev.stop_pointer.to_string();
    for s in &ev.samples {
      line += " ";
      line += &s.to_legacy().to_string();
    }
    writeln!(writer, "{}", line)?;
  }
  Ok(())
}
