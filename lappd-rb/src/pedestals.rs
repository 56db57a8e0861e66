//! Pedestal estimation
//!
//! The DRS is put in transparent mode with DENABLE
//! on, then a number of events is acquired and the
//! samples are aggregated per slot.

use lappd_dataclasses::channel::Channel;
use lappd_dataclasses::errors::ParameterError;
use lappd_dataclasses::pedestal::{
  PedestalAccumulator,
  PedestalMode,
  PedestalTable,
};

use crate::acquisition::{
  acquire_full,
  acquire_rotated,
};
use crate::control::LappdBoard;
use crate::errors::LappdError;
use crate::port::RegisterPort;

/// Mean and rms per slot over `n_events` acquisitions
pub fn estimate<P : RegisterPort>(board    : &mut LappdBoard<P>,
                                  channel  : Channel,
                                  n_events : usize,
                                  mode     : PedestalMode) -> Result<PedestalTable, LappdError> {
  if n_events == 0 {
    return Err(ParameterError::EventCountOutOfRange(n_events).into());
  }
  board.drs_denable(true)?;
  board.drs_transparent_mode(true)?;
  let mut acc = PedestalAccumulator::new(mode);
  for k in 0..n_events {
    let samples = match mode {
      PedestalMode::Full => acquire_full(board, channel)?,
      PedestalMode::Roi  => acquire_rotated(board, channel)?.decoded(),
    };
    acc.add_event(&samples)?;
    trace!("{channel} : pedestal event {k}");
  }
  let table = acc.finish(Some(channel));
  let n_bad = table.slots.iter().filter(|s| !s.is_valid()).count();
  if n_bad > 0 {
    warn!("{channel} : {n_bad} slots without a single valid sample!");
  }
  info!("{channel} : {mode} pedestals from {n_events} events");
  Ok(table)
}

pub fn estimate_full<P : RegisterPort>(board    : &mut LappdBoard<P>,
                                       channel  : Channel,
                                       n_events : usize) -> Result<PedestalTable, LappdError> {
  estimate(board, channel, n_events, PedestalMode::Full)
}

pub fn estimate_roi<P : RegisterPort>(board    : &mut LappdBoard<P>,
                                      channel  : Channel,
                                      n_events : usize) -> Result<PedestalTable, LappdError> {
  estimate(board, channel, n_events, PedestalMode::Roi)
}
