//! Reading out the ADC buffer
//!
//! An acquisition stops the buffer writes, routes
//! the channel to the read-back path and issues a
//! read request. The buffer is then read word by
//! word through a single register, the firmware
//! advances the read address on its own.

use std::thread;
use std::time::Duration;

use lappd_dataclasses::channel::Channel;
use lappd_dataclasses::constants::NWORDS;
use lappd_dataclasses::errors::ParameterError;
use lappd_dataclasses::io::EventRecord;
use lappd_dataclasses::waveform::{
  decode_all,
  decode_word,
  rotate_to_stop_pointer,
};
use lappd_dataclasses::Sample;

use crate::control::LappdBoard;
use crate::errors::LappdError;
use crate::port::RegisterPort;

/// Upper limit for a single readout
pub const MAX_READOUT_WORDS : usize = 8192;

/// A capture reordered so that index 0 is the
/// slot the DRS stopped at
#[derive(Debug, Clone, PartialEq)]
pub struct RotatedCapture {
  pub stop_pointer : u16,
  pub words        : Vec<u32>,
}

impl RotatedCapture {
  pub fn decoded(&self) -> Vec<Sample> {
    decode_all(&self.words)
  }
}

/// Read `word_count` raw words for `channel`
pub fn acquire<P : RegisterPort>(board      : &mut LappdBoard<P>,
                                 channel    : Channel,
                                 word_count : usize) -> Result<Vec<u32>, LappdError> {
  if word_count == 0 || word_count > MAX_READOUT_WORDS {
    return Err(ParameterError::WordCountOutOfRange(word_count).into());
  }
  board.adc_buffer_stop()?;
  board.select_debug_channel(channel)?;
  board.read_request()?;
  let latency = board.settings().acquisition.trigger_latency_us;
  if latency > 0 {
    thread::sleep(Duration::from_micros(latency));
  }
  let readback = board.map().buffer_readback;
  let mut words = Vec::<u32>::with_capacity(word_count);
  for _ in 0..word_count {
    words.push(board.read(readback)?);
  }
  debug!("Read {word_count} words for {channel}");
  Ok(words)
}

/// Same as acquire, but decoded
pub fn acquire_decoded<P : RegisterPort>(board      : &mut LappdBoard<P>,
                                         channel    : Channel,
                                         word_count : usize) -> Result<Vec<Sample>, LappdError> {
  Ok(decode_all(&acquire(board, channel, word_count)?))
}

/// Acquire the ring buffer of `channel` and
/// rotate it to the stop pointer of its group
pub fn acquire_rotated<P : RegisterPort>(board   : &mut LappdBoard<P>,
                                         channel : Channel) -> Result<RotatedCapture, LappdError> {
  let n_words = board.settings().acquisition.roi_readout_words;
  let words = acquire(board, channel, n_words)?;
  let stop_pointer = board.read_stop_pointer(channel)?;
  trace!("{channel} : stop pointer {stop_pointer}");
  let words = rotate_to_stop_pointer(&words, stop_pointer)?;
  Ok(RotatedCapture { stop_pointer, words })
}

/// Pick the samples out of a full window readout.
///
/// Sample k sits at `offset + k*stride`.
pub fn full_window_samples(words  : &[u32],
                           offset : usize,
                           stride : usize) -> Result<Vec<Sample>, ParameterError> {
  let needed = offset + stride * (NWORDS - 1) + 1;
  if stride == 0 || words.len() < needed {
    return Err(ParameterError::BufferSizeMismatch { expected : needed, found : words.len() });
  }
  Ok((0..NWORDS).map(|k| decode_word(words[offset + k*stride])).collect())
}

/// One full window acquisition, decoded. The
/// status word in front of the samples is dropped
pub fn acquire_full<P : RegisterPort>(board   : &mut LappdBoard<P>,
                                      channel : Channel) -> Result<Vec<Sample>, LappdError> {
  let acq   = board.settings().acquisition.clone();
  let words = acquire(board, channel, acq.full_readout_words)?;
  Ok(full_window_samples(&words, acq.full_sample_offset, acq.full_sample_stride)?)
}

/// `n_events` rotated, decoded acquisitions,
/// e.g. for an event dump
pub fn record_events<P : RegisterPort>(board    : &mut LappdBoard<P>,
                                       channel  : Channel,
                                       n_events : usize) -> Result<Vec<EventRecord>, LappdError> {
  if n_events == 0 {
    return Err(ParameterError::EventCountOutOfRange(n_events).into());
  }
  let mut events = Vec::<EventRecord>::with_capacity(n_events);
  for _ in 0..n_events {
    let capture = acquire_rotated(board, channel)?;
    events.push(EventRecord {
      stop_pointer : capture.stop_pointer,
      samples      : capture.decoded(),
    });
  }
  info!("Recorded {n_events} events for {channel}");
  Ok(events)
}
