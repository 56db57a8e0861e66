//! A board which only exists in memory
//!
//! `SimulatedBoard` implements `RegisterPort` on
//! top of a plain register store and emulates the
//! parts of the firmware which the calibration and
//! the acquisition rely on:
//!
//! * every data lane samples the test pattern
//!   correctly only for a set of "good" delay taps
//! * sub-channels can be bit misaligned, every
//!   bit-slip shifts them by one position
//! * the frame status bit is good only for a set
//!   of frame delay taps
//! * read requests load a prepared capture for the
//!   debug channel into the read-back register and
//!   set the stop pointer of its group
//!
//! Everything is deterministic, there is no noise
//! apart from explicitly requested glitches.

use std::collections::HashMap;

use lappd_dataclasses::channel::{
  AdcChip,
  Channel,
};
use lappd_dataclasses::constants::{
  ADC_NBITS,
  MASK_ADC_VALUE,
  NCHN,
  N_ADC_CHIPS,
  N_DELAY_TAPS,
};
use lappd_dataclasses::channel::N_SUB_CHANNELS;

use crate::port::{
  RegisterError,
  RegisterPort,
};
use crate::registers::*;

/// Prepared readout for one read request
#[derive(Debug, Clone, PartialEq)]
pub struct SimCapture {
  pub stop_pointer : u16,
  pub words        : Vec<u32>,
}

pub struct SimulatedBoard {
  map             : RegisterMap,
  store           : HashMap<u32, u32>,
  writes          : Vec<(u32, u32)>,
  n_reads         : usize,
  /// good delay taps per channel
  lane_taps       : Vec<Vec<bool>>,
  /// good frame delay taps per chip
  frame_taps      : Vec<Vec<bool>>,
  /// bit offset per chip and sub-channel,
  /// aligned at 0
  slip_offset     : [[u32;N_SUB_CHANNELS];N_ADC_CHIPS],
  glitches        : usize,
  pll_status      : u32,
  captures        : HashMap<u8, Vec<SimCapture>>,
  next_capture    : HashMap<u8, usize>,
  readback        : Vec<u32>,
  readback_pos    : usize,
}

impl SimulatedBoard {

  /// All lanes good for taps 8..20, frames good
  /// for taps 10..20, everything aligned and the
  /// PLL locked.
  pub fn new(map : RegisterMap) -> Self {
    let mut board = Self {
      map,
      store        : HashMap::<u32, u32>::new(),
      writes       : Vec::<(u32, u32)>::new(),
      n_reads      : 0,
      lane_taps    : vec![vec![false;N_DELAY_TAPS];NCHN],
      frame_taps   : vec![vec![false;N_DELAY_TAPS];N_ADC_CHIPS],
      slip_offset  : [[0;N_SUB_CHANNELS];N_ADC_CHIPS],
      glitches     : 0,
      pll_status   : 0xFF,
      captures     : HashMap::<u8, Vec<SimCapture>>::new(),
      next_capture : HashMap::<u8, usize>::new(),
      readback     : Vec::<u32>::new(),
      readback_pos : 0,
    };
    for ch in Channel::all() {
      board.set_lane_window(ch, 8, 20);
    }
    for chip in AdcChip::ALL {
      board.set_frame_window(chip, 10, 20);
    }
    board
  }

  /// All writes in the order they happened
  pub fn writes(&self) -> &[(u32, u32)] {
    &self.writes
  }

  pub fn writes_to(&self, addr : u32) -> Vec<u32> {
    self.writes.iter().filter(|(a, _)| *a == addr).map(|(_, v)| *v).collect()
  }

  pub fn n_reads(&self) -> usize {
    self.n_reads
  }

  pub fn clear_log(&mut self) {
    self.writes.clear();
    self.n_reads = 0;
  }

  /// Current content of a register
  pub fn peek(&self, addr : u32) -> u32 {
    self.store.get(&addr).copied().unwrap_or(0)
  }

  pub fn set_lane_taps(&mut self, channel : Channel, good : Vec<bool>) {
    self.lane_taps[channel.id() as usize] = good;
  }

  /// Lane is good for all taps in [first, last]
  pub fn set_lane_window(&mut self, channel : Channel, first : usize, last : usize) {
    let good = (0..N_DELAY_TAPS).map(|k| k >= first && k <= last).collect();
    self.set_lane_taps(channel, good);
  }

  pub fn set_frame_taps(&mut self, line : AdcChip, good : Vec<bool>) {
    self.frame_taps[line.index() as usize] = good;
  }

  pub fn set_frame_window(&mut self, line : AdcChip, first : usize, last : usize) {
    let good = (0..N_DELAY_TAPS).map(|k| k >= first && k <= last).collect();
    self.set_frame_taps(line, good);
  }

  /// The sub-channel needs `slips` bit-slips
  /// until it is aligned again
  pub fn set_misalignment(&mut self, chip : AdcChip, sub : usize, slips : u32) {
    let n_bits = ADC_NBITS;
    self.slip_offset[chip.index() as usize][sub] = (n_bits - slips % n_bits) % n_bits;
  }

  pub fn is_aligned(&self, chip : AdcChip, sub : usize) -> bool {
    self.slip_offset[chip.index() as usize][sub] == 0
  }

  /// The next `n` debug reads return garbage
  pub fn glitch_debug_reads(&mut self, n : usize) {
    self.glitches = n;
  }

  pub fn set_pll_status(&mut self, status : u32) {
    self.pll_status = status;
  }

  /// Captures served in turn for read requests
  /// on this channel
  pub fn set_captures(&mut self, channel : Channel, captures : Vec<SimCapture>) {
    self.captures.insert(channel.id(), captures);
    self.next_capture.insert(channel.id(), 0);
  }

  fn debug_channel(&self) -> Option<Channel> {
    Channel::new(self.peek(self.map.adc_debug_chan) as u8).ok()
  }

  fn debug_data(&mut self) -> u32 {
    let channel = match self.debug_channel() {
      None     => return 0,
      Some(ch) => ch,
    };
    let chip    = channel.chip();
    let pattern = (self.peek(self.map.adc_register(chip, ADC_REG_CUSTOM_PATTERN)) >> 4) & MASK_ADC_VALUE as u32;
    if self.glitches > 0 {
      self.glitches -= 1;
      return pattern ^ 0x001;
    }
    let tap = self.peek(self.map.data_delay(channel)) as usize;
    let good_tap = self.lane_taps[channel.id() as usize].get(tap).copied().unwrap_or(false);
    if !good_tap {
      return pattern ^ 0x0F0;
    }
    // only even lanes have a sub-channel
    let lane = channel.lane() as usize;
    if lane % 2 == 0 {
      let offset = self.slip_offset[chip.index() as usize][lane / 2];
      if offset != 0 {
        let mask = MASK_ADC_VALUE as u32;
        return ((pattern << offset) | (pattern >> (ADC_NBITS - offset))) & mask;
      }
    }
    pattern
  }

  fn frame_status(&self) -> u32 {
    let mut status = 0u32;
    for chip in AdcChip::ALL {
      let tap = self.peek(self.map.frame_delay(chip)) as usize;
      if self.frame_taps[chip.index() as usize].get(tap).copied().unwrap_or(false) {
        status |= 1 << self.map.frame_status_bit(chip);
      }
    }
    status
  }

  fn bitslip(&mut self, chip : AdcChip, mask : u32) {
    for sub in 0..N_SUB_CHANNELS {
      if mask & (1 << sub) != 0 {
        let offset = &mut self.slip_offset[chip.index() as usize][sub];
        *offset = (*offset + 1) % ADC_NBITS;
      }
    }
  }

  fn read_request(&mut self) {
    self.readback.clear();
    self.readback_pos = 0;
    let channel = match self.debug_channel() {
      None     => return,
      Some(ch) => ch,
    };
    let captures = match self.captures.get(&channel.id()) {
      Some(c) if !c.is_empty() => c,
      _ => return,
    };
    let idx     = self.next_capture.get(&channel.id()).copied().unwrap_or(0) % captures.len();
    let capture = captures[idx].clone();
    self.next_capture.insert(channel.id(), idx + 1);
    self.store.insert(self.map.stop_sample(channel), capture.stop_pointer as u32);
    self.readback = capture.words;
  }

  fn command(&mut self, value : u32) {
    if value & (1 << CMD_READREQ_BIT) != 0 {
      self.read_request();
    }
    if value & (1 << CMD_RESET_BIT) != 0 {
      self.store.clear();
    }
  }
}

impl RegisterPort for SimulatedBoard {

  fn read(&mut self, addr : u32) -> Result<u32, RegisterError> {
    self.n_reads += 1;
    if addr == self.map.adc_debug_data {
      return Ok(self.debug_data());
    }
    if addr == self.map.adc_frame_status {
      return Ok(self.frame_status());
    }
    if addr == self.map.drs_pll_lock {
      return Ok(self.pll_status);
    }
    if addr == self.map.cmd {
      return Ok(0);
    }
    if addr == self.map.buffer_readback {
      let word = self.readback.get(self.readback_pos).copied().unwrap_or(0);
      self.readback_pos += 1;
      return Ok(word);
    }
    Ok(self.peek(addr))
  }

  fn write(&mut self, addr : u32, value : u32) -> Result<(), RegisterError> {
    self.writes.push((addr, value));
    if addr == self.map.cmd {
      self.command(value);
      return Ok(());
    }
    for chip in AdcChip::ALL {
      if addr == self.map.bitslip(chip) {
        self.bitslip(chip, value);
      }
    }
    self.store.insert(addr, value);
    Ok(())
  }
}
