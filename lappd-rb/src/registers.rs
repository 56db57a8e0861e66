//! Registers of the LAPPD board
//!
//! All registers are 32bit words. The board uses
//! an Addr8 address space, so consecutive registers
//! of an array are 4 bytes apart.
//!
//! The base offsets are configuration data (they
//! change with the firmware), so they live in the
//! `RegisterMap`, which is part of the settings.
//! What stays fixed are the bit positions in the
//! command and mode registers and the register
//! numbers of the ADC chips.

use std::fmt;

use lappd_dataclasses::channel::{
  AdcChip,
  Channel,
  N_SUB_CHANNELS,
};

//========== CMD register ===============
//
// bits are asserted for 1 clock cycle
//=======================================

pub const CMD_RESET_BIT      : u32 = 0; // reset signal
pub const CMD_ADC_TXTRG_BIT  : u32 = 3; // send TxTrig signal to ADCs
pub const CMD_ADC_RESET_BIT  : u32 = 4; // reset ADCs
pub const CMD_READREQ_BIT    : u32 = 6; // start DRS readout sequence
pub const CMD_RUNRESET_BIT   : u32 = 7; // reset run number and event building state machine

//========== MODE register ==============

pub const MODE_ADCBUF_WREN_BIT  : u32 = 0; // enable/disable ADC buffer which stores ADC samples
pub const MODE_DRS_TRANS_BIT    : u32 = 1; // DRS4 transparent mode on/off
pub const MODE_DRS_DENABLE_BIT  : u32 = 2; // DRS4 DENABLE signal
pub const MODE_TCA_ENA_BIT      : u32 = 3; // enable time calibration oscillator
pub const MODE_EB_FRDISABLE_BIT : u32 = 4; // disable packet fragmentation
pub const MODE_EXTTRG_EN_BIT    : u32 = 5; // enable external trigger
pub const MODE_DRS_REVRS_BIT    : u32 = 6; // reverse order of DRS stop samples

//========== ADC chip registers =========
//
// reachable through the ADC control window,
// see RegisterMap::adc_register
//=======================================

pub const ADC_REG_CHANNEL_MODE   : u32 = 0x1;
pub const ADC_REG_TEST_MODE      : u32 = 0x2;
pub const ADC_REG_SER_DATA_RATE  : u32 = 0x3;
pub const ADC_REG_MSB_FIRST      : u32 = 0x4;
pub const ADC_REG_CUSTOM_PATTERN : u32 = 0x5;
pub const ADC_REG_INIT           : u32 = 0xA;

/// Written to the base of the ADC control window
/// to allow reading back ADC registers
pub const ADC_CONTROL_READ_ENABLE : u32 = 0x2;

/// Valid bits of the stop pointer registers
pub const MASK_STOP_POINTER : u32 = 0x3FF;

/// Valid bits of the PLL lock register
pub const MASK_PLL_LOCK     : u32 = 0xFF;

/// Base offsets of all registers the calibration,
/// acquisition and bring-up code touches
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RegisterMap {
  /// command register, bits are asserted for one cycle
  pub cmd               : u32,
  /// number of DRS samples, <= 1024 means ROI mode
  pub adc_buf_num_words : u32,
  /// sample of the debug channel, compared against test patterns
  pub adc_debug_data    : u32,
  pub adc_frame_delay   : u32,
  /// bit-slip, one register per ADC chip
  pub bitslip           : u32,
  /// channel routed to the debug/read-back path
  pub adc_debug_chan    : u32,
  pub mode              : u32,
  pub drs_pll_lock      : u32,
  pub drs_ref_clk_ratio : u32,
  /// one "frame ok" bit per ADC chip
  pub adc_frame_status  : u32,
  /// IDELAY for the ADC data lines, one per
  /// sub-channel (pair of lanes), 16 per chip
  pub adc_data_delay    : u32,
  pub n_sample_packet   : u32,
  pub drs_valid_delay   : u32,
  /// stop sample, one per group of 8 channels
  pub drs_stop_sample   : u32,
  /// mask of ADC channels to be sent, one per ADC chip
  pub adc_chan_mask     : u32,
  /// window into the ADC chip registers
  pub adc_control       : u32,
  /// read-back of the ADC buffer, auto advancing
  pub buffer_readback   : u32,
  pub drs_config        : u32,
  pub drs_write_config  : u32,
}

impl RegisterMap {
  pub fn new() -> Self {
    Self {
      cmd               : 0x0320,
      adc_buf_num_words : 0x0328,
      adc_debug_data    : 0x0330,
      adc_frame_delay   : 0x0348,
      bitslip           : 0x0350,
      adc_debug_chan    : 0x0360,
      mode              : 0x0370,
      drs_pll_lock      : 0x0378,
      drs_ref_clk_ratio : 0x0390,
      adc_frame_status  : 0x03A8,
      adc_data_delay    : 0x0400,
      n_sample_packet   : 0x0610,
      drs_valid_delay   : 0x0620,
      drs_stop_sample   : 0x0650,
      adc_chan_mask     : 0x0670,
      adc_control       : 0x2000,
      buffer_readback   : 0x3000,
      drs_config        : 0x4000,
      drs_write_config  : 0x4004,
    }
  }

  /// Both lanes of a sub-channel share the register
  pub fn data_delay(&self, channel : Channel) -> u32 {
    let index = channel.chip().index() * N_SUB_CHANNELS as u32 + channel.lane() as u32 / 2;
    self.adc_data_delay + 4 * index
  }

  pub fn frame_delay(&self, line : AdcChip) -> u32 {
    self.adc_frame_delay + 4 * line.index()
  }

  pub fn bitslip(&self, line : AdcChip) -> u32 {
    self.bitslip + 4 * line.index()
  }

  pub fn stop_sample(&self, channel : Channel) -> u32 {
    self.drs_stop_sample + 4 * channel.drs_group() as u32
  }

  pub fn chan_mask(&self, chip : AdcChip) -> u32 {
    self.adc_chan_mask + 4 * chip.index()
  }

  /// Bit of the frame status register for this line
  pub fn frame_status_bit(&self, line : AdcChip) -> u32 {
    line.index()
  }

  /// Address of register `reg` (0..0xff) on ADC chip `chip`
  ///
  /// bit 10 selects the chip, the register number
  /// is a word index
  pub fn adc_register(&self, chip : AdcChip, reg : u32) -> u32 {
    self.adc_control | (chip.index() << 10) | (reg << 2)
  }
}

impl Default for RegisterMap {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for RegisterMap {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp = toml::to_string(self).unwrap_or(
      String::from("-- DESERIALIZATION ERROR! --"));
    write!(f, "<RegisterMap :\n{}>", disp)
  }
}
