//! Register level control of the board
//!
//! `LappdBoard` owns the register port and the
//! settings for one session. All helpers here are
//! thin wrappers around single register accesses,
//! parameters are checked before anything is
//! written.

use std::thread;
use std::time::Duration;

use lappd_dataclasses::channel::{
  AdcChip,
  Channel,
  DelayTap,
};
use lappd_dataclasses::constants::MASK_ADC_VALUE;
use lappd_dataclasses::errors::ParameterError;

use crate::errors::LappdError;
use crate::port::RegisterPort;
use crate::registers::*;
use crate::settings::LappdSettings;

/// Output of the test pattern generator
/// of the ADC chips
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AdcTestMode {
  Normal   = 0,
  Sync     = 1,
  Deskew   = 2,
  Custom   = 3,
  AllOnes  = 4,
  Toggle   = 5,
  AllZeros = 6,
  Ramp     = 7,
}

/// Lanes the test mode is applied to
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TestModeTarget {
  DataLanes,
  Frame,
}

impl TestModeTarget {
  fn shift(&self) -> u32 {
    match self {
      TestModeTarget::DataLanes => 7,
      TestModeTarget::Frame     => 13,
    }
  }
}

/// Serial data rate of the ADC chips in bits
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SerDataRate {
  Bits10,
  Bits12,
  Bits14,
  Bits16,
}

impl SerDataRate {
  fn code(&self) -> u32 {
    match self {
      SerDataRate::Bits10 => 0b011,
      SerDataRate::Bits12 => 0b000,
      SerDataRate::Bits14 => 0b001,
      SerDataRate::Bits16 => 0b100,
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AdcChannelMode {
  Ch16,
  Ch32,
}

impl AdcChannelMode {
  fn code(&self) -> u32 {
    match self {
      AdcChannelMode::Ch16 => (1 << 2) | (1 << 4),
      AdcChannelMode::Ch32 => 0,
    }
  }
}

/// One board session
pub struct LappdBoard<P : RegisterPort> {
  port     : P,
  settings : LappdSettings,
}

impl<P : RegisterPort> LappdBoard<P> {

  pub fn new(port : P, settings : LappdSettings) -> Result<Self, LappdError> {
    settings.validate()?;
    Ok(Self {
      port,
      settings,
    })
  }

  pub fn settings(&self) -> &LappdSettings {
    &self.settings
  }

  pub fn map(&self) -> &RegisterMap {
    &self.settings.register_map
  }

  pub fn port(&self) -> &P {
    &self.port
  }

  pub fn port_mut(&mut self) -> &mut P {
    &mut self.port
  }

  pub fn into_port(self) -> P {
    self.port
  }

  pub fn read(&mut self, addr : u32) -> Result<u32, LappdError> {
    let value = self.port.read(addr)?;
    trace!("READ {addr:#06x} -> {value:#010x}");
    Ok(value)
  }

  pub fn write(&mut self, addr : u32, value : u32) -> Result<(), LappdError> {
    trace!("WRITE {addr:#06x} <- {value:#010x}");
    self.port.write(addr, value)?;
    Ok(())
  }

  /// Read-modify-write of a single bit
  pub fn set_bit(&mut self, addr : u32, bit : u32, on : bool) -> Result<(), LappdError> {
    if bit > 31 {
      return Err(ParameterError::BitOutOfRange(bit).into());
    }
    let mut value = self.read(addr)?;
    if on {
      value |= 1 << bit;
    } else {
      value &= !(1 << bit);
    }
    self.write(addr, value)
  }

  pub fn get_bit(&mut self, addr : u32, bit : u32) -> Result<bool, LappdError> {
    if bit > 31 {
      return Err(ParameterError::BitOutOfRange(bit).into());
    }
    let value = self.read(addr)?;
    Ok((value >> bit) & 0x1 == 1)
  }

  fn pulse(&mut self, bit : u32) -> Result<(), LappdError> {
    let cmd = self.map().cmd;
    self.write(cmd, 1 << bit)
  }

  fn set_mode_bit(&mut self, bit : u32, on : bool) -> Result<(), LappdError> {
    let mode = self.map().mode;
    self.set_bit(mode, bit, on)
  }

  fn sleep_us(us : u64) {
    if us > 0 {
      thread::sleep(Duration::from_micros(us));
    }
  }

  //========== commands ==========

  pub fn reset(&mut self) -> Result<(), LappdError> {
    trace!("Reset!");
    self.pulse(CMD_RESET_BIT)
  }

  pub fn adc_tx_trigger(&mut self) -> Result<(), LappdError> {
    trace!("ADC TxTrig!");
    self.pulse(CMD_ADC_TXTRG_BIT)
  }

  pub fn adc_reset(&mut self) -> Result<(), LappdError> {
    trace!("ADC reset!");
    self.pulse(CMD_ADC_RESET_BIT)
  }

  /// Start the DRS readout sequence
  pub fn read_request(&mut self) -> Result<(), LappdError> {
    trace!("Read request!");
    self.pulse(CMD_READREQ_BIT)
  }

  pub fn run_reset(&mut self) -> Result<(), LappdError> {
    trace!("Run reset!");
    self.pulse(CMD_RUNRESET_BIT)
  }

  //========== mode ==========

  pub fn read_mode(&mut self) -> Result<u32, LappdError> {
    let mode = self.map().mode;
    self.read(mode)
  }

  pub fn adc_buffer_start(&mut self) -> Result<(), LappdError> {
    trace!("Enable ADC buffer writes!");
    self.set_mode_bit(MODE_ADCBUF_WREN_BIT, true)
  }

  pub fn adc_buffer_stop(&mut self) -> Result<(), LappdError> {
    trace!("Disable ADC buffer writes!");
    self.set_mode_bit(MODE_ADCBUF_WREN_BIT, false)
  }

  pub fn drs_transparent_mode(&mut self, on : bool) -> Result<(), LappdError> {
    trace!("DRS transparent mode {on}");
    self.set_mode_bit(MODE_DRS_TRANS_BIT, on)
  }

  pub fn drs_denable(&mut self, on : bool) -> Result<(), LappdError> {
    trace!("DRS DENABLE {on}");
    self.set_mode_bit(MODE_DRS_DENABLE_BIT, on)
  }

  /// Time calibration oscillator
  pub fn drs_time_calib_osc(&mut self, on : bool) -> Result<(), LappdError> {
    trace!("DRS time calibration oscillator {on}");
    self.set_mode_bit(MODE_TCA_ENA_BIT, on)
  }

  pub fn select_debug_channel(&mut self, channel : Channel) -> Result<(), LappdError> {
    trace!("Select debug channel {channel}");
    let addr = self.map().adc_debug_chan;
    self.write(addr, channel.id() as u32)
  }

  //========== ADC chips ==========

  pub fn set_adc_reg(&mut self, chip : AdcChip, reg : u32, value : u32) -> Result<(), LappdError> {
    if reg > 0xFF {
      return Err(ParameterError::AdcRegisterOutOfRange(reg).into());
    }
    if value > 0xFFFF {
      return Err(ParameterError::AdcValueOutOfRange(value).into());
    }
    let addr = self.map().adc_register(chip, reg);
    self.write(addr, value)
  }

  /// Read back an ADC register. Read-back is
  /// switched on for the access and off afterwards
  pub fn get_adc_reg(&mut self, chip : AdcChip, reg : u32) -> Result<u32, LappdError> {
    if reg > 0xFF {
      return Err(ParameterError::AdcRegisterOutOfRange(reg).into());
    }
    let base = self.map().adc_control;
    let addr = self.map().adc_register(chip, reg);
    self.write(base, ADC_CONTROL_READ_ENABLE)?;
    let value = self.read(addr)?;
    self.write(base, 0)?;
    Ok(value)
  }

  pub fn adc_init(&mut self, chip : AdcChip) -> Result<(), LappdError> {
    debug!("Init {chip}");
    self.set_adc_reg(chip, ADC_REG_INIT, 0b11 << 12)
  }

  pub fn adc_test_mode(&mut self, chip : AdcChip, mode : AdcTestMode, target : TestModeTarget) -> Result<(), LappdError> {
    debug!("{chip} test mode {mode:?} for {target:?}");
    self.set_adc_reg(chip, ADC_REG_TEST_MODE, (mode as u32) << target.shift())
  }

  /// Program the custom test pattern (12bit)
  pub fn adc_set_test_pattern(&mut self, chip : AdcChip, pattern : u16) -> Result<(), LappdError> {
    if pattern > MASK_ADC_VALUE {
      return Err(ParameterError::TestPatternOutOfRange(pattern as u32).into());
    }
    self.set_adc_reg(chip, ADC_REG_CUSTOM_PATTERN, (pattern as u32) << 4)
  }

  pub fn adc_ser_data_rate(&mut self, chip : AdcChip, rate : SerDataRate) -> Result<(), LappdError> {
    self.set_adc_reg(chip, ADC_REG_SER_DATA_RATE, rate.code() << 13)
  }

  pub fn adc_channel_mode(&mut self, chip : AdcChip, mode : AdcChannelMode) -> Result<(), LappdError> {
    self.set_adc_reg(chip, ADC_REG_CHANNEL_MODE, mode.code())
  }

  pub fn adc_msb_first(&mut self, chip : AdcChip, on : bool) -> Result<(), LappdError> {
    self.set_adc_reg(chip, ADC_REG_MSB_FIRST, (on as u32) << 4)
  }

  //========== delays ==========

  pub fn set_data_delay(&mut self, channel : Channel, tap : DelayTap) -> Result<(), LappdError> {
    let addr = self.map().data_delay(channel);
    self.write(addr, tap.value() as u32)?;
    Self::sleep_us(self.settings.calibration.tap_settle_us);
    Ok(())
  }

  pub fn set_frame_delay(&mut self, line : AdcChip, tap : DelayTap) -> Result<(), LappdError> {
    let addr = self.map().frame_delay(line);
    self.write(addr, tap.value() as u32)?;
    Self::sleep_us(self.settings.calibration.tap_settle_us);
    Ok(())
  }

  /// Slip the flagged sub-channels by one bit
  pub fn write_bitslip(&mut self, line : AdcChip, mask : u32) -> Result<(), LappdError> {
    debug!("Bitslip {line} mask {mask:#018b}");
    let addr = self.map().bitslip(line);
    self.write(addr, mask)
  }

  pub fn frame_status_ok(&mut self, line : AdcChip) -> Result<bool, LappdError> {
    let addr = self.map().adc_frame_status;
    let bit  = self.map().frame_status_bit(line);
    self.get_bit(addr, bit)
  }

  /// Ring buffer position where the DRS stopped
  /// for the group of this channel
  pub fn read_stop_pointer(&mut self, channel : Channel) -> Result<u16, LappdError> {
    let addr = self.map().stop_sample(channel);
    let value = self.read(addr)?;
    Ok((value & MASK_STOP_POINTER) as u16)
  }

  //========== DRS ==========

  pub fn drs_set_config(&mut self, config : u32) -> Result<(), LappdError> {
    trace!("DRS config {config:#x}");
    let addr = self.map().drs_config;
    self.write(addr, config)
  }

  pub fn drs_set_write_config(&mut self, config : u32) -> Result<(), LappdError> {
    trace!("DRS write config {config:#x}");
    let addr = self.map().drs_write_config;
    self.write(addr, config)
  }

  pub fn set_drs_ref_clk_ratio(&mut self, ratio : u32) -> Result<(), LappdError> {
    let addr = self.map().drs_ref_clk_ratio;
    self.write(addr, ratio)
  }

  /// Lock status of the DRS PLL, zero means
  /// not locked
  pub fn pll_status(&mut self) -> Result<u32, LappdError> {
    let addr = self.map().drs_pll_lock;
    Ok(self.read(addr)? & MASK_PLL_LOCK)
  }

  pub fn pll_locked(&mut self) -> Result<bool, LappdError> {
    Ok(self.pll_status()? != 0)
  }

  /// Number of DRS words, <= 1024 means ROI mode
  pub fn set_readout_words(&mut self, n_words : u32) -> Result<(), LappdError> {
    let addr = self.map().adc_buf_num_words;
    self.write(addr, n_words)
  }

  pub fn set_packet_samples(&mut self, n_samples : u32) -> Result<(), LappdError> {
    let addr = self.map().n_sample_packet;
    self.write(addr, n_samples)
  }

  pub fn set_drs_valid_delay(&mut self, delay : u32) -> Result<(), LappdError> {
    let addr = self.map().drs_valid_delay;
    self.write(addr, delay)
  }

  pub fn set_adc_channel_mask(&mut self, chip : AdcChip, mask : u32) -> Result<(), LappdError> {
    let addr = self.map().chan_mask(chip);
    self.write(addr, mask)
  }
}
