//! Settings for calibration, acquisition and
//! bring-up of a single board
//!
//! The settings can be written to and read
//! from toml files, all fields have sensible
//! defaults for the current firmware.

use std::fmt;
use std::fs::File;
use std::io::{
  Read,
  Write,
};

use lappd_dataclasses::calibration::IterationPolicy;
use lappd_dataclasses::constants::{
  MASK_ADC_VALUE,
  NCHN,
  NWORDS,
};
use lappd_dataclasses::channel::N_SUB_CHANNELS;
use lappd_dataclasses::errors::{
  ParameterError,
  SettingsError,
};

use crate::acquisition::MAX_READOUT_WORDS;
use crate::registers::RegisterMap;

/// Settings for the pattern verification, the
/// delay scans and the bit alignment
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CalibrationSettings {
  /// number of consecutive debug reads which
  /// all have to match the pattern
  pub pattern_samples          : usize,
  /// test patterns (12bit), the first one is the
  /// primary pattern. A tap has to pass all of them
  pub test_patterns            : Vec<u16>,
  /// wait time after writing a delay tap
  pub tap_settle_us            : u64,
  pub bit_align_max_iterations : u32,
  /// number of scanned sub-channels per ADC chip
  pub sub_channels_per_chip    : u8,
}

impl CalibrationSettings {
  pub fn new() -> Self {
    Self {
      pattern_samples          : 100,
      test_patterns            : vec![0xABC, 0x543],
      tap_settle_us            : 100,
      bit_align_max_iterations : 10,
      sub_channels_per_chip    : N_SUB_CHANNELS as u8,
    }
  }

  pub fn primary_pattern(&self) -> Result<u16, ParameterError> {
    self.test_patterns.first().copied().ok_or(ParameterError::NoTestPattern)
  }

  pub fn iteration_policy(&self) -> Result<IterationPolicy, ParameterError> {
    IterationPolicy::new(self.bit_align_max_iterations)
  }

  pub fn validate(&self) -> Result<(), ParameterError> {
    if self.pattern_samples == 0 {
      return Err(ParameterError::SampleCountOutOfRange(0));
    }
    if self.test_patterns.is_empty() {
      return Err(ParameterError::NoTestPattern);
    }
    for pat in &self.test_patterns {
      if *pat > MASK_ADC_VALUE {
        return Err(ParameterError::TestPatternOutOfRange(*pat as u32));
      }
    }
    if self.sub_channels_per_chip == 0 || self.sub_channels_per_chip as usize > N_SUB_CHANNELS {
      return Err(ParameterError::SubChannelOutOfRange(self.sub_channels_per_chip as u32));
    }
    self.iteration_policy()?;
    Ok(())
  }
}

impl Default for CalibrationSettings {
  fn default() -> Self {
    Self::new()
  }
}

/// Layout of the readout window
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AcquisitionSettings {
  /// wait time between read request and
  /// reading the buffer
  pub trigger_latency_us : u64,
  /// words read in full window mode. The
  /// samples are preceded by a status word
  pub full_readout_words : usize,
  /// index of the first sample in the full window
  pub full_sample_offset : usize,
  pub full_sample_stride : usize,
  pub roi_readout_words  : usize,
}

impl AcquisitionSettings {
  pub fn new() -> Self {
    Self {
      trigger_latency_us : 1000,
      full_readout_words : NWORDS + 1,
      full_sample_offset : 1,
      full_sample_stride : 1,
      roi_readout_words  : NWORDS,
    }
  }

  pub fn validate(&self) -> Result<(), ParameterError> {
    if self.full_readout_words == 0 || self.full_readout_words > MAX_READOUT_WORDS {
      return Err(ParameterError::WordCountOutOfRange(self.full_readout_words));
    }
    if self.full_sample_stride == 0 {
      return Err(ParameterError::WordCountOutOfRange(0));
    }
    // the last sample has to be inside the window
    let last = self.full_sample_offset + self.full_sample_stride * (NWORDS - 1);
    if last >= self.full_readout_words {
      return Err(ParameterError::BufferSizeMismatch {
        expected : last + 1,
        found    : self.full_readout_words
      });
    }
    if self.roi_readout_words != NWORDS {
      return Err(ParameterError::WordCountOutOfRange(self.roi_readout_words));
    }
    Ok(())
  }
}

impl Default for AcquisitionSettings {
  fn default() -> Self {
    Self::new()
  }
}

/// Values written during bring-up after the
/// ADC calibration
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DrsSettings {
  pub config           : u32,
  /// wait time before checking the PLL lock
  pub pll_settle_ms    : u64,
  pub valid_delay      : u32,
  pub packet_samples   : u32,
  /// channel left in the debug path after bring-up
  pub debug_channel    : u8,
  /// channels to be sent, one mask per ADC chip
  pub adc_channel_masks : [u32;2],
  pub readout_words    : u32,
}

impl DrsSettings {
  pub fn new() -> Self {
    Self {
      config            : 0xFF,
      pll_settle_ms     : 10,
      valid_delay       : 44,
      packet_samples    : 512,
      debug_channel     : 15,
      adc_channel_masks : [1 << 15, 1 << 23],
      readout_words     : (NWORDS + 1) as u32,
    }
  }

  pub fn validate(&self) -> Result<(), ParameterError> {
    if self.debug_channel as usize >= NCHN {
      return Err(ParameterError::ChannelOutOfRange(self.debug_channel as u32));
    }
    if self.readout_words == 0 || self.readout_words as usize > MAX_READOUT_WORDS {
      return Err(ParameterError::WordCountOutOfRange(self.readout_words as usize));
    }
    Ok(())
  }
}

impl Default for DrsSettings {
  fn default() -> Self {
    Self::new()
  }
}

/// All settings for a board session
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LappdSettings {
  /// default number of events for pedestals
  pub pedestal_events : usize,
  pub register_map    : RegisterMap,
  pub calibration     : CalibrationSettings,
  pub acquisition     : AcquisitionSettings,
  pub drs             : DrsSettings,
}

impl LappdSettings {
  pub fn new() -> Self {
    Self {
      pedestal_events : 100,
      register_map    : RegisterMap::new(),
      calibration     : CalibrationSettings::new(),
      acquisition     : AcquisitionSettings::new(),
      drs             : DrsSettings::new(),
    }
  }

  /// Same as new, but without any waiting.
  /// For the simulated board.
  pub fn for_simulation() -> Self {
    let mut settings = Self::new();
    settings.calibration.tap_settle_us      = 0;
    settings.acquisition.trigger_latency_us = 0;
    settings.drs.pll_settle_ms              = 0;
    settings
  }

  pub fn validate(&self) -> Result<(), ParameterError> {
    if self.pedestal_events == 0 {
      return Err(ParameterError::EventCountOutOfRange(0));
    }
    self.calibration.validate()?;
    self.acquisition.validate()?;
    self.drs.validate()?;
    Ok(())
  }

  /// Write settings to a toml file
  pub fn to_toml(&self, mut filename : String) -> Result<(), SettingsError> {
    if !filename.ends_with(".toml") {
      filename += ".toml";
    }
    info!("Will write to file {}!", filename);
    let toml_string = toml::to_string_pretty(&self)
      .map_err(|err| SettingsError::TomlEncodingError(err.to_string()))?;
    let mut file = File::create(&filename).map_err(|err| {
      error!("Unable to open file {}! {}", filename, err);
      SettingsError::Io(err.to_string())
    })?;
    file.write_all(toml_string.as_bytes())
      .map_err(|err| SettingsError::Io(err.to_string()))?;
    debug!("Wrote settings to {}!", filename);
    Ok(())
  }

  /// Write settings to a json file
  pub fn to_json(&self, mut filename : String) -> Result<(), SettingsError> {
    if !filename.ends_with(".json") {
      filename += ".json";
    }
    info!("Will write to file {}!", filename);
    let file = File::create(&filename).map_err(|err| {
      error!("Unable to open file {}! {}", filename, err);
      SettingsError::Io(err.to_string())
    })?;
    serde_json::to_writer_pretty(file, &self)
      .map_err(|err| SettingsError::JsonEncodingError(err.to_string()))?;
    debug!("Wrote settings to {}!", filename);
    Ok(())
  }

  /// Read settings from a toml file
  pub fn from_toml(filename : String) -> Result<LappdSettings, SettingsError> {
    let mut file = File::open(&filename).map_err(|err| {
      error!("Unable to open {}! {}", filename, err);
      SettingsError::Io(err.to_string())
    })?;
    let mut toml_string = String::from("");
    file.read_to_string(&mut toml_string).map_err(|err| {
      error!("Unable to read {}! {}", filename, err);
      SettingsError::Io(err.to_string())
    })?;
    toml::from_str(&toml_string).map_err(|err| {
      error!("Can't interpret toml! {}", err);
      SettingsError::TomlDecodingError(err.to_string())
    })
  }
  pub fn from_json(filename : String) -> Result<LappdSettings, SettingsError> {
    let file = File::open(&filename).map_err(|err| {
      error!("Unable to open {}! {}", filename, err);
      SettingsError::Io(err.to_string())
    })?;
    serde_json::from_reader(file).map_err(|err| {
      error!("Can't interpret json! {}", err);
      SettingsError::JsonDecodingError(err.to_string())
    })
  }

}

impl Default for LappdSettings {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for LappdSettings {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp = toml::to_string(self).unwrap_or(
      String::from("-- DESERIALIZATION ERROR! --"));
    write!(f, "<LappdSettings :\n{}>", disp)
  }
}
