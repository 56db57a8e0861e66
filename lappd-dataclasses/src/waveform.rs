//! Decoding of raw capture words
//!
//! The ADC buffer read-back delivers one 16bit word
//! per sample:
//!
//! * bits [3:0]  : status/flag nibble
//! * bits [15:4] : 12bit value, two's complement
//!                 if the flag nibble is 0
//!
//! A flag of 1 marks an underflow, every other
//! non-zero flag an overflow.

use std::fmt;

use crate::constants::{
  MASK_ADC_FLAG,
  MASK_ADC_VALUE,
  NWORDS,
  SENTINEL_OVERFLOW,
  SENTINEL_UNDERFLOW,
};
use crate::errors::ParameterError;

/// A decoded sample
///
/// Out-of-range samples are tagged, so they can
/// never end up in an average by accident.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Sample {
  /// Signed ADC value, -2048..2047
  Valid(i16),
  Underflow,
  Overflow,
}

impl Sample {
  pub fn value(&self) -> Option<i16> {
    match self {
      Sample::Valid(v) => Some(*v),
      _                => None,
    }
  }

  pub fn is_valid(&self) -> bool {
    matches!(self, Sample::Valid(_))
  }

  /// The value as written into text dumps,
  /// using the -9999/+9999 markers
  pub fn to_legacy(&self) -> i32 {
    match self {
      Sample::Valid(v)  => *v as i32,
      Sample::Underflow => SENTINEL_UNDERFLOW,
      Sample::Overflow  => SENTINEL_OVERFLOW,
    }
  }
}

impl fmt::Display for Sample {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.to_legacy())
  }
}

/// The 12bit value field of a raw word
#[inline]
pub fn raw_value(raw : u16) -> u16 {
  (raw >> 4) & MASK_ADC_VALUE
}

/// The 4bit flag nibble of a raw word
#[inline]
pub fn raw_flag(raw : u16) -> u16 {
  raw & MASK_ADC_FLAG
}

/// Decode a single raw capture word
pub fn decode(raw : u16) -> Sample {
  let value = raw_value(raw);
  match raw_flag(raw) {
    0 => {
      if value & (1 << 11) != 0 {
        Sample::Valid(value as i16 - 4096)
      } else {
        Sample::Valid(value as i16)
      }
    }
    1 => Sample::Underflow,
    _ => Sample::Overflow,
  }
}

/// Decode a register read-back word. Only the
/// lower 16 bit carry the sample.
#[inline]
pub fn decode_word(word : u32) -> Sample {
  decode((word & 0xFFFF) as u16)
}

/// Decode a whole capture
pub fn decode_all(words : &[u32]) -> Vec<Sample> {
  words.iter().map(|w| decode_word(*w)).collect()
}

/// Put a ring-buffer capture into chronological
/// order.
///
/// The output starts at the stop pointer,
/// `output[i] = input[(stop + i) % 1024]`.
pub fn rotate_to_stop_pointer<T : Clone>(buffer       : &[T],
                                         stop_pointer : u16)
  -> Result<Vec<T>, ParameterError> {
  if buffer.len() != NWORDS {
    return Err(ParameterError::BufferSizeMismatch { expected : NWORDS, found : buffer.len() });
  }
  if stop_pointer as usize >= NWORDS {
    return Err(ParameterError::StopPointerOutOfRange(stop_pointer as u32));
  }
  let mut rotated = buffer.to_vec();
  rotated.rotate_left(stop_pointer as usize);
  Ok(rotated)
}
