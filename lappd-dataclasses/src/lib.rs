//! LAPPD dataclasses
//!
//! Types and algorithms for the LAPPD digitizer board
//! which do not need access to the board itself:
//!
//! * identifiers for ADC chips, channels and delay taps
//! * decoding of raw capture words
//! * selection of delay taps from a sweep
//! * pedestal tables
//! * text dumps
//!

#[macro_use] extern crate log;

pub mod constants;
pub mod errors;
pub mod channel;
pub mod waveform;
pub mod calibration;
pub mod pedestal;
pub mod io;

pub use channel::{
  AdcChip,
  Channel,
  DelayTap,
};
pub use waveform::Sample;
