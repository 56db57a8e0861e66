//! LAPPD readout board
//!
//! Calibration, acquisition and pedestal estimation
//! for the LAPPD digitizer board. The board is
//! reached through a `RegisterPort`, which reads and
//! writes single 32bit words. How the words travel
//! to the board is up to the implementor.
//!
//! A session typically looks like
//!
//! * `LappdBoard::new` with a port and settings
//! * `api::bring_up` to calibrate the ADC lanes
//!   and configure the DRS
//! * `api::measure_pedestals` for the baselines
//! * `api::read_waveform` or
//!   `acquisition::record_events` for data
//!
//! `sim::SimulatedBoard` is a port which emulates
//! the firmware in memory.

#[macro_use] extern crate log;

pub mod registers;
pub mod port;
pub mod errors;
pub mod settings;
pub mod control;
pub mod calibration;
pub mod acquisition;
pub mod pedestals;
pub mod api;
pub mod sim;

use std::io::Write;

use colored::{
  ColoredString,
  Colorize,
};
use log::Level;

pub use control::LappdBoard;
pub use errors::LappdError;
pub use port::{
  RegisterError,
  RegisterPort,
};
pub use settings::LappdSettings;

/// Colored, fixed width log level for the logger
pub fn color_log(level : &Level) -> ColoredString {
  match level {
    Level::Error    => String::from(" ERROR!").red(),
    Level::Warn     => String::from(" WARN  ").yellow(),
    Level::Info     => String::from(" Info  ").green(),
    Level::Debug    => String::from(" debug ").blue(),
    Level::Trace    => String::from(" trace ").cyan(),
  }
}

/// Set up the environmental (env) logger
/// with our format
///
/// Ensure that the lines and module paths
/// are printed in the logging output
pub fn init_env_logger() {
  env_logger::builder()
    .format(|buf, record| {
    writeln!( buf, "[{level}][{module_path}:{line}] {args}",
      level = color_log(&record.level()),
      module_path = record.module_path().unwrap_or("<unknown>"),
      line = record.line().unwrap_or(0),
      args = record.args()
      )
    }).init();
}
