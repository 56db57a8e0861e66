//! Word access to the board registers
//!
//! The transport (network, memory map, ...) is not
//! part of this crate. Everything here talks to the
//! board through a `RegisterPort`, which can read or
//! write exactly one 32bit word at a time. Both
//! calls block until the transport is done.

use std::error::Error;
use std::fmt;

/// A single register access failed
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterError {
  /// The transport reported a problem
  Transport(String),
  /// No answer from the board
  Timeout,
  /// Nothing lives at this address
  UnmappedAddress(u32),
}

impl fmt::Display for RegisterError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let etype = match self {
      RegisterError::Transport(msg)        => format!("Transport {msg}"),
      RegisterError::Timeout               => String::from("RegisterTimeOut"),
      RegisterError::UnmappedAddress(addr) => format!("UnmappedAddress {addr:#06x}"),
    };
    write!(f, "<RegisterError: {}>", etype)
  }
}

impl Error for RegisterError {
}

/// Single-word read/write access to the board
pub trait RegisterPort {
  /// Read the 32bit word at `addr`
  fn read(&mut self, addr : u32) -> Result<u32, RegisterError>;

  /// Write the 32bit word `value` to `addr`
  fn write(&mut self, addr : u32, value : u32) -> Result<(), RegisterError>;
}

impl<P : RegisterPort + ?Sized> RegisterPort for &mut P {
  fn read(&mut self, addr : u32) -> Result<u32, RegisterError> {
    (**self).read(addr)
  }

  fn write(&mut self, addr : u32, value : u32) -> Result<(), RegisterError> {
    (**self).write(addr, value)
  }
}

impl<P : RegisterPort + ?Sized> RegisterPort for Box<P> {
  fn read(&mut self, addr : u32) -> Result<u32, RegisterError> {
    (**self).read(addr)
  }

  fn write(&mut self, addr : u32, value : u32) -> Result<(), RegisterError> {
    (**self).write(addr, value)
  }
}
