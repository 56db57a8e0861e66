//! Global constants for the LAPPD digitizer
//!
//! These describe the hardware (ring buffer size,
//! ADC resolution, delay line length). Register
//! addresses are NOT defined here, they are part
//! of the settings of the readout board.
//!

/// Number of ADC chips on the board
pub const N_ADC_CHIPS         : usize = 2;

/// Number of data lanes per ADC chip
pub const N_LANES_PER_CHIP    : usize = 32;

/// Number of channels in total (2 ADC chips x 32 lanes)
pub const NCHN                : usize = N_ADC_CHIPS * N_LANES_PER_CHIP;

/// Number of channels which share one stop pointer
/// of the sampling chip
pub const N_CHN_PER_DRS_GROUP : usize = 8;

/// Number of slots in the ring buffer of the
/// switched-capacitor sampling chip
pub const NWORDS              : usize = 1024;

/// Largest delay tap the IDELAY lines accept
pub const MAX_DELAY_TAP       : u8 = 31;

/// Number of distinct delay taps (0..=31)
pub const N_DELAY_TAPS        : usize = MAX_DELAY_TAP as usize + 1;

/// Bit width of the ADC value field
pub const ADC_NBITS           : u32 = 12;

/// Mask for the 12bit ADC value field
pub const MASK_ADC_VALUE      : u16 = 0x0FFF;

/// Mask for the 4bit status/flag nibble
pub const MASK_ADC_FLAG       : u16 = 0x000F;

/// Legacy marker for an underflowing sample,
/// only used in the text dumps.
pub const SENTINEL_UNDERFLOW  : i32 = -9999;

/// Legacy marker for an overflowing sample,
/// only used in the text dumps.
pub const SENTINEL_OVERFLOW   : i32 = 9999;
