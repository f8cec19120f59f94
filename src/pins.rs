//! GPIO / peripheral assignments for the controller board.
//!
//! Every driver references this module rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Feedback DAC
// ---------------------------------------------------------------------------

/// DAC1 output, summed into the buck converter's feedback divider.
pub const FEEDBACK_DAC_GPIO: i32 = 25;
/// `dac_channel_t` for GPIO25 on the ESP32.
pub const FEEDBACK_DAC_CHANNEL: u32 = 0;

// ---------------------------------------------------------------------------
// I2C bus (INA219)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
/// Bus clock.  The INA219 supports fast mode.
pub const I2C_FREQ_HZ: u32 = 400_000;
