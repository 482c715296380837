//! Memory-mapped peripherals of the calculator machine.
//!
//! - [`display`]: decodes the display cells of the [`MemoryWindow`] into seven-segment digits.
//! - [`keyboard`]: maps host input to the engine's closed key-code set and publishes it into the
//!   key cell.
//!
//! [`MemoryWindow`]: hackcalc_shared::MemoryWindow

#![forbid(unsafe_code)]

pub mod display;
pub mod keyboard;

pub use display::{Digit, DisplayDecoder, DisplayState, Segment, Segments};
pub use keyboard::{encode, encode_char, KeyCode, KeySample, Keypad};
