//! Memory layout contract shared by the host and the engine.
//!
//! All cell indices are in [`crate::ShortWord`] units relative to the start of the
//! [`crate::MemoryWindow`]. Program images address these cells directly, so the values here are
//! part of the binary contract with existing machine code.

/// Cells of engine RAM mirrored into the host-visible window.
pub const RAM_CELLS: usize = 24577;

/// Instruction words in program ROM. Each machine-code stream is one byte lane of the ROM.
pub const ROM_WORDS: usize = 32768;

/// First display cell. It holds the rightmost digit; digits further left follow at higher cells.
pub const DISPLAY_BASE: usize = 16384;

/// Number of seven-segment digits on the display.
pub const NUM_DIGITS: usize = 13;

/// Cell the host publishes the current key code into (directly after the display).
pub const KEY_CELL: usize = DISPLAY_BASE + NUM_DIGITS;

/// Alignment of host-side heap allocations.
pub const HEAP_ALIGN: usize = 8;

const _: () = assert!(KEY_CELL < RAM_CELLS);
const _: () = assert!(HEAP_ALIGN.is_power_of_two());
