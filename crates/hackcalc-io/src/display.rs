//! Seven-segment display decoding.
//!
//! Each display cell holds one digit code in its low byte:
//!
//! ```text
//!    --0--
//!   |     |
//!   5     1
//!   |     |
//!    --6--
//!   |     |
//!   4     2
//!   |     |
//!    --3--   .7
//! ```
//!
//! Bits 0..=6 are segments a..g, bit 7 is the decimal point. The digit at display position `i`
//! (left to right) lives in cell `base + num_digits - i - 1`.

use bitflags::bitflags;
use hackcalc_shared::{EngineMemory, MemoryWindow, ShortWord};

bitflags! {
    /// Lit segments of one digit, excluding the decimal point.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Segments: u8 {
        const TOP = 1 << 0;
        const TOP_RIGHT = 1 << 1;
        const BOTTOM_RIGHT = 1 << 2;
        const BOTTOM = 1 << 3;
        const BOTTOM_LEFT = 1 << 4;
        const TOP_LEFT = 1 << 5;
        const MIDDLE = 1 << 6;
    }
}

const DECIMAL_POINT_BIT: u8 = 1 << 7;

/// A single segment, in bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Top,
    TopRight,
    BottomRight,
    Bottom,
    BottomLeft,
    TopLeft,
    Middle,
}

impl Segment {
    pub const ALL: [Segment; 7] = [
        Segment::Top,
        Segment::TopRight,
        Segment::BottomRight,
        Segment::Bottom,
        Segment::BottomLeft,
        Segment::TopLeft,
        Segment::Middle,
    ];

    /// Bit position of this segment within a digit code.
    pub const fn bit(self) -> u8 {
        self as u8
    }

    pub const fn flag(self) -> Segments {
        Segments::from_bits_truncate(1 << self.bit())
    }
}

/// One decoded digit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digit(u8);

impl Digit {
    pub const BLANK: Self = Self(0);

    pub const fn from_code(code: u8) -> Self {
        Self(code)
    }

    /// Keep only the low byte of a display cell.
    pub const fn from_cell(cell: ShortWord) -> Self {
        Self((cell & 0xFF) as u8)
    }

    pub const fn code(self) -> u8 {
        self.0
    }

    pub const fn segments(self) -> Segments {
        Segments::from_bits_truncate(self.0)
    }

    pub fn is_lit(self, segment: Segment) -> bool {
        self.segments().contains(segment.flag())
    }

    pub const fn decimal_point(self) -> bool {
        self.0 & DECIMAL_POINT_BIT != 0
    }
}

/// All digits of the display, left to right.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayState {
    digits: Vec<Digit>,
}

impl DisplayState {
    pub fn blank(num_digits: usize) -> Self {
        Self {
            digits: vec![Digit::BLANK; num_digits],
        }
    }

    pub fn digits(&self) -> &[Digit] {
        &self.digits
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    /// Raw digit codes, left to right.
    pub fn codes(&self) -> Vec<u8> {
        self.digits.iter().map(|d| d.code()).collect()
    }
}

impl core::ops::Index<usize> for DisplayState {
    type Output = Digit;

    fn index(&self, index: usize) -> &Digit {
        &self.digits[index]
    }
}

/// Reads the display cells of a [`MemoryWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayDecoder {
    base: usize,
    num_digits: usize,
}

impl DisplayDecoder {
    pub const fn new(base: usize, num_digits: usize) -> Self {
        Self { base, num_digits }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn num_digits(&self) -> usize {
        self.num_digits
    }

    /// Snapshot the display cells and decode them. Side-effect free.
    pub fn read_digits<M: EngineMemory + ?Sized>(
        &self,
        window: &MemoryWindow,
        mem: &M,
    ) -> hackcalc_shared::Result<DisplayState> {
        let cells = window.read_span(mem, self.base, self.num_digits)?;
        Ok(self.decode(&cells))
    }

    /// Decode a display span (cell `base + k` at `cells[k]`) into left-to-right digits.
    ///
    /// Missing cells decode as blank digits.
    pub fn decode(&self, cells: &[ShortWord]) -> DisplayState {
        let digits = (0..self.num_digits)
            .map(|i| {
                cells
                    .get(self.num_digits - i - 1)
                    .map_or(Digit::BLANK, |cell| Digit::from_cell(*cell))
            })
            .collect();
        DisplayState { digits }
    }
}
