/// A single engine memory cell.
///
/// The engine is built for either 16-bit or 32-bit cells; the host must agree with it because the
/// [`crate::MemoryWindow`] is addressed in cells, not bytes.
#[cfg(not(feature = "word32"))]
pub type ShortWord = i16;

#[cfg(feature = "word32")]
pub type ShortWord = i32;

/// Size of one [`ShortWord`] in engine memory.
pub const WORD_BYTES: usize = core::mem::size_of::<ShortWord>();

/// Engine memory is little-endian (wasm32).
pub fn word_from_le_bytes(bytes: [u8; WORD_BYTES]) -> ShortWord {
    ShortWord::from_le_bytes(bytes)
}

pub fn word_to_le_bytes(word: ShortWord) -> [u8; WORD_BYTES] {
    word.to_le_bytes()
}
