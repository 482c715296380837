use hackcalc_shared::{EngineMemory, MemoryWindow, ShortWord};

/// Key codes understood by calculator programs.
///
/// Digits map to their own value; the remaining keys follow in a fixed order. Program images
/// compare against these integers directly.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum KeyCode {
    Digit0 = 0,
    Digit1 = 1,
    Digit2 = 2,
    Digit3 = 3,
    Digit4 = 4,
    Digit5 = 5,
    Digit6 = 6,
    Digit7 = 7,
    Digit8 = 8,
    Digit9 = 9,
    Add = 10,
    Sub = 11,
    Mul = 12,
    Div = 13,
    Sqrt = 14,
    Equal = 15,
    Clear = 16,
    Point = 17,
    Neg = 18,
    #[default]
    Blank = 19,
}

impl KeyCode {
    pub const ALL: [KeyCode; 20] = [
        KeyCode::Digit0,
        KeyCode::Digit1,
        KeyCode::Digit2,
        KeyCode::Digit3,
        KeyCode::Digit4,
        KeyCode::Digit5,
        KeyCode::Digit6,
        KeyCode::Digit7,
        KeyCode::Digit8,
        KeyCode::Digit9,
        KeyCode::Add,
        KeyCode::Sub,
        KeyCode::Mul,
        KeyCode::Div,
        KeyCode::Sqrt,
        KeyCode::Equal,
        KeyCode::Clear,
        KeyCode::Point,
        KeyCode::Neg,
        KeyCode::Blank,
    ];

    /// Value written into the key cell.
    pub const fn value(self) -> ShortWord {
        self as u8 as ShortWord
    }

    pub fn digit(n: u32) -> Option<Self> {
        Self::ALL.get(usize::try_from(n).ok()?).copied().filter(|_| n < 10)
    }

    pub fn from_value(value: ShortWord) -> Option<Self> {
        let idx = usize::try_from(value).ok()?;
        Self::ALL.get(idx).copied()
    }
}

/// One sample of host input, taken once per scheduler tick.
///
/// `character` is the printable key currently held (if any). `confirm` reports the platform's
/// confirm key (Enter/Return), which wins over any simultaneously reported character.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeySample {
    pub character: Option<char>,
    pub confirm: bool,
}

impl KeySample {
    pub const NONE: Self = Self {
        character: None,
        confirm: false,
    };

    pub fn char(c: char) -> Self {
        Self {
            character: Some(c),
            confirm: false,
        }
    }

    pub fn confirm() -> Self {
        Self {
            character: None,
            confirm: true,
        }
    }
}

impl From<char> for KeySample {
    fn from(c: char) -> Self {
        Self::char(c)
    }
}

/// Map a character to its key code. Unmapped characters yield [`KeyCode::Blank`].
pub fn encode_char(c: char) -> KeyCode {
    match c {
        '0'..='9' => c
            .to_digit(10)
            .and_then(KeyCode::digit)
            .unwrap_or(KeyCode::Blank),
        '+' => KeyCode::Add,
        '-' => KeyCode::Sub,
        '*' => KeyCode::Mul,
        '/' => KeyCode::Div,
        'S' | 's' => KeyCode::Sqrt,
        '=' => KeyCode::Equal,
        'C' | 'c' => KeyCode::Clear,
        '.' => KeyCode::Point,
        'N' | 'n' => KeyCode::Neg,
        _ => KeyCode::Blank,
    }
}

/// Map an input sample to its key code. Total: every sample yields exactly one code.
pub fn encode(sample: &KeySample) -> KeyCode {
    if sample.confirm {
        return KeyCode::Equal;
    }
    sample.character.map_or(KeyCode::Blank, encode_char)
}

/// Key input latch.
///
/// Holds the most recent input sample and writes its code into the key cell of the memory
/// window. The write happens every tick, including when nothing is pressed, so the engine never
/// observes a key from an earlier tick.
#[derive(Debug)]
pub struct Keypad {
    key_cell: usize,
    sample: KeySample,
    last_published: Option<KeyCode>,
}

impl Keypad {
    pub fn new(key_cell: usize) -> Self {
        Self {
            key_cell,
            sample: KeySample::NONE,
            last_published: None,
        }
    }

    pub fn key_cell(&self) -> usize {
        self.key_cell
    }

    /// Replace the latched input sample.
    pub fn set_sample(&mut self, sample: KeySample) {
        self.sample = sample;
    }

    pub fn release_all(&mut self) {
        self.sample = KeySample::NONE;
    }

    pub fn current(&self) -> KeyCode {
        encode(&self.sample)
    }

    /// The code written by the most recent [`Keypad::publish`].
    pub fn last_published(&self) -> Option<KeyCode> {
        self.last_published
    }

    /// Write the current key code into the key cell.
    pub fn publish<M: EngineMemory + ?Sized>(
        &mut self,
        window: &MemoryWindow,
        mem: &mut M,
    ) -> hackcalc_shared::Result<KeyCode> {
        let code = self.current();
        window.write_cell(mem, self.key_cell, code.value())?;
        if self.last_published != Some(code) {
            tracing::trace!(?code, "key code changed");
        }
        self.last_published = Some(code);
        Ok(code)
    }
}
