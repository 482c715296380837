use hackcalc_shared::layout::{DISPLAY_BASE, NUM_DIGITS, RAM_CELLS, ROM_WORDS};
use hackcalc_shared::WORD_BYTES;
use thiserror::Error;

/// Engine steps per scheduler tick unless configured otherwise.
pub const DEFAULT_STEPS_PER_TICK: u32 = 1000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for env var {0}")]
    InvalidEnv(&'static str),

    #[error("invalid host configuration: {0}")]
    Invalid(&'static str),
}

/// Memory layout and scheduling parameters shared by the pipeline, scheduler and window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Size of the memory window in cells.
    pub ram_cells: usize,
    /// Instruction words per program; each machine-code stream holds one byte per word.
    pub rom_words: usize,
    pub display_base: usize,
    pub num_digits: usize,
    pub key_cell: usize,
    /// Number of machine-code streams extracted after assembly (one per byte of a word).
    pub machine_code_streams: usize,
    /// Engine steps per tick ("speed").
    pub steps_per_tick: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            ram_cells: RAM_CELLS,
            rom_words: ROM_WORDS,
            display_base: DISPLAY_BASE,
            num_digits: NUM_DIGITS,
            key_cell: DISPLAY_BASE + NUM_DIGITS,
            machine_code_streams: WORD_BYTES,
            steps_per_tick: DEFAULT_STEPS_PER_TICK,
        }
    }
}

impl HostConfig {
    /// Defaults, overridden by `HACKCALC_SPEED` and `HACKCALC_DIGITS`.
    ///
    /// Changing the digit count moves the key cell so it stays directly after the display.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Ok(raw) = std::env::var("HACKCALC_SPEED") {
            cfg.steps_per_tick = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidEnv("HACKCALC_SPEED"))?;
        }

        if let Ok(raw) = std::env::var("HACKCALC_DIGITS") {
            cfg.num_digits = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidEnv("HACKCALC_DIGITS"))?;
            cfg.key_cell = cfg
                .display_base
                .checked_add(cfg.num_digits)
                .ok_or(ConfigError::InvalidEnv("HACKCALC_DIGITS"))?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_digits == 0 {
            return Err(ConfigError::Invalid("display needs at least one digit"));
        }
        let display_end = self
            .display_base
            .checked_add(self.num_digits)
            .ok_or(ConfigError::Invalid("display span overflows"))?;
        if display_end > self.ram_cells {
            return Err(ConfigError::Invalid("display cells fall outside the memory window"));
        }
        if self.key_cell >= self.ram_cells {
            return Err(ConfigError::Invalid("key cell falls outside the memory window"));
        }
        if (self.display_base..display_end).contains(&self.key_cell) {
            return Err(ConfigError::Invalid("key cell overlaps the display"));
        }
        if self.machine_code_streams == 0 || self.machine_code_streams > WORD_BYTES {
            return Err(ConfigError::Invalid(
                "machine-code stream count must be between 1 and the word width in bytes",
            ));
        }
        if self.steps_per_tick == 0 {
            return Err(ConfigError::Invalid("steps per tick must be positive"));
        }
        if self.rom_words == 0 {
            return Err(ConfigError::Invalid("ROM must hold at least one word"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_memory_layout() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.key_cell, 16397);
        assert_eq!(cfg.ram_cells, 24577);
        assert_eq!(cfg.machine_code_streams, WORD_BYTES);
        cfg.validate().unwrap();
    }

    #[test]
    fn validate_rejects_overlapping_key_cell() {
        let cfg = HostConfig {
            key_cell: DISPLAY_BASE + 2,
            ..HostConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Invalid("key cell overlaps the display"))
        );
    }

    #[test]
    fn validate_rejects_display_outside_window() {
        let cfg = HostConfig {
            ram_cells: DISPLAY_BASE + 4,
            ..HostConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = HostConfig {
            num_digits: 0,
            ..HostConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn stream_count_is_bounded_by_word_width() {
        let cfg = HostConfig {
            machine_code_streams: WORD_BYTES + 1,
            ..HostConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_step_budget_is_rejected() {
        let cfg = HostConfig {
            steps_per_tick: 0,
            ..HostConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Invalid("steps per tick must be positive"))
        );
    }
}
