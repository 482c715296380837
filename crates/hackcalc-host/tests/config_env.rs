#![cfg(not(target_arch = "wasm32"))]

use hackcalc_host::{ConfigError, HostConfig};

// Single test so no other test in this binary observes the modified environment.
#[test]
fn env_overrides_speed_and_digits() {
    std::env::set_var("HACKCALC_SPEED", "250");
    std::env::set_var("HACKCALC_DIGITS", "8");
    let cfg = HostConfig::from_env().unwrap();
    assert_eq!(cfg.steps_per_tick, 250);
    assert_eq!(cfg.num_digits, 8);
    assert_eq!(cfg.key_cell, cfg.display_base + 8);

    std::env::set_var("HACKCALC_SPEED", "0");
    assert_eq!(
        HostConfig::from_env(),
        Err(ConfigError::InvalidEnv("HACKCALC_SPEED"))
    );

    std::env::set_var("HACKCALC_SPEED", "fast");
    assert_eq!(
        HostConfig::from_env(),
        Err(ConfigError::InvalidEnv("HACKCALC_SPEED"))
    );

    std::env::remove_var("HACKCALC_SPEED");
    std::env::set_var("HACKCALC_DIGITS", usize::MAX.to_string());
    assert_eq!(
        HostConfig::from_env(),
        Err(ConfigError::InvalidEnv("HACKCALC_DIGITS"))
    );

    std::env::remove_var("HACKCALC_DIGITS");
    assert_eq!(HostConfig::from_env().unwrap(), HostConfig::default());
}
