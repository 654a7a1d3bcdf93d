//! Unit Configuration Module
//!
//! Provides per-unit configuration loaded from TOML files: detector
//! parameters, the versioned subsystem list, risk tiers and control rules.
//!
//! ## Loading Order
//!
//! 1. `FROSTGUARD_CONFIG` environment variable (path to TOML file)
//! 2. `unit_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(UnitConfig::load()?);
//!
//! // Anywhere in the codebase:
//! let contamination = config::get().detector.contamination;
//! ```

mod unit_config;
pub mod defaults;
pub mod validation;

pub use unit_config::*;

use std::sync::OnceLock;

/// Global unit configuration, initialized once at startup.
static UNIT_CONFIG: OnceLock<UnitConfig> = OnceLock::new();

/// Initialize the global unit configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: UnitConfig) {
    if UNIT_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global unit configuration.
///
/// Falls back to built-in defaults when `init()` has not been called, so
/// library callers and tests never observe an uninitialized config.
pub fn get() -> &'static UnitConfig {
    UNIT_CONFIG.get_or_init(UnitConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    UNIT_CONFIG.get().is_some()
}
