//! Environment variable constants used throughout the application.
//!
//! Centralized definition of all `PIC2ACG_*` environment variables to ensure
//! consistency and avoid hardcoded strings.

/// Files directory override (the built-in default data root)
pub const PIC2ACG_DATA_DIR: &str = "PIC2ACG_DATA_DIR";

/// Log filter override (e.g. `debug`, `pic2acg_core=trace`)
pub const PIC2ACG_LOG: &str = "PIC2ACG_LOG";
