//! Clinic application library: settings-driven startup shared by the binary
//! and its tests

pub mod app;
pub mod logging;

pub use app::{ClinicApp, TableOverview, BUNDLED_MANIFEST};
pub use logging::LoggingConfig;
