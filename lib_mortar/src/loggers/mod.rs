/// Tracing subscriber setup for executables: console plus optional rolling JSON file.
pub mod logsetup;

pub use logsetup::setup_logging;
