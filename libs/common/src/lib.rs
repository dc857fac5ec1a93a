//! Shared bootstrap pieces for the related-values tools
//!
//! - [`logging`]: tracing subscriber set-up (console, JSON, rolling file)
//! - [`settings`]: layered settings (defaults, YAML file, `RELVAL_` environment)

pub mod logging;
pub mod settings;

pub use logging::{init_logging, LogFormat, LogGuard, LoggingSettings};
pub use settings::{ProcessorSettings, Settings, SummarizerSettings};
