//! Loss logging.
//!
//! - [`ConsoleLogger`]: interval-gated output through the `log` facade
//! - [`CsvLogger`]: CSV file logging for analysis
//! - [`MultiLogger`]: combine several loggers

pub mod logger;

pub use logger::{ConsoleLogger, CsvLogger, LossSnapshot, MetricsLogger, MultiLogger};
