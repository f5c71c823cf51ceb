mod config;
mod error;
mod log;
mod object;

pub use config::LoggerConfig;
pub use error::{LoggerError, LoggerResult};
pub use object::LoggerFormat;
pub use object::LoggerLevel;

/// Install the global tracing subscriber for this process.
///
/// The runner calls this once, right after the configuration file is read
/// and before the job model is decoded, so every later failure lands in the
/// log. A second call fails with [`LoggerError::AlreadyInitialized`].
///
/// # Examples
/// ```rust
/// use strider_observe::{init_logger, LoggerConfig};
///
/// init_logger(&LoggerConfig::default()).expect("logger init failed");
/// tracing::info!("ready");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => log::logger_text(cfg),
        LoggerFormat::Json => log::logger_json(cfg),
    }
}
