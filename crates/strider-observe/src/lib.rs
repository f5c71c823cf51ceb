pub mod logger;

pub use logger::{init_logger, LoggerConfig, LoggerError, LoggerFormat, LoggerLevel};

pub mod prelude {
    pub use crate::logger::{init_logger, LoggerConfig, LoggerError, LoggerFormat, LoggerLevel};
}
