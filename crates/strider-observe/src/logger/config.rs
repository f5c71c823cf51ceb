use serde::{Deserialize, Serialize};
use std::io::IsTerminal;

use crate::logger::object::{LoggerFormat, LoggerLevel};

/// Logger configuration, read from the `logging` section of the runner's
/// configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Output format.
    pub format: LoggerFormat,
    /// Filter expression, e.g. `"info"` or `"strider_core=debug,info"`.
    pub level: LoggerLevel,
    /// Include the emitting module in each line.
    pub targets: bool,
    /// Allow ANSI color when stdout is a terminal.
    ///
    /// The scheduler captures the runner's stdout into the job logs, where
    /// escape sequences are garbage, so this is off unless someone runs the
    /// binary by hand and asks for it.
    pub color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            targets: true,
            color: false,
        }
    }
}

impl LoggerConfig {
    /// Whether the text format may emit ANSI escapes: opted in via `color`
    /// and stdout is actually a terminal, not a captured log file.
    pub(crate) fn ansi(&self) -> bool {
        self.color && std::io::stdout().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_suit_scheduler_captured_stdout() {
        let config = LoggerConfig::default();

        assert_eq!(config.format, LoggerFormat::Text);
        assert_eq!(config.level.as_str(), "info");
        assert!(config.targets);
        assert!(!config.color, "captured stdout must not get ANSI escapes");
    }

    #[test]
    fn parses_the_yaml_logging_section() {
        let yaml = "level: strider_core=debug,info\nformat: json\n";
        let config: LoggerConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.format, LoggerFormat::Json);
        assert_eq!(config.level.as_str(), "strider_core=debug,info");
        // unspecified keys keep their defaults
        assert!(config.targets);
        assert!(!config.color);
    }

    #[test]
    fn empty_section_is_all_defaults() {
        let config: LoggerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.level.as_str(), LoggerLevel::default().as_str());
        assert_eq!(config.format, LoggerFormat::default());
    }

    #[test]
    fn ansi_requires_the_color_opt_in() {
        let config = LoggerConfig::default();
        assert!(!config.ansi());
    }
}
