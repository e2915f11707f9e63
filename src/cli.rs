//! Pieces shared by the command-line front ends.

use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use log::LevelFilter;

use crate::error::FlowsvgError;

/// Path that stands for standard input.
pub const STDIN: &str = "-";

/// Install `env_logger` at `level`, falling back to `warn` for unknown names.
pub fn init_logging(level: &str) {
    let log_level = LevelFilter::from_str(level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {level}. Using 'warn' instead.");
        LevelFilter::Warn
    });

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();
}

pub fn is_stdin(path: &Path) -> bool {
    path.to_str() == Some(STDIN)
}

/// Read a file, or standard input for `-`.
pub fn read_input(path: &Path) -> Result<String, FlowsvgError> {
    if is_stdin(path) {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}
