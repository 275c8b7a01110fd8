//! Path utilities

use std::path::PathBuf;

/// Data directory (~/.hedera-agent), falling back to the working directory
/// when no home directory can be located.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hedera-agent")
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}
