//! Common test utilities for hedera-agent integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Variables that would leak the developer's own setup into a test run
const AMBIENT_VARS: [&str; 10] = [
    "AGENT_PROVIDER",
    "AGENT_MODEL",
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "GROQ_API_KEY",
    "HEDERA_NETWORK",
    "HEDERA_ACCOUNT_ID",
    "HEDERA_PRIVATE_KEY",
    "HEDERA_MIRROR_URL",
    "RUST_LOG",
];

/// Isolated home directory for one binary invocation
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let data_dir = temp_dir.path().join(".hedera-agent");
        Ok(Self { temp_dir, data_dir })
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    /// Command with HOME pointed at the temp dir and a clean environment
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_hedera-agent"));
        cmd.env("HOME", self.temp_dir.path());
        for var in AMBIENT_VARS {
            cmd.env_remove(var);
        }
        cmd
    }

    pub fn write_config(&self, config: &serde_json::Value) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::write(self.config_file(), serde_json::to_string_pretty(config)?)?;
        Ok(())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
