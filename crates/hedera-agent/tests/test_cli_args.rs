//! CLI argument parsing and offline command tests

mod common;

use common::TestEnv;
use predicates::prelude::*;
use serde_json::json;

#[test]
fn test_help_flag() {
    let env = TestEnv::default();
    env.command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Natural-language queries"))
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn test_version_flag() {
    let env = TestEnv::default();
    env.command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_no_args_shows_usage() {
    let env = TestEnv::default();
    env.command()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_subcommand() {
    let env = TestEnv::default();
    env.command()
        .arg("transfer")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_ask_help() {
    let env = TestEnv::default();
    env.command()
        .args(["ask", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-m, --message"));
}

#[test]
fn test_ask_without_backend_refuses_to_start() {
    let env = TestEnv::default();
    env.command()
        .args(["ask", "-m", "what is my balance?"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("NO BACKEND CONFIGURED"));
}

#[test]
fn test_ask_with_unknown_provider_fails() {
    let env = TestEnv::default();
    env.command()
        .env("AGENT_PROVIDER", "mistral")
        .env("OPENAI_API_KEY", "sk-test")
        .args(["ask", "-m", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mistral"));
}

#[test]
fn test_ops_lists_every_operation() {
    let env = TestEnv::default();
    env.command()
        .arg("ops")
        .assert()
        .success()
        .stdout(predicate::str::contains("core-account-queries:"))
        .stdout(predicate::str::contains("core-network-queries:"))
        .stdout(predicate::str::contains("get_hbar_balance(account_id?: string)"))
        .stdout(predicate::str::contains("get_account_info"))
        .stdout(predicate::str::contains("get_account_token_balances"))
        .stdout(predicate::str::contains("get_token_info(token_id: string)"))
        .stdout(predicate::str::contains("get_topic_messages"))
        .stdout(predicate::str::contains("get_exchange_rate()"));
}

#[test]
fn test_ops_rejects_malformed_operator() {
    let env = TestEnv::default();
    env.command()
        .env("HEDERA_ACCOUNT_ID", "alice")
        .arg("ops")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid ledger settings"));
}

#[test]
fn test_status_without_config() {
    let env = TestEnv::default();
    env.command()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("[Missing]"))
        .stdout(predicate::str::contains("Network:   testnet"))
        .stdout(predicate::str::contains("Not ready"));
}

#[test]
fn test_status_reflects_environment() {
    let env = TestEnv::default();
    env.command()
        .env("GROQ_API_KEY", "gsk-test")
        .env("HEDERA_NETWORK", "mainnet")
        .env("HEDERA_ACCOUNT_ID", "0.0.1001")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Backend:   groq"))
        .stdout(predicate::str::contains("Network:   mainnet"))
        .stdout(predicate::str::contains("mainnet-public.mirrornode.hedera.com"))
        .stdout(predicate::str::contains("Operator:  0.0.1001"))
        .stdout(predicate::str::contains("◆ Ready"));
}

#[test]
fn test_status_reads_config_file() {
    let env = TestEnv::default();
    env.write_config(&json!({
        "agent": {"defaults": {"max_iterations": 7}},
        "ledger": {"network": "previewnet"}
    }))
    .unwrap();

    env.command()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK]"))
        .stdout(predicate::str::contains("Network:   previewnet"))
        .stdout(predicate::str::contains("7 iterations"));
}

#[test]
fn test_init_writes_default_config() {
    let env = TestEnv::default();
    env.command()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Config at"))
        .stdout(predicate::str::contains("ANTHROPIC_API_KEY"));

    assert!(env.config_file().exists());
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(env.config_file()).unwrap()).unwrap();
    assert_eq!(written["ledger"]["network"], "testnet");
}

#[test]
fn test_init_keeps_existing_config() {
    let env = TestEnv::default();
    env.write_config(&json!({"ledger": {"network": "mainnet"}}))
        .unwrap();

    env.command().arg("init").assert().success();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(env.config_file()).unwrap()).unwrap();
    assert_eq!(written["ledger"]["network"], "mainnet");
}
