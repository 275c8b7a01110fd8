//! hedera-agent command implementations

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use hedera_agent_config::{self, Config};
use hedera_agent_core::{
    AgentLoop, AgentSession, ContextBuilder, OperationRegistry, RunOutcome,
};
use hedera_agent_ledger::{account_queries, network_queries, LedgerClient};

/// Ledger session plus every query bundle registered against it
fn build_registry(config: &Config) -> Result<(Arc<LedgerClient>, Arc<OperationRegistry>)> {
    let client = Arc::new(
        LedgerClient::from_config(&config.ledger).context("Invalid ledger settings")?,
    );

    let mut registry = OperationRegistry::new();
    registry.register(account_queries(client.clone()))?;
    registry.register(network_queries(client.clone()))?;
    debug!("◆ {} operations registered", registry.len());

    Ok((client, Arc::new(registry)))
}

/// Assemble the agent; refuses to start without a usable backend
fn build_agent(config: &Config) -> Result<AgentLoop> {
    let (client, registry) = build_registry(config)?;
    let agent = AgentLoop::from_config(config, registry)?;

    let mut context = ContextBuilder::new(config.agent.defaults.system_prompt.clone())
        .fact("Hedera network", client.network().to_string());
    if let Some(operator) = client.operator() {
        context = context.fact(
            "Operator account (used when the user says \"my\" account)",
            operator.to_string(),
        );
    }

    info!(
        "◆ Agent ready: {} / {}",
        agent.adapter().backend_name(),
        agent.adapter().model()
    );
    Ok(agent.with_system_prompt(context.build()))
}

/// Run one request; Ctrl-C stops it before the next model call
async fn ask_once(session: &mut AgentSession, input: &str) -> hedera_agent_core::Result<RunOutcome> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let result = session.ask(input, &cancel).await;
    watcher.abort();
    result
}

/// Initialize config
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing hedera-agent...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = hedera_agent_config::init().await?;

    println!("\n◆ Config at {}", hedera_agent_config::config_path().display());
    println!("\nNext steps:");
    if !config.has_backend() {
        println!("  1. Set ANTHROPIC_API_KEY, OPENAI_API_KEY or GROQ_API_KEY");
    }
    if config.ledger.operator_id().is_none() {
        println!("  2. Set HEDERA_ACCOUNT_ID (and HEDERA_PRIVATE_KEY) for your operator account");
    }
    println!("  3. Ask away: hedera-agent ask -m \"what's my balance?\"");

    Ok(())
}

/// Ask the agent
pub async fn ask_command(message: Option<String>) -> Result<()> {
    let config = Config::load().await?;
    let agent = Arc::new(build_agent(&config)?);
    let mut session = AgentSession::new(agent);

    if let Some(msg) = message {
        let outcome = ask_once(&mut session, &msg).await?;
        println!("{}", outcome.answer);
        return Ok(());
    }

    println!("◆ Interactive mode (type 'exit' to quit, 'clear' to forget)");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    loop {
        print!("◆ ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }
        if input == "clear" {
            session.clear();
            println!("◆ Conversation cleared\n");
            continue;
        }

        match ask_once(&mut session, input).await {
            Ok(outcome) => println!("\n{}\n", outcome.answer),
            Err(e) => println!("\n✗ {} [{}]\n", e, e.kind()),
        }
    }

    Ok(())
}

/// List registered operations
pub async fn ops_command() -> Result<()> {
    let config = Config::load().await?;
    let (_, registry) = build_registry(&config)?;

    println!("◆ Operations");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut current_bundle = "";
    for operation in registry.operations() {
        if operation.bundle != current_bundle {
            current_bundle = operation.bundle.as_str();
            println!("\n{}:", current_bundle);
        }

        let descriptor = &operation.descriptor;
        let args: Vec<String> = descriptor
            .input_schema
            .fields()
            .iter()
            .map(|f| {
                if f.required {
                    format!("{}: {}", f.name, f.kind)
                } else {
                    format!("{}?: {}", f.name, f.kind)
                }
            })
            .collect();
        println!("  {}({})", descriptor.name, args.join(", "));
        println!("      {}", descriptor.description);
    }

    Ok(())
}

/// Show status
pub async fn status_command() -> Result<()> {
    let config_path = hedera_agent_config::config_path();

    println!("◆ hedera-agent Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );

    let config = Config::load().await?;

    match config.select_backend()? {
        Some(selection) => println!("Backend:   {} ({})", selection.kind, selection.model),
        None => println!("Backend:   [Missing]"),
    }

    let ledger = &config.ledger;
    println!("Network:   {}", ledger.network);
    println!("Mirror:    {}", ledger.mirror_url());
    println!("Operator:  {}", ledger.operator_id().unwrap_or("[Not set]"));
    println!(
        "Key:       {}",
        if ledger.private_key.trim().is_empty() {
            "[Not set]"
        } else {
            "[Set]"
        }
    );

    let defaults = &config.agent.defaults;
    println!(
        "Limits:    {} iterations, {} protocol retries, {}s model / {}s operation timeout",
        defaults.max_iterations,
        defaults.max_protocol_retries,
        defaults.model_timeout_secs,
        defaults.operation_timeout_secs
    );

    println!(
        "\n◆ {}",
        if config.has_backend() {
            "Ready"
        } else {
            "Not ready: no backend configured"
        }
    );

    Ok(())
}
