// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use buckley_core::{
    CancellationToken, Command, CommandRunner, ContextBundle, ContextCollector, Conversation,
    Ledger, ModelInvoker, RunOutcome, ToolRunner, ToolRunnerConfig,
};
use buckley_model::mock::MockCompletionClient;
use buckley_model::CompletionClient;
use buckley_tools::demo::CalculatorTool;
use buckley_tools::ToolRegistry;
use cli::{Cli, Commands};

/// Exit codes per the CLI surface: 0 success, 1 user error, 2 internal
/// error, 3 invalid arguments from the model after retry.
const EXIT_SUCCESS: u8 = 0;
const EXIT_USER_ERROR: u8 = 1;
const EXIT_INTERNAL_ERROR: u8 = 2;
const EXIT_INVALID_MODEL_ARGS: u8 = 3;

struct EchoCollector;

#[async_trait::async_trait]
impl ContextCollector for EchoCollector {
    async fn collect(&self, user_input: &str) -> Result<ContextBundle, buckley_core::BuckleyError> {
        Ok(ContextBundle::new(user_input.to_string()))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("buckley: {err}");
            ExitCode::from(EXIT_INTERNAL_ERROR)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = load_config(cli.config.as_deref())?;
    let registry = default_tool_registry();

    match cli.command {
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(EXIT_SUCCESS)
        }
        Commands::Tools => {
            for def in registry.list() {
                println!("{}\t{}", def.name, def.description);
            }
            Ok(EXIT_SUCCESS)
        }
        Commands::Chat { message } => run_chat(&config, &registry, &message).await,
        Commands::Command { name, input } => run_command(&config, name, &input).await,
    }
}

async fn run_chat(config: &buckley_config::Config, registry: &ToolRegistry, message: &str) -> anyhow::Result<u8> {
    if message.trim().is_empty() {
        eprintln!("buckley: a chat message must not be empty");
        return Ok(EXIT_USER_ERROR);
    }

    let client: Arc<dyn CompletionClient> = Arc::new(MockCompletionClient::default());
    let ledger = Arc::new(Ledger::new());
    let runner = ToolRunner::new(
        Arc::clone(&client),
        config.model.name.clone(),
        ToolRunnerConfig::from(&config.agent),
    )
    .with_rates(config.model.rate_in, config.model.rate_out)
    .with_ledger(Arc::clone(&ledger));

    let mut conversation = Conversation::new("cli-session", config.model.max_tokens.unwrap_or(128_000) as usize);
    conversation.add_system("You are buckley, an interactive code-assistant orchestration engine.");
    conversation.add_user(message);

    let cancel = CancellationToken::new();
    let result = runner.run(&mut conversation, registry, &cancel).await;

    match result.outcome {
        RunOutcome::NaturalStop => {
            println!("{}", result.final_text.unwrap_or_default());
            Ok(EXIT_SUCCESS)
        }
        RunOutcome::MaxIterations => {
            eprintln!("buckley: iteration budget exhausted before a final answer");
            Ok(EXIT_INTERNAL_ERROR)
        }
        RunOutcome::ContextCancelled => {
            eprintln!("buckley: cancelled");
            Ok(EXIT_INTERNAL_ERROR)
        }
        RunOutcome::TransportError(e) => {
            eprintln!("buckley: transport error: {e}");
            Ok(EXIT_INTERNAL_ERROR)
        }
    }
}

async fn run_command(config: &buckley_config::Config, name: String, input: &str) -> anyhow::Result<u8> {
    let mut commands = buckley_core::CommandRegistry::new();
    commands
        .register(commit_message_command())
        .context("registering builtin commands")?;

    let command = match commands.get(&name) {
        Some(c) => c,
        None => {
            eprintln!("buckley: unknown command `{name}`");
            return Ok(EXIT_USER_ERROR);
        }
    };

    let client: Arc<dyn CompletionClient> = Arc::new(MockCompletionClient::default());
    let invoker = ModelInvoker::new(client, config.model.name.clone(), config.model.rate_in, config.model.rate_out);
    let runner = CommandRunner::new(invoker, Arc::new(EchoCollector));

    let (result, _trace) = runner.execute(&command, input).await;
    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(EXIT_SUCCESS)
        }
        Err(buckley_core::BuckleyError::MissingToolCall) | Err(buckley_core::BuckleyError::InvalidArguments { .. }) => {
            eprintln!("buckley: model did not produce valid arguments for `{name}`");
            Ok(EXIT_INVALID_MODEL_ARGS)
        }
        Err(e) => {
            eprintln!("buckley: {e}");
            Ok(EXIT_INTERNAL_ERROR)
        }
    }
}

fn commit_message_command() -> Command {
    use std::collections::BTreeMap;
    let mut properties = BTreeMap::new();
    properties.insert("message".to_string(), buckley_tools::ParameterSchema::string());
    let schema = buckley_tools::ParameterSchema::object(properties, vec!["message".to_string()]);
    let tool = buckley_tools::ToolDefinition::new("commit_message", "produce a one-line commit message", schema);
    Command::new("commit", "Generate a commit message from a diff", tool, "You write concise, conventional commit messages.")
}

fn default_tool_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(CalculatorTool).expect("builtin tools register cleanly");
    registry
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<buckley_config::Config> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading config file {}", p.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing config file {}", p.display()))
        }
        None => Ok(buckley_config::Config::default()),
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();
}

