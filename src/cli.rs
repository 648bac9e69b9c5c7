// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "buckley", version, about = "Tool-use orchestration engine for an interactive code assistant")]
pub struct Cli {
    /// Path to a config file (JSON). Falls back to built-in defaults.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity: -v for info, -vv for debug.
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the resolved configuration and exit.
    ShowConfig,

    /// List every tool in the default registry.
    Tools,

    /// Run the iterative Tool Runner on a single chat message.
    Chat {
        /// The user message to send.
        message: String,
    },

    /// Run a one-shot command by name against the given input.
    Command {
        /// Registered command name (e.g. `commit`).
        name: String,
        /// Input handed to the command's context collector.
        input: String,
    },
}
