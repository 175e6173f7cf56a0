// Copyright 2026 Sitemind Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use sitemind::cli;
use sitemind::config::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sitemind",
    about = "Sitemind — memory-backed web agent",
    version,
    after_help = "Run 'sitemind' with no command to enter interactive mode.\n\
                  Configuration comes from SITEMIND_* environment variables."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Run the browser with a visible window
    #[arg(long, global = true)]
    headed: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore a site and learn its structure into memory
    Explore {
        /// Start URL, e.g. "https://app.example.com"
        url: String,
        /// Display name for the site record
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Execute a natural-language task against a site
    Run {
        /// URL to open first
        url: String,
        /// The task, e.g. "create a new report named weekly"
        instruction: String,
        /// Skip the memory store; always run live analysis
        #[arg(long)]
        no_memory: bool,
    },
    /// Show stored memory for a domain
    Memory {
        /// Domain, e.g. "app.example.com"
        domain: String,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "sitemind=debug"
    } else {
        "sitemind=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let mut config = Config::from_env();
    if cli.headed {
        config.browser.headless = false;
    }

    let result = match cli.command {
        None => cli::repl::run(config).await,
        Some(Commands::Explore { url, name }) => cli::explore_cmd::run(config, &url, &name).await,
        Some(Commands::Run {
            url,
            instruction,
            no_memory,
        }) => cli::run_cmd::run(config, &url, &instruction, no_memory).await,
        Some(Commands::Memory { domain }) => cli::memory_cmd::run(config, &domain).await,
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "sitemind", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = &result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
    result
}
