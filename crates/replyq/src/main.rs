// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replyq - queue-backed SMS auto-reply service.
//!
//! This is the binary entry point: command line, configuration loading and
//! tracing setup. Composition lives in [`serve`].

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod schedule;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use replyq_config::ReplyqConfig;
use tracing::error;

/// Replyq - queue-backed SMS auto-reply service.
#[derive(Parser, Debug)]
#[command(name = "replyq", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook, the worker pool and the background tasks.
    Serve,
    /// Run the worker pool only.
    Worker,
    /// Accept a message as if it had arrived on the webhook.
    Enqueue {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        body: String,
        #[arg(long, default_value_t = 0)]
        priority: i32,
    },
    /// Print live queue and processing statistics.
    Stats,
    /// Print recorded queue snapshots.
    History {
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },
    /// Zero every channel's daily message count.
    ResetCounts,
}

fn load_config(path: Option<&std::path::Path>) -> ReplyqConfig {
    let loaded = match path {
        Some(path) => replyq_config::load_and_validate_path(path),
        None => replyq_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            replyq_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("replyq={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("replyq: use --help for available commands");
        return;
    };

    let config = load_config(cli.config.as_deref());
    init_tracing(&config.worker.log_level);

    let result = match command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Worker => serve::run_worker(config).await,
        Commands::Enqueue {
            from,
            to,
            body,
            priority,
        } => commands::run_enqueue(&config, from, to, body, priority).await,
        Commands::Stats => commands::run_stats(&config).await,
        Commands::History { hours } => commands::run_history(&config, hours).await,
        Commands::ResetCounts => commands::run_reset_counts(&config).await,
    };

    if let Err(e) = result {
        error!(error = %e, "replyq exited with an error");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
