// SPDX-FileCopyrightText: 2026 Chanvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chanvault - an incremental Telegram channel media crawler.
//!
//! This is the binary entry point for the chanvault daemon.

mod channels;
mod serve;
mod shutdown;
mod status;

use clap::{Parser, Subcommand};

/// Chanvault - an incremental Telegram channel media crawler.
#[derive(Parser, Debug)]
#[command(name = "chanvault", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the crawl daemon.
    Serve,
    /// List every channel reachable by the configured account.
    Channels,
    /// Print the resolved effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match chanvault_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            chanvault_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.daemon.log_level);

    let result = match cli.command {
        Some(Commands::Channels) => channels::run_channels(&config).await,
        Some(Commands::Config) => run_config(&config),
        // The daemon is the default when invoked without a subcommand.
        Some(Commands::Serve) | None => serve::run_serve(config).await,
    };

    if let Err(e) = result {
        eprintln!("chanvault: {e}");
        std::process::exit(1);
    }
}

/// Print the effective configuration after file, env, and default merging.
fn run_config(
    config: &chanvault_config::ChanvaultConfig,
) -> Result<(), chanvault_core::ChanvaultError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| chanvault_core::ChanvaultError::Internal(format!("config render: {e}")))?;
    println!("{rendered}");
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chanvault={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn binary_loads_config_defaults() {
        // Defaults are valid; the daemon only holds until credentials and a
        // channel allow-list arrive.
        let config = chanvault_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.crawl.concurrency, 5);
        assert!(!config.missing_for_crawl().is_empty());
    }

    #[test]
    fn resolved_config_renders_as_toml() {
        let config = chanvault_config::load_and_validate_str("").unwrap();
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[crawl]"));
        assert!(rendered.contains("[storage]"));
    }
}
