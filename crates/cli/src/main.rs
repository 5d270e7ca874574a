//! mindloop CLI, the main entry point.
//!
//! Commands:
//! - `serve`    — Run the gateway and host agents until Ctrl-C
//! - `config`   — Create, print or check the configuration file
//! - `actions`  — List the innate action repertoire
//! - `status`   — Show configuration summary and storage paths

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mindloop_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "mindloop",
    about = "mindloop: autonomous persona agents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.mindloop/config.toml)
    #[arg(short, long, global = true, env = "MINDLOOP_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Serve {
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List the innate actions by category
    Actions,

    /// Show system status
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
    /// Check the configuration for errors
    Validate,
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);
    let path = cli.config_path();

    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(&path, host, port).await?,
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => commands::config_cmd::init(&path, force)?,
            ConfigAction::Show => commands::config_cmd::show(&path)?,
            ConfigAction::Validate => commands::config_cmd::validate(&path)?,
        },
        Commands::Actions => commands::actions::run(),
        Commands::Status => commands::status::run(&path)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from(["mindloop", "serve", "--host", "0.0.0.0", "-p", "9000"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9000));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mindloop", "config", "show", "--config", "/tmp/m.toml", "--json-logs",
        ])
        .unwrap();
        assert!(cli.json_logs);
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/m.toml"));
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }

    #[test]
    fn config_requires_action() {
        assert!(Cli::try_parse_from(["mindloop", "config"]).is_err());
    }
}
