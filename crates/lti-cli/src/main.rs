mod commands;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lti_core::{LayeredSecretStore, ToolConfig, default_config_dir, load_config};
use tracing_subscriber::EnvFilter;

use crate::commands::config;
use crate::commands::launch;
use crate::commands::token;

#[derive(Debug, Parser)]
#[command(name = "lti", about = "LTI launch verification and session tokens")]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write the default lti.toml
    Init {
        #[arg(long)]
        force: bool,
        /// Prompt for the consumer and signing secrets and store them in the file
        #[arg(long)]
        with_secrets: bool,
    },
    /// Inspect the loaded configuration
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },
    /// Sign a launch the way a consumer platform would
    Sign(launch::SignArgs),
    /// Verify a launch body, extract claims and issue a session token
    Launch(launch::LaunchArgs),
    /// Check a session token and print its claims
    ValidateToken {
        /// Token to check; read from stdin when omitted
        token: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);

    match cli.command {
        Commands::Init {
            force,
            with_secrets,
        } => config::cmd_init(&cfg_dir, force, with_secrets, cli.json),
        Commands::Config { command } => config::cmd_config(command, &cfg_dir, cli.json),
        Commands::Sign(args) => launch::cmd_sign(args, &cfg_dir, cli.json),
        Commands::Launch(args) => launch::cmd_launch(args, &cfg_dir, cli.json),
        Commands::ValidateToken { token } => token::cmd_validate(token, &cfg_dir, cli.json),
    }
}

/// `RUST_LOG` filter, `warn` when unset. Logs go to stderr so `--json` output stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Config file under `cfg_dir`, overridden by the environment and `./.env`.
pub fn load_tool_config(cfg_dir: &Path) -> anyhow::Result<ToolConfig> {
    let cwd = std::env::current_dir()?;
    let secrets = LayeredSecretStore::env_then_dotenv(&cwd)?;
    Ok(load_config(cfg_dir, &secrets)?)
}

pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=').ok_or_else(|| "must be KEY=VALUE".to_string())?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

pub fn pout(json_mode: bool, value: serde_json::Value, text: &str) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}
