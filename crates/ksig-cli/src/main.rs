use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use ksig_cli::commands::{chain, keys, sign, Command, EnvArgs};
use ksig_prov::{ProvError, SigningConfig};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Kernel signing tool. Without a command the debug build is signed.
#[derive(Parser, Debug)]
#[command(name = "ksig", version)]
struct Cli {
    /// Configuration file (default: ./ksig.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = err
                .downcast_ref::<ProvError>()
                .map(ProvError::kind)
                .unwrap_or("error");
            eprintln!("{} {err:#}", format!("error[{kind}]:").red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let cwd = env::current_dir().context("cannot determine working directory")?;
    let config = SigningConfig::resolve(cli.config.as_deref(), &cwd)
        .context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Sign(EnvArgs::default())) {
        Command::Sign(args) => sign::cmd_sign(&config, args.environment()),
        Command::Keygen { force } => keys::cmd_keygen(&config, force),
        Command::Export => keys::cmd_export(&config),
        Command::Verify { env, artifact } => {
            chain::cmd_verify(&config, env.environment(), artifact)
        }
        Command::Log(args) => chain::cmd_log(&config, args.environment()),
    }
}
