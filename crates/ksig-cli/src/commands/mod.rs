//! Command handlers behind each `ksig` subcommand.

pub mod chain;
pub mod keys;
pub mod sign;

use clap::{Args, Subcommand};
use ksig_prov::Environment;
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign the kernel and extend the provenance chain (default: debug)
    Sign(EnvArgs),
    /// Generate all four RSA key pairs (content/log × debug/release)
    Keygen {
        /// Overwrite existing keys. Old signatures stop verifying.
        #[arg(long)]
        force: bool,
    },
    /// Export public keys as byte arrays for the kernel sources
    Export,
    /// Verify every meta-signature of a sealed chain
    Verify {
        #[command(flatten)]
        env: EnvArgs,
        /// Also check the newest content signature against this artifact
        #[arg(long, value_name = "FILE")]
        artifact: Option<PathBuf>,
    },
    /// Display the layers of a sealed chain, newest first
    Log(EnvArgs),
}

#[derive(Debug, Clone, Copy, Default, Args)]
pub struct EnvArgs {
    /// Use the release keys and outputs instead of the debug ones
    #[arg(short, long)]
    pub release: bool,
}

impl EnvArgs {
    pub fn environment(self) -> Environment {
        if self.release {
            Environment::Release
        } else {
            Environment::Debug
        }
    }
}
