//! `ksig keygen` and `ksig export`.

use anyhow::{Context, Result};
use colored::Colorize;
use ksig_prov::{export_environment, generate_and_save_all, Environment, SigningConfig};
use tracing::info;

/// Generate and persist all four key pairs.
pub fn cmd_keygen(config: &SigningConfig, force: bool) -> Result<()> {
    println!(
        "Generating four {}-bit RSA key pairs, this can take a while...",
        config.key_bits
    );
    let written = generate_and_save_all(config, force).context("key generation failed")?;
    info!(files = written.len(), force, "key pairs persisted");

    for path in &written {
        println!("{} {}", "✓".green(), path.display());
    }
    println!();
    let warning = "New keys invalidate every earlier signature. \
                   Back them up and keep the private keys secret!";
    println!("{}", warning.yellow().bold());
    Ok(())
}

/// Export the public keys of both environments.
pub fn cmd_export(config: &SigningConfig) -> Result<()> {
    for environment in Environment::ALL {
        info!(%environment, "exporting public keys");
        let written = export_environment(config, environment)
            .with_context(|| format!("exporting {environment} public keys failed"))?;
        for path in &written {
            println!("{} {}", "✓".green(), path.display());
        }
    }
    println!("Public keys converted to byte arrays.");
    Ok(())
}
