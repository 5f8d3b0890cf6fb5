//! `ksig sign`.

use anyhow::{Context, Result};
use colored::Colorize;
use ksig_prov::{sign_artifact, Environment, SigningConfig};
use tracing::info;

/// Sign the configured artifact and print what was recorded.
pub fn cmd_sign(config: &SigningConfig, environment: Environment) -> Result<()> {
    info!(%environment, artifact = %config.artifact, "signing run started");
    let signed = sign_artifact(config, environment)
        .with_context(|| format!("{environment} signing run failed"))?;
    let run = &signed.run;
    let layout = config.layout(environment);

    println!(
        "{} Signed {} ({})",
        "✓".green().bold(),
        signed.artifact.display(),
        environment.as_str().bold()
    );
    println!(
        "  {}: {}",
        "SHA-256".bold(),
        hex::encode_upper(run.content.digests.sha256)
    );
    println!(
        "  {}: {} bytes, verified",
        "Content signature".bold(),
        run.content.signature.len()
    );
    println!(
        "  {}: {} bytes, verified",
        "Meta-signature".bold(),
        run.log.signature.len()
    );
    println!(
        "  {}: {} ({} bytes)",
        "Chain".bold(),
        layout.chain.display(),
        32 + run.log.signature.len() + run.entry.len()
    );
    println!("  {}: {}", "Report".bold(), layout.report.display());
    println!("  {}: {}", "Snapshot".bold(), layout.snapshot.display());
    Ok(())
}
