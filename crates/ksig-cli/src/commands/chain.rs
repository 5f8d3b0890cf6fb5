//! `ksig verify` and `ksig log`.

use anyhow::{Context, Result};
use colored::Colorize;
use ksig_prov::{
    read_chain_state, verify_chain, verify_head_content, ArtifactDigester, ChainSummary,
    Environment, KeyRing, KeyStore, SigningConfig,
};
use std::path::PathBuf;
use tracing::info;

fn load_verified(
    config: &SigningConfig,
    environment: Environment,
) -> Result<(KeyRing, Vec<u8>, ChainSummary)> {
    let layout = config.layout(environment);
    info!(%environment, chain = %layout.chain.display(), "verifying chain");
    let ring = KeyRing::load_public(&KeyStore::new(config.key_bits), layout, environment)
        .context("failed to load public keys")?;
    let blob = read_chain_state(&layout.chain)
        .with_context(|| format!("failed to read chain {}", layout.chain.display()))?;
    let summary = verify_chain(&blob, ring.content().public_key(), ring.log().public_key())
        .with_context(|| format!("chain verification failed for {}", layout.chain.display()))?;
    Ok((ring, blob, summary))
}

/// Handle the `ksig verify` command.
pub fn cmd_verify(
    config: &SigningConfig,
    environment: Environment,
    artifact: Option<PathBuf>,
) -> Result<()> {
    let (ring, blob, summary) = load_verified(config, environment)?;
    println!(
        "{} {} chain meta-signatures verified",
        "✓".green().bold(),
        summary.len()
    );

    if let Some(path) = artifact {
        let digests = ArtifactDigester::new(config.chunk_size).digest_file(&path)?;
        verify_head_content(
            &blob,
            &digests,
            ring.content().public_key(),
            ring.log().public_key(),
        )
        .with_context(|| format!("{} is not the artifact signed last", path.display()))?;
        println!(
            "{} content signature matches {}",
            "✓".green().bold(),
            path.display()
        );
    }

    println!();
    println!("{}", "Summary:".bold().underline());
    println!("  {}: {}", "Environment".bold(), environment);
    println!("  {}: {}", "Layers".bold(), summary.len());
    println!("  {}: {}", "Status".bold(), "VALID".green().bold());
    Ok(())
}

/// Handle the `ksig log` command.
pub fn cmd_log(config: &SigningConfig, environment: Environment) -> Result<()> {
    let (_, _, summary) = load_verified(config, environment)?;
    let layout = config.layout(environment);

    if summary.is_empty() {
        println!("{}", "Chain is empty".yellow());
        return Ok(());
    }

    println!("{}", "Provenance Chain".bold().underline());
    println!("{}: {}", "File".bold(), layout.chain.display());
    println!("{}: {}", "Layers".bold(), summary.len());
    println!();

    for layer in &summary.layers {
        let label = if layer.depth == 0 {
            "latest".to_string()
        } else {
            format!("-{}", layer.depth)
        };
        println!("{} {}", "Layer".bold().cyan(), label.cyan());
        println!(
            "  {}: {}",
            "Kernel SHA-256".bold(),
            hex::encode_upper(layer.content_sha256)
        );
        println!(
            "  {}: {}",
            "Entry SHA-256".bold(),
            hex::encode_upper(layer.log_sha256)
        );
        println!("  {}: {} bytes", "Entry".bold(), layer.entry_len);
        println!();
    }
    Ok(())
}
