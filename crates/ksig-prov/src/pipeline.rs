//! One complete signing run against the configured on-disk layout.

use crate::chain::{read_chain_state, sign_run};
use crate::config::SigningConfig;
use crate::digest::ArtifactDigester;
use crate::error::ProvError;
use crate::keys::{KeyRing, KeyStore};
use crate::lock::ChainLock;
use crate::manifest::BuildManifest;
use crate::record::RecordWriter;
use crate::types::{Environment, SignedRun};
use std::path::PathBuf;
use tracing::info;

/// What a successful run signed and produced.
#[derive(Debug, Clone)]
pub struct SignedArtifact {
    pub artifact: PathBuf,
    pub run: SignedRun,
}

/// Sign the configured artifact for `environment` and advance its chain.
///
/// The chain file is locked for the duration of the run. Keys, manifest and
/// artifact are resolved before anything is signed, and nothing is written
/// unless both signatures verified.
pub fn sign_artifact(
    config: &SigningConfig,
    environment: Environment,
) -> Result<SignedArtifact, ProvError> {
    let layout = config.layout(environment);
    let _lock = ChainLock::acquire(&layout.chain)?;

    let ring = KeyRing::load(&KeyStore::new(config.key_bits), layout, environment)?;
    let manifest = BuildManifest::load(&layout.manifest)?;
    let artifact = manifest.artifact_path(&config.project_base, &config.artifact)?;
    info!(%environment, artifact = %artifact.display(), "signing artifact");

    let digests = ArtifactDigester::new(config.chunk_size).digest_file(&artifact)?;
    let prior = read_chain_state(&layout.chain)?;
    let run = sign_run(&ring, digests, &prior)?;

    RecordWriter::for_layout(layout).write(&run)?;
    Ok(SignedArtifact { artifact, run })
}
