pub mod demo;
pub mod did;
pub mod issue;
pub mod keygen;
pub mod present;
pub mod verify;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;

use orcl_core::AgentConfig;
use orcl_credentials::{Agent, WalletKey};
use orcl_crypto::KeyPair;
use orcl_identity::DidResolver;
use orcl_ledger::HttpLedgerClient;

/// An agent talking to the configured ledger over HTTP.
pub fn ledger_agent(config: &AgentConfig) -> anyhow::Result<Agent> {
    let ledger = HttpLedgerClient::new(&config.ledger)
        .map_err(|e| anyhow::anyhow!("ledger client: {}", e))?;
    tracing::debug!(url = %ledger.url(), "ledger client ready");
    Ok(Agent::new(config.clone(), Arc::new(ledger)))
}

pub fn read_keypair(path: &Path) -> anyhow::Result<KeyPair> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("reading key file {}", path.display()))?;
    KeyPair::from_pem(&pem).map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))
}

/// Parse a JSON document from a file path, or from the argument itself when
/// no such file exists.
pub fn read_json<T: DeserializeOwned>(source: &str) -> anyhow::Result<T> {
    let text = if Path::new(source).exists() {
        std::fs::read_to_string(source)?
    } else {
        source.to_string()
    };
    serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("invalid JSON: {}", e))
}

pub fn write_output(json: &serde_json::Value, out: Option<&Path>) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(json)?;
    match out {
        Some(path) => {
            std::fs::write(path, text)?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

/// Put `keypair` in the agent's wallet under the method of `did` that
/// publishes its public key.
pub async fn bind_key(agent: &Agent, did: &str, keypair: KeyPair) -> anyhow::Result<WalletKey> {
    let resolved = agent.resolver().resolve(did).await;
    let document = resolved.did_document.ok_or_else(|| {
        anyhow::anyhow!(
            "cannot resolve {}: {}",
            did,
            resolved.did_resolution_metadata.error.unwrap_or_default()
        )
    })?;
    let public_key = keypair.public_key();
    let method = document
        .verification_method
        .iter()
        .find(|vm| vm.public_key().map_or(false, |key| key == public_key))
        .ok_or_else(|| anyhow::anyhow!("{} publishes no method for this key", did))?;
    let method_id = document.absolute_id(&method.id);
    Ok(agent
        .wallet()
        .insert(method_id, method.method_type.clone(), keypair))
}
