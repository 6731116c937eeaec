//! `orcl did`: create, resolve and deactivate DIDs on the ledger.

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use orcl_core::AgentConfig;
use orcl_identity::{DidCreateOptions, DidDeactivateOptions, DidResolver, VerificationMethodType};

use super::{ledger_agent, read_keypair};

#[derive(Subcommand, Debug)]
pub enum DidCommand {
    /// Register a new DID for a key.
    Create(CreateArgs),
    /// Resolve a DID to its document.
    Resolve(ResolveArgs),
    /// Deactivate a DID. Irreversible.
    Deactivate(DeactivateArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KeyType {
    #[value(name = "ed25519-2018")]
    Ed25519Key2018,
    #[value(name = "ed25519-2020")]
    Ed25519Key2020,
}

impl From<KeyType> for VerificationMethodType {
    fn from(key_type: KeyType) -> Self {
        match key_type {
            KeyType::Ed25519Key2018 => VerificationMethodType::Ed25519VerificationKey2018,
            KeyType::Ed25519Key2020 => VerificationMethodType::Ed25519VerificationKey2020,
        }
    }
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Private key file (PEM) whose public key the DID publishes.
    #[arg(short, long)]
    pub key: PathBuf,

    /// Verification method type to register.
    #[arg(short = 't', long, value_enum, default_value = "ed25519-2018")]
    pub key_type: KeyType,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// The DID to resolve.
    pub did: String,
}

#[derive(Args, Debug)]
pub struct DeactivateArgs {
    /// The DID to deactivate.
    pub did: String,
}

pub async fn run(command: DidCommand, config: &AgentConfig) -> anyhow::Result<()> {
    match command {
        DidCommand::Create(args) => create(&args, config).await,
        DidCommand::Resolve(args) => resolve(&args, config).await,
        DidCommand::Deactivate(args) => deactivate(&args, config).await,
    }
}

async fn create(args: &CreateArgs, config: &AgentConfig) -> anyhow::Result<()> {
    let agent = ledger_agent(config)?;
    let keypair = read_keypair(&args.key)?;
    let did = agent
        .create_did_with_key(keypair, args.key_type.into())
        .await
        .map_err(|e| anyhow::anyhow!("DID creation failed: {}", e))?;

    println!("DID created: {}", did);
    if let Some(record) = agent.registrar().records().find_created(&did) {
        println!("{}", serde_json::to_string_pretty(&record.did_document)?);
    }
    Ok(())
}

async fn resolve(args: &ResolveArgs, config: &AgentConfig) -> anyhow::Result<()> {
    let agent = ledger_agent(config)?;
    let result = agent.resolver().resolve(&args.did).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.is_found() {
        anyhow::bail!(
            "resolution failed: {}",
            result.did_resolution_metadata.error.unwrap_or_default()
        );
    }
    Ok(())
}

async fn deactivate(args: &DeactivateArgs, config: &AgentConfig) -> anyhow::Result<()> {
    let agent = ledger_agent(config)?;

    // a fresh process knows no DIDs; adopt the ledger's current document
    let resolved = agent.resolver().resolve(&args.did).await;
    let Some(document) = resolved.did_document else {
        anyhow::bail!("cannot resolve {}", args.did);
    };
    let adopted = agent
        .registrar()
        .create(DidCreateOptions {
            did_document: Some(document),
            ..DidCreateOptions::default()
        })
        .await;
    if !adopted.is_finished() {
        anyhow::bail!("{}", adopted.reason().unwrap_or("unknownError"));
    }

    let result = agent
        .registrar()
        .deactivate(DidDeactivateOptions {
            did: args.did.clone(),
        })
        .await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.is_finished() {
        anyhow::bail!("deactivation failed: {}", result.reason().unwrap_or("unknownError"));
    }
    Ok(())
}
