//! `orcl issue`: sign a verifiable credential with an issuer key.

use clap::Args;
use std::path::PathBuf;

use orcl_core::AgentConfig;
use orcl_credentials::CredentialSubject;
use orcl_identity::ProofPurpose;

use super::{bind_key, ledger_agent, read_json, read_keypair, write_output};

#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Issuer DID.
    #[arg(short, long)]
    pub issuer: String,

    /// Issuer private key file (PEM).
    #[arg(short, long)]
    pub key: PathBuf,

    /// Credential subject as JSON (inline or a file path). Carries the
    /// holder as `id` or `holderId`.
    #[arg(short, long)]
    pub subject: String,

    /// Additional credential type(s), comma-separated.
    #[arg(short = 't', long, value_delimiter = ',')]
    pub credential_type: Vec<String>,

    /// Write the credential here instead of stdout.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

pub async fn run(args: &IssueArgs, config: &AgentConfig) -> anyhow::Result<()> {
    let subject: CredentialSubject = read_json(&args.subject)?;
    let agent = ledger_agent(config)?;
    let key = bind_key(&agent, &args.issuer, read_keypair(&args.key)?).await?;

    let credential = agent
        .credentials()
        .sign(
            subject,
            args.credential_type.clone(),
            &args.issuer,
            &key,
            ProofPurpose::AssertionMethod,
        )
        .await
        .map_err(|e| anyhow::anyhow!("issuance failed: {}", e))?;

    write_output(&credential.to_value()?, args.out.as_deref())
}
