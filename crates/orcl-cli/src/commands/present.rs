//! `orcl present` / `orcl verify-presentation`.

use clap::Args;
use std::path::PathBuf;

use orcl_core::AgentConfig;
use orcl_credentials::{PresentationProofOptions, VerifiableCredential, VerifiablePresentation};

use super::{bind_key, ledger_agent, read_json, read_keypair, write_output};

#[derive(Args, Debug)]
pub struct PresentArgs {
    /// Holder DID.
    #[arg(long)]
    pub holder: String,

    /// Holder private key file (PEM).
    #[arg(short, long)]
    pub key: PathBuf,

    /// Credential JSON to include (inline or a file path). Repeatable.
    #[arg(short, long = "credential", required = true)]
    pub credentials: Vec<String>,

    /// Challenge supplied by the verifier.
    #[arg(long)]
    pub challenge: Option<String>,

    /// Domain supplied by the verifier.
    #[arg(long)]
    pub domain: Option<String>,

    /// Write the presentation here instead of stdout.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyPresentationArgs {
    /// Presentation JSON (inline or a file path).
    pub presentation: String,

    /// The challenge the holder must have signed.
    #[arg(long)]
    pub challenge: Option<String>,
}

pub async fn run(args: &PresentArgs, config: &AgentConfig) -> anyhow::Result<()> {
    let credentials = args
        .credentials
        .iter()
        .map(|source| read_json::<VerifiableCredential>(source))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let agent = ledger_agent(config)?;
    let key = bind_key(&agent, &args.holder, read_keypair(&args.key)?).await?;

    let presentation = agent
        .presentations()
        .create_presentation(credentials, &args.holder);
    let signed = agent
        .presentations()
        .sign_presentation(
            presentation,
            &key,
            PresentationProofOptions {
                challenge: args.challenge.clone(),
                domain: args.domain.clone(),
                ..PresentationProofOptions::default()
            },
        )
        .await
        .map_err(|e| anyhow::anyhow!("signing failed: {}", e))?;

    write_output(&serde_json::to_value(&signed)?, args.out.as_deref())
}

pub async fn run_verify(args: &VerifyPresentationArgs, config: &AgentConfig) -> anyhow::Result<()> {
    let presentation: VerifiablePresentation = read_json(&args.presentation)?;
    let agent = ledger_agent(config)?;

    let result = agent
        .presentations()
        .verify_presentation(&presentation, args.challenge.as_deref())
        .await;
    match result.error {
        None => {
            println!("Presentation is VALID");
            println!("  Holder:      {}", presentation.holder);
            println!("  Credentials: {}", presentation.verifiable_credential.len());
            Ok(())
        }
        Some(failure) => {
            println!("Presentation is INVALID");
            println!("  [FAIL] {}", failure);
            anyhow::bail!("verification failed")
        }
    }
}
