//! `orcl verify`: check a credential's issuer proof against the ledger.

use clap::Args;

use orcl_core::AgentConfig;
use orcl_credentials::VerifiableCredential;

use super::{ledger_agent, read_json};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Credential JSON (inline or a file path).
    pub credential: String,
}

pub async fn run(args: &VerifyArgs, config: &AgentConfig) -> anyhow::Result<()> {
    let credential: VerifiableCredential = read_json(&args.credential)?;
    let agent = ledger_agent(config)?;

    match agent.credentials().verify(&credential).await {
        Ok(()) => {
            println!("Credential is VALID");
            println!("  Issuer:  {}", credential.issuer);
            if let Some(subject) = credential.subject_did() {
                println!("  Subject: {}", subject);
            }
            if let Some(expiry) = &credential.expiration_date {
                println!("  Expires: {}", expiry);
            }
            Ok(())
        }
        Err(e) => {
            println!("Credential is INVALID");
            println!("  Reason: {}", e);
            anyhow::bail!("verification failed")
        }
    }
}
