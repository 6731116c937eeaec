//! `orcl keygen`: generate an Ed25519 key pair.

use clap::Args;
use std::path::PathBuf;

use orcl_crypto::KeyPair;

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Where to write the PKCS#8 private key (PEM).
    #[arg(short, long, default_value = "orcl-key.pem")]
    pub out: PathBuf,

    /// Overwrite an existing key file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &KeygenArgs) -> anyhow::Result<()> {
    if args.out.exists() && !args.force {
        anyhow::bail!("{} exists; pass --force to overwrite", args.out.display());
    }
    let keypair = KeyPair::generate();
    std::fs::write(&args.out, keypair.to_pem().as_bytes())?;

    let public_key = keypair.public_key();
    println!("Private key written to {}", args.out.display());
    println!("  Multibase: {}", public_key.to_multibase());
    println!("  Hex:       {}", public_key.to_hex());
    println!();
    print!("{}", public_key.to_pem());
    Ok(())
}
