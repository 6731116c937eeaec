use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use orcl_crypto::{sign, KeyPair, PublicKey, Signature};
use orcl_identity::VerificationMethodType;

use crate::error::CredentialError;
use crate::model::{ED25519_SIGNATURE_2018, ED25519_SIGNATURE_2020};

/// A signing key held by the wallet, bound to the verification method that
/// publishes its public half.
///
/// Clones share one lock, so concurrent signs with the same key run one
/// after another.
#[derive(Clone)]
pub struct WalletKey {
    method_id: String,
    method_type: VerificationMethodType,
    public_key: PublicKey,
    keypair: Arc<Mutex<KeyPair>>,
}

impl WalletKey {
    pub fn method_id(&self) -> &str {
        &self.method_id
    }

    pub fn method_type(&self) -> &VerificationMethodType {
        &self.method_type
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Proof type produced by this key when the caller does not ask for one.
    pub fn default_proof_type(&self) -> &'static str {
        match self.method_type {
            VerificationMethodType::Ed25519VerificationKey2020 => ED25519_SIGNATURE_2020,
            _ => ED25519_SIGNATURE_2018,
        }
    }

    pub async fn sign(&self, message: &[u8]) -> Signature {
        let keypair = self.keypair.lock().await;
        tracing::trace!(method = %self.method_id, len = message.len(), "wallet signing");
        sign(message, &keypair)
    }
}

impl std::fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKey")
            .field("method_id", &self.method_id)
            .field("method_type", &self.method_type)
            .field("public_key", &self.public_key.to_hex())
            .finish()
    }
}

/// The agent's private keys, indexed by verification method id.
///
/// Secret material never leaves the wallet: callers get a [`WalletKey`]
/// handle that can sign but not export.
#[derive(Default)]
pub struct Wallet {
    keys: DashMap<String, WalletKey>,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `keypair` as the key behind `method_id` (an absolute DID URL).
    pub fn insert(
        &self,
        method_id: impl Into<String>,
        method_type: VerificationMethodType,
        keypair: KeyPair,
    ) -> WalletKey {
        let method_id = method_id.into();
        let key = WalletKey {
            method_id: method_id.clone(),
            method_type,
            public_key: keypair.public_key(),
            keypair: Arc::new(Mutex::new(keypair)),
        };
        self.keys.insert(method_id.clone(), key.clone());
        tracing::debug!(method = %method_id, "key stored in wallet");
        key
    }

    pub fn key(&self, method_id: &str) -> Result<WalletKey, CredentialError> {
        self.keys
            .get(method_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| CredentialError::KeyNotInWallet(method_id.to_string()))
    }

    /// The first key bound to a method of `did`.
    pub fn key_for_did(&self, did: &str) -> Option<WalletKey> {
        let prefix = format!("{}#", did);
        let mut keys: Vec<WalletKey> = self
            .keys
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.value().clone())
            .collect();
        keys.sort_by(|a, b| a.method_id.cmp(&b.method_id));
        keys.into_iter().next()
    }

    pub fn contains(&self, method_id: &str) -> bool {
        self.keys.contains_key(method_id)
    }

    pub fn remove(&self, method_id: &str) -> bool {
        self.keys.remove(method_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
