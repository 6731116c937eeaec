//! Agent configuration.
//!
//! Every section carries serde defaults so a partial TOML file (or none at
//! all) yields a usable configuration.

use serde::{Deserialize, Serialize};

/// Full configuration for an Orcl agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Human-readable agent label, used in logs.
    #[serde(default = "default_label")]
    pub label: String,

    /// DID method minted by this agent.
    #[serde(default = "default_did_method")]
    pub did_method: String,

    /// Ledger transport settings.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// DID resolution settings.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Credential issuance and verification settings.
    #[serde(default)]
    pub credentials: CredentialConfig,

    /// Presentation verification settings.
    #[serde(default)]
    pub presentation: PresentationConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the ledger gateway.
    #[serde(default = "default_network")]
    pub network: String,
    /// Ledger channel name.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Chaincode holding the DID registry.
    #[serde(default = "default_chaincode")]
    pub chaincode: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries on transport failure before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// How long a resolved DID document stays cached.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

/// What to do with a credential whose `expirationDate` has passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// Verification fails with an expiry error.
    #[default]
    Reject,
    /// Expiry is not checked.
    Ignore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Validity window stamped into newly issued credentials.
    #[serde(default = "default_validity_days")]
    pub validity_days: i64,
    #[serde(default)]
    pub expiry_policy: ExpiryPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationConfig {
    /// Compare the received presentation body against the request, not only
    /// the proof options.
    #[serde(default = "default_true")]
    pub strict_structure: bool,
    /// Proof purpose used when the holder signs a presentation.
    #[serde(default = "default_proof_purpose")]
    pub proof_purpose: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_label() -> String {
    "orcl-agent".into()
}
fn default_did_method() -> String {
    crate::did::ORCL_METHOD.into()
}
fn default_network() -> String {
    "http://127.0.0.1:7080".into()
}
fn default_channel() -> String {
    "default".into()
}
fn default_chaincode() -> String {
    "did".into()
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    200
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_validity_days() -> i64 {
    365
}
fn default_true() -> bool {
    true
}
fn default_proof_purpose() -> String {
    "authentication".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            did_method: default_did_method(),
            ledger: LedgerConfig::default(),
            resolver: ResolverConfig::default(),
            credentials: CredentialConfig::default(),
            presentation: PresentationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            channel: default_channel(),
            chaincode: default_chaincode(),
            username: String::new(),
            password: String::new(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            validity_days: default_validity_days(),
            expiry_policy: ExpiryPolicy::default(),
        }
    }
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            strict_structure: true,
            proof_purpose: default_proof_purpose(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LedgerConfig {
    /// Transactions endpoint for the configured channel.
    pub fn transactions_url(&self) -> String {
        format!(
            "{}/api/v2/channels/{}/transactions",
            self.network.trim_end_matches('/'),
            self.channel
        )
    }

    /// The `username:password` pair used for Basic authentication.
    pub fn credential_pair(&self) -> String {
        format!("{}:{}", self.username, self.password)
    }
}
