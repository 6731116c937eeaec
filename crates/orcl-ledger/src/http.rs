//! HTTP transport to a chaincode gateway.
//!
//! Every operation is one `POST {network}/api/v2/channels/{channel}/transactions`
//! carrying `{chaincode, args, sync: true}` and Basic authentication. The
//! response payload is found at `result.payload`.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use orcl_core::LedgerConfig;

use crate::error::LedgerError;
use crate::modification::Modification;
use crate::retry::{retry_send, RetryPolicy};
use crate::service::{check_response, LedgerService};
use crate::wire::{decode_payload, LedgerDocument, LedgerResponse, TransactionEnvelope, TransactionRequest};

pub const OP_CREATE: &str = "CreateDIDDocument";
pub const OP_RESOLVE: &str = "GetDidDocumentById";
pub const OP_DEACTIVATE: &str = "DeleteDidDocument";

/// Ledger client speaking to a chaincode gateway over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    http: reqwest::Client,
    url: String,
    chaincode: String,
    timeout_ms: u64,
    retry: RetryPolicy,
}

impl HttpLedgerClient {
    /// Build a client from ledger configuration.
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let encoded = STANDARD.encode(config.credential_pair());
        let mut auth = HeaderValue::from_str(&format!("Basic {}", encoded))
            .map_err(|e| LedgerError::Config(format!("invalid credentials: {}", e)))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| LedgerError::Config(e.to_string()))?;

        Ok(Self {
            http,
            url: config.transactions_url(),
            chaincode: config.chaincode.clone(),
            timeout_ms: config.timeout_ms,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
            },
        })
    }

    /// The transactions endpoint this client posts to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Invoke the chaincode and return the decoded payload.
    async fn invoke(&self, args: Vec<String>) -> Result<Value, LedgerError> {
        let operation = args.first().cloned().unwrap_or_default();
        let body = TransactionRequest {
            chaincode: &self.chaincode,
            args,
            sync: true,
        };

        tracing::debug!(operation = %operation, url = %self.url, "invoking ledger chaincode");

        let response = retry_send(self.retry, || self.http.post(&self.url).json(&body).send())
            .await
            .map_err(|e| {
                tracing::warn!(operation = %operation, error = %e, "ledger request failed");
                if e.is_timeout() {
                    LedgerError::Timeout(self.timeout_ms)
                } else {
                    LedgerError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(operation = %operation, status = status.as_u16(), "ledger rejected request");
            return Err(LedgerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: TransactionEnvelope = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
        Ok(decode_payload(envelope.result.payload))
    }

    async fn transact(&self, args: Vec<String>) -> Result<LedgerResponse, LedgerError> {
        let payload = self.invoke(args).await?;
        if payload.is_null() {
            return Err(LedgerError::InvalidResponse("empty transaction payload".into()));
        }
        let response: LedgerResponse = serde_json::from_value(payload)
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
        check_response(response)
    }
}

#[async_trait]
impl LedgerService for HttpLedgerClient {
    async fn create(&self, public_key: &str) -> Result<Value, LedgerError> {
        let payload = self
            .invoke(vec![OP_CREATE.to_string(), public_key.to_string()])
            .await?;
        if !payload.is_object() {
            return Err(LedgerError::InvalidResponse(
                "create did not return a DID document".into(),
            ));
        }
        Ok(payload)
    }

    async fn resolve(&self, did: &str) -> Result<Option<LedgerDocument>, LedgerError> {
        let payload = self
            .invoke(vec![OP_RESOLVE.to_string(), did.to_string()])
            .await?;
        if payload.is_null() {
            return Ok(None);
        }
        let document: LedgerDocument = serde_json::from_value(payload)
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
        if document.did_document.is_null() {
            return Ok(None);
        }
        Ok(Some(document))
    }

    async fn update(
        &self,
        did: &str,
        controller: &str,
        modification: &Modification,
    ) -> Result<LedgerResponse, LedgerError> {
        let args = modification.transaction_args(did, controller)?;
        self.transact(args).await
    }

    async fn deactivate(&self, did: &str) -> Result<LedgerResponse, LedgerError> {
        self.transact(vec![OP_DEACTIVATE.to_string(), did.to_string()])
            .await
    }
}
