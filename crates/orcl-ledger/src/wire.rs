//! JSON shapes exchanged with the ledger gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a chaincode invocation.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRequest<'a> {
    pub chaincode: &'a str,
    pub args: Vec<String>,
    pub sync: bool,
}

/// Gateway response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionEnvelope {
    pub result: TransactionResult,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResult {
    #[serde(default)]
    pub payload: Value,
}

/// Outcome of a state-changing transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerResponse {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// Ledger-side metadata about a DID document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default)]
    pub deactivated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

/// A DID document as stored on the ledger, with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDocument {
    pub did_document: Value,
    #[serde(default)]
    pub did_document_metadata: DocumentMetadata,
}

/// Some gateways return the chaincode payload as a JSON-encoded string.
pub(crate) fn decode_payload(payload: Value) -> Value {
    match payload {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = TransactionRequest {
            chaincode: "did",
            args: vec!["GetDidDocumentById".into(), "did:orcl:x".into()],
            sync: true,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"chaincode": "did", "args": ["GetDidDocumentById", "did:orcl:x"], "sync": true})
        );
    }

    #[test]
    fn test_decode_string_payload() {
        let encoded = Value::String(r#"{"code":0,"rawLog":"ok"}"#.into());
        let response: LedgerResponse = serde_json::from_value(decode_payload(encoded)).unwrap();
        assert_eq!(response.code, 0);
        assert_eq!(response.raw_log, "ok");

        let plain = Value::String("not json".into());
        assert_eq!(decode_payload(plain), json!("not json"));
    }
}
