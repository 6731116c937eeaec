use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LedgerError;

/// Verification relationships a method may be attached to.
pub const RELATIONSHIPS: [&str; 6] = [
    "verificationMethod",
    "authentication",
    "assertionMethod",
    "keyAgreement",
    "capabilityInvocation",
    "capabilityDelegation",
];

/// A change to a DID document's verification methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation")]
pub enum Modification {
    /// Publish a new verification method object.
    AddNewMethod { method: Value },
    /// Reference an existing method from a verification relationship.
    AddMethod {
        relationship: String,
        method_id: String,
    },
    /// Drop a method reference from a relationship. Removing from
    /// `verificationMethod` removes the method itself.
    RemoveMethod {
        relationship: String,
        method_id: String,
    },
}

impl Modification {
    /// The chaincode operation name.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::AddNewMethod { .. } => "AddNewMethod",
            Self::AddMethod { .. } => "AddMethod",
            Self::RemoveMethod { .. } => "RemoveMethod",
        }
    }

    pub fn method_id(&self) -> Option<&str> {
        match self {
            Self::AddNewMethod { method } => method.get("id").and_then(Value::as_str),
            Self::AddMethod { method_id, .. } | Self::RemoveMethod { method_id, .. } => {
                Some(method_id)
            }
        }
    }

    /// Reject modifications the ledger could never apply.
    pub fn validate(&self) -> Result<(), LedgerError> {
        match self {
            Self::AddNewMethod { method } => {
                let object = method.as_object().ok_or_else(|| {
                    LedgerError::InvalidModification("new method must be a JSON object".into())
                })?;
                for field in ["id", "type", "controller"] {
                    if !object.get(field).is_some_and(Value::is_string) {
                        return Err(LedgerError::InvalidModification(format!(
                            "new method is missing `{}`",
                            field
                        )));
                    }
                }
                Ok(())
            }
            Self::AddMethod {
                relationship,
                method_id,
            }
            | Self::RemoveMethod {
                relationship,
                method_id,
            } => {
                if !RELATIONSHIPS.contains(&relationship.as_str()) {
                    return Err(LedgerError::InvalidModification(format!(
                        "unknown verification relationship `{}`",
                        relationship
                    )));
                }
                if method_id.is_empty() {
                    return Err(LedgerError::InvalidModification("empty method id".into()));
                }
                Ok(())
            }
        }
    }

    /// Positional chaincode arguments: `[operation, did, controller,
    /// modification]`, followed by the method id for every operation except
    /// `AddNewMethod`.
    pub fn transaction_args(&self, did: &str, controller: &str) -> Result<Vec<String>, LedgerError> {
        self.validate()?;
        let mut args = vec![
            self.operation().to_string(),
            did.to_string(),
            controller.to_string(),
        ];
        match self {
            Self::AddNewMethod { method } => args.push(method.to_string()),
            Self::AddMethod {
                relationship,
                method_id,
            }
            | Self::RemoveMethod {
                relationship,
                method_id,
            } => {
                args.push(relationship.clone());
                args.push(method_id.clone());
            }
        }
        Ok(args)
    }
}
