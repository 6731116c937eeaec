//! DID and DID URL syntax.
//!
//! A DID has the form `did:<method>:<method-specific-id>` where the method is
//! a lowercase token and the identifier is one or more `:`-separated segments
//! of ASCII alphanumerics and hyphens. A DID URL may additionally carry a
//! path, a query and a fragment (`did:orcl:<id>#keys-1`).
//!
//! Parsing never fails loudly: an input that does not match the grammar is
//! simply "not a DID" and yields `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

/// The ledger-backed DID method implemented by this workspace.
pub const ORCL_METHOD: &str = "orcl";

static DID_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^did:(?P<method>[a-z0-9]+):(?P<id>(?:[A-Za-z0-9\-]*:)*[A-Za-z0-9\-]+)(?P<path>/[^?#]*)?(?:\?(?P<query>[^#]*))?(?:#(?P<fragment>.*))?$",
    )
    .expect("DID URL pattern is a valid regex")
});

/// The components of a parsed DID URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedDid {
    /// The bare DID (`did:<method>:<id>`).
    pub did: String,
    /// The method name.
    pub method: String,
    /// The method-specific identifier.
    pub id: String,
    /// The full DID URL as given.
    pub did_url: String,
    /// Path component, including the leading `/`.
    pub path: Option<String>,
    /// Query component, without the leading `?`.
    pub query: Option<String>,
    /// Fragment component, without the leading `#`.
    pub fragment: Option<String>,
}

impl ParsedDid {
    /// Whether the DID URL is a bare DID with no path, query or fragment.
    pub fn is_bare(&self) -> bool {
        self.path.is_none() && self.query.is_none() && self.fragment.is_none()
    }
}

impl fmt::Display for ParsedDid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.did)?;
        if let Some(path) = &self.path {
            write!(f, "{}", path)?;
        }
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

/// Parse any DID URL against the generic DID grammar.
pub fn parse_did(did_url: &str) -> Option<ParsedDid> {
    if did_url.is_empty() {
        return None;
    }
    let caps = DID_URL_PATTERN.captures(did_url)?;
    let method = caps.name("method")?.as_str().to_string();
    let id = caps.name("id")?.as_str().to_string();

    Some(ParsedDid {
        did: format!("did:{}:{}", method, id),
        method,
        id,
        did_url: did_url.to_string(),
        path: caps.name("path").map(|m| m.as_str().to_string()),
        query: caps.name("query").map(|m| m.as_str().to_string()),
        fragment: caps.name("fragment").map(|m| m.as_str().to_string()),
    })
}

/// Parse a DID URL of the `orcl` method.
///
/// The method-specific identifier must be a UUID. Any other method, or an
/// identifier that is not a UUID, is "not my method" and yields `None`.
pub fn parse_orcl_did(did_url: &str) -> Option<ParsedDid> {
    let parsed = parse_did(did_url)?;
    if parsed.method != ORCL_METHOD || Uuid::parse_str(&parsed.id).is_err() {
        return None;
    }
    Some(parsed)
}

/// A validated bare DID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Validate a bare DID string.
    pub fn parse(uri: &str) -> Result<Self, CoreError> {
        let parsed =
            parse_did(uri).ok_or_else(|| CoreError::InvalidDid(format!("not a DID: {}", uri)))?;
        if !parsed.is_bare() {
            return Err(CoreError::InvalidDid(format!(
                "expected a bare DID without path, query or fragment, got: {}",
                uri
            )));
        }
        Ok(Self(parsed.did))
    }

    /// Mint a fresh `did:orcl:<uuid>` identifier.
    pub fn new_orcl() -> Self {
        Self(format!("did:{}:{}", ORCL_METHOD, Uuid::new_v4()))
    }

    /// Get the full DID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the method name.
    pub fn method(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }

    /// Extract the method-specific identifier.
    pub fn identifier(&self) -> &str {
        self.0.splitn(3, ':').nth(2).unwrap_or_default()
    }

    /// Build a DID URL referencing a fragment of this DID.
    pub fn with_fragment(&self, fragment: &str) -> String {
        format!("{}#{}", self.0, fragment)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Did {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "did:orcl:3f9a2c1e-7b4d-4e8a-9c10-5d2f6a8b1e3c";

    #[test]
    fn test_parse_orcl_did() {
        let parsed = parse_orcl_did(ISSUER).unwrap();
        assert_eq!(parsed.method, "orcl");
        assert_eq!(parsed.id, "3f9a2c1e-7b4d-4e8a-9c10-5d2f6a8b1e3c");
        assert_eq!(parsed.did, ISSUER);
        assert!(parsed.is_bare());
    }

    #[test]
    fn test_parse_did_url_with_fragment() {
        let url = format!("{}#keys-1", ISSUER);
        let parsed = parse_did(&url).unwrap();
        assert_eq!(parsed.did, ISSUER);
        assert_eq!(parsed.fragment.as_deref(), Some("keys-1"));
        assert!(!parsed.is_bare());
    }

    #[test]
    fn test_parse_did_url_with_path_and_query() {
        let parsed = parse_did("did:example:abc-1/path/to?service=agent#frag").unwrap();
        assert_eq!(parsed.did, "did:example:abc-1");
        assert_eq!(parsed.path.as_deref(), Some("/path/to"));
        assert_eq!(parsed.query.as_deref(), Some("service=agent"));
        assert_eq!(parsed.fragment.as_deref(), Some("frag"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_did("").is_none());
        assert!(parse_did("not-a-did").is_none());
        assert!(parse_did("did:wrong:!!").is_none());
        assert!(parse_did("did::abc").is_none());
        assert!(parse_did("did:UPPER:abc").is_none());
        assert!(parse_did("did:orcl:").is_none());
    }

    #[test]
    fn test_parse_orcl_requires_uuid() {
        assert!(parse_orcl_did("did:orcl:not-a-uuid").is_none());
        assert!(parse_orcl_did("did:key:3f9a2c1e-7b4d-4e8a-9c10-5d2f6a8b1e3c").is_none());
        assert!(parse_orcl_did("did:wrong:!!").is_none());
    }

    #[test]
    fn test_parse_display_roundtrip() {
        for input in [
            ISSUER.to_string(),
            format!("{}#keys-1", ISSUER),
            "did:example:a:b:c-d".to_string(),
            "did:web:host-1/users/alice?version=2#key".to_string(),
        ] {
            let parsed = parse_did(&input).unwrap();
            assert_eq!(parsed.to_string(), input);
            assert_eq!(parse_did(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn test_multi_segment_identifier() {
        let parsed = parse_did("did:example:net-1:abc").unwrap();
        assert_eq!(parsed.id, "net-1:abc");
    }

    #[test]
    fn test_did_newtype() {
        let did = Did::parse(ISSUER).unwrap();
        assert_eq!(did.method(), "orcl");
        assert_eq!(did.identifier(), "3f9a2c1e-7b4d-4e8a-9c10-5d2f6a8b1e3c");
        assert_eq!(did.with_fragment("keys-1"), format!("{}#keys-1", ISSUER));
        assert!(Did::parse(&format!("{}#keys-1", ISSUER)).is_err());
        assert!(Did::parse("nope").is_err());
    }

    #[test]
    fn test_new_orcl_is_parseable() {
        let did = Did::new_orcl();
        assert!(parse_orcl_did(did.as_str()).is_some());
    }

    #[test]
    fn test_did_serde() {
        let did = Did::parse(ISSUER).unwrap();
        let json = serde_json::to_string(&did).unwrap();
        assert_eq!(json, format!("\"{}\"", ISSUER));
        let back: Did = serde_json::from_str(&json).unwrap();
        assert_eq!(back, did);
        assert!(serde_json::from_str::<Did>("\"did:wrong:!!\"").is_err());
    }
}
