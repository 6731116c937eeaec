use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{VerifiableCredential, VerifiablePresentation};
use crate::presentation::ProofDetail;

/// Which protocol a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    PresentProof,
    IssueCredential,
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PresentProof => "present-proof",
            Self::IssueCredential => "issue-credential",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "kebab-case")]
pub enum MessageBody {
    ProposePresentation { proposal: ProofDetail },
    RequestPresentation { request: ProofDetail },
    Presentation { presentation: VerifiablePresentation },
    PresentationAck,
    OfferCredential { credential: VerifiableCredential },
    RequestCredential { credential: VerifiableCredential },
    IssueCredential { credential: VerifiableCredential },
    CredentialAck,
    /// Abandonment notice; valid in either protocol.
    ProblemReport { description: String },
}

impl MessageBody {
    /// The protocol this body belongs to; `None` for problem reports.
    pub fn protocol(&self) -> Option<Protocol> {
        match self {
            Self::ProposePresentation { .. }
            | Self::RequestPresentation { .. }
            | Self::Presentation { .. }
            | Self::PresentationAck => Some(Protocol::PresentProof),
            Self::OfferCredential { .. }
            | Self::RequestCredential { .. }
            | Self::IssueCredential { .. }
            | Self::CredentialAck => Some(Protocol::IssueCredential),
            Self::ProblemReport { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProposePresentation { .. } => "propose-presentation",
            Self::RequestPresentation { .. } => "request-presentation",
            Self::Presentation { .. } => "presentation",
            Self::PresentationAck => "presentation-ack",
            Self::OfferCredential { .. } => "offer-credential",
            Self::RequestCredential { .. } => "request-credential",
            Self::IssueCredential { .. } => "issue-credential",
            Self::CredentialAck => "credential-ack",
            Self::ProblemReport { .. } => "problem-report",
        }
    }
}

/// A protocol message between two agents over one connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    /// Unique per message; redelivery keeps the id.
    pub id: String,
    /// Shared by every message of one exchange.
    pub thread_id: String,
    pub connection_id: String,
    pub body: MessageBody,
}

impl AgentMessage {
    pub fn new(thread_id: &str, connection_id: &str, body: MessageBody) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thread_id: thread_id.to_string(),
            connection_id: connection_id.to_string(),
            body,
        }
    }
}
