use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::proof_state::Role;

/// The states of a credential issuance exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssuanceState {
    /// Issuer sent a credential offer.
    OfferSent,
    /// Holder received a credential offer.
    OfferReceived,
    /// Holder sent a credential request.
    RequestSent,
    /// Issuer received a credential request.
    RequestReceived,
    /// Issuer signed and sent the credential.
    CredentialIssued,
    /// Holder received the credential.
    CredentialReceived,
    /// Credential stored and acknowledged. Final state.
    Done,
    /// Exchange abandoned. Final state.
    Abandoned,
}

impl IssuanceState {
    /// Whether this is a final (terminal) state.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Done | Self::Abandoned)
    }

    fn progress(&self) -> u8 {
        match self {
            Self::OfferSent | Self::OfferReceived => 1,
            Self::RequestSent | Self::RequestReceived => 2,
            Self::CredentialIssued | Self::CredentialReceived => 3,
            Self::Done => 4,
            Self::Abandoned => 5,
        }
    }

    fn role(&self) -> Option<Role> {
        match self {
            Self::OfferSent | Self::RequestReceived | Self::CredentialIssued => Some(Role::Issuer),
            Self::OfferReceived | Self::RequestSent | Self::CredentialReceived => {
                Some(Role::Holder)
            }
            Self::Done | Self::Abandoned => None,
        }
    }
}

impl fmt::Display for IssuanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OfferSent => "OfferSent",
            Self::OfferReceived => "OfferReceived",
            Self::RequestSent => "RequestSent",
            Self::RequestReceived => "RequestReceived",
            Self::CredentialIssued => "CredentialIssued",
            Self::CredentialReceived => "CredentialReceived",
            Self::Done => "Done",
            Self::Abandoned => "Abandoned",
        };
        write!(f, "{}", name)
    }
}

/// Events that drive an issuance exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssuanceEvent {
    /// Issuer offers a credential.
    OfferCredential,
    /// Holder receives an offer.
    ReceiveOffer,
    /// Holder requests the offered credential.
    RequestCredential,
    /// Issuer receives the request.
    ReceiveRequest,
    /// Issuer signs and sends the credential.
    IssueCredential,
    /// Holder receives the credential.
    ReceiveCredential,
    /// Holder verifies and stores the credential.
    AcceptCredential,
    /// Issuer receives the holder's acknowledgement.
    ReceiveAck,
    /// Either party abandons the exchange.
    Abandon,
    /// Either party receives a problem report.
    ReceiveProblemReport,
}

impl IssuanceEvent {
    fn inbound_target(&self) -> Option<(IssuanceState, Role)> {
        match self {
            Self::ReceiveOffer => Some((IssuanceState::OfferReceived, Role::Holder)),
            Self::ReceiveRequest => Some((IssuanceState::RequestReceived, Role::Issuer)),
            Self::ReceiveCredential => Some((IssuanceState::CredentialReceived, Role::Holder)),
            Self::ReceiveAck => Some((IssuanceState::Done, Role::Issuer)),
            _ => None,
        }
    }
}

impl fmt::Display for IssuanceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Outbound work an issuance transition asks its caller to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssuanceEffect {
    SendOffer,
    SendRequest,
    SendCredential,
    SendAck,
    SendProblemReport,
}

/// The outcome of applying an event to an issuance exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceTransition {
    pub from: Option<IssuanceState>,
    pub to: IssuanceState,
    pub effects: Vec<IssuanceEffect>,
    pub replayed: bool,
}

/// Pure transition function for credential issuance exchanges.
///
/// Valid transitions:
/// - Start → OfferSent (OfferCredential)
/// - Start → OfferReceived (ReceiveOffer)
/// - OfferReceived → RequestSent (RequestCredential)
/// - OfferSent → RequestReceived (ReceiveRequest)
/// - RequestReceived → CredentialIssued (IssueCredential)
/// - RequestSent → CredentialReceived (ReceiveCredential)
/// - CredentialReceived → Done (AcceptCredential)
/// - CredentialIssued → Done (ReceiveAck)
/// - any non-final → Abandoned (Abandon, ReceiveProblemReport)
pub struct IssuanceStateMachine;

impl IssuanceStateMachine {
    /// Apply `event` to an exchange currently in `current` (`None` = not yet
    /// started).
    pub fn transition(
        current: Option<IssuanceState>,
        event: IssuanceEvent,
    ) -> Result<IssuanceTransition, CoreError> {
        use IssuanceEffect as Fx;
        use IssuanceEvent as Ev;
        use IssuanceState as St;

        if let Some(state) = current {
            if Self::is_replay(state, event) {
                tracing::debug!(state = %state, event = %event, "replayed issuance message ignored");
                return Ok(IssuanceTransition {
                    from: current,
                    to: state,
                    effects: Vec::new(),
                    replayed: true,
                });
            }
            if state.is_final() {
                return Err(CoreError::TerminalState(state.to_string()));
            }
        }

        let (to, effects) = match (current, event) {
            (None, Ev::OfferCredential) => (St::OfferSent, vec![Fx::SendOffer]),
            (None, Ev::ReceiveOffer) => (St::OfferReceived, vec![]),

            (Some(St::OfferReceived), Ev::RequestCredential) => {
                (St::RequestSent, vec![Fx::SendRequest])
            }
            (Some(St::OfferSent), Ev::ReceiveRequest) => (St::RequestReceived, vec![]),
            (Some(St::RequestReceived), Ev::IssueCredential) => {
                (St::CredentialIssued, vec![Fx::SendCredential])
            }
            (Some(St::RequestSent), Ev::ReceiveCredential) => (St::CredentialReceived, vec![]),
            (Some(St::CredentialReceived), Ev::AcceptCredential) => (St::Done, vec![Fx::SendAck]),
            (Some(St::CredentialIssued), Ev::ReceiveAck) => (St::Done, vec![]),

            (Some(_), Ev::Abandon) => (St::Abandoned, vec![Fx::SendProblemReport]),
            (Some(_), Ev::ReceiveProblemReport) => (St::Abandoned, vec![]),

            _ => {
                return Err(CoreError::InvalidStateTransition {
                    from: current.map_or_else(|| "Start".to_string(), |s| s.to_string()),
                    event: event.to_string(),
                });
            }
        };

        tracing::debug!(
            from = ?current,
            to = %to,
            event = %event,
            "issuance state transition"
        );

        Ok(IssuanceTransition {
            from: current,
            to,
            effects,
            replayed: false,
        })
    }

    fn is_replay(state: IssuanceState, event: IssuanceEvent) -> bool {
        let Some((target, receiver)) = event.inbound_target() else {
            return false;
        };
        if state == IssuanceState::Abandoned {
            return false;
        }
        let same_path = state.role().map_or(true, |role| role == receiver);
        same_path && state.progress() >= target.progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use IssuanceEvent as Ev;
    use IssuanceState as St;

    fn step(state: Option<St>, event: Ev) -> St {
        IssuanceStateMachine::transition(state, event).unwrap().to
    }

    #[test]
    fn test_issuer_path() {
        let s = step(None, Ev::OfferCredential);
        let s = step(Some(s), Ev::ReceiveRequest);
        assert_eq!(s, St::RequestReceived);
        let t = IssuanceStateMachine::transition(Some(s), Ev::IssueCredential).unwrap();
        assert_eq!(t.to, St::CredentialIssued);
        assert_eq!(t.effects, vec![IssuanceEffect::SendCredential]);
        assert_eq!(step(Some(t.to), Ev::ReceiveAck), St::Done);
    }

    #[test]
    fn test_holder_path() {
        let s = step(None, Ev::ReceiveOffer);
        let s = step(Some(s), Ev::RequestCredential);
        assert_eq!(s, St::RequestSent);
        let s = step(Some(s), Ev::ReceiveCredential);
        assert_eq!(s, St::CredentialReceived);
        let t = IssuanceStateMachine::transition(Some(s), Ev::AcceptCredential).unwrap();
        assert_eq!(t.to, St::Done);
        assert_eq!(t.effects, vec![IssuanceEffect::SendAck]);
    }

    #[test]
    fn test_duplicate_credential_is_noop() {
        let t = IssuanceStateMachine::transition(Some(St::Done), Ev::ReceiveCredential).unwrap();
        assert!(t.replayed);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_terminal_rejects_local_events() {
        let result = IssuanceStateMachine::transition(Some(St::Abandoned), Ev::IssueCredential);
        assert!(matches!(result, Err(CoreError::TerminalState(_))));
        let result = IssuanceStateMachine::transition(Some(St::Done), Ev::Abandon);
        assert!(matches!(result, Err(CoreError::TerminalState(_))));
    }

    #[test]
    fn test_cannot_issue_without_request() {
        let result = IssuanceStateMachine::transition(Some(St::OfferSent), Ev::IssueCredential);
        assert!(matches!(
            result,
            Err(CoreError::InvalidStateTransition { .. })
        ));
    }
}
