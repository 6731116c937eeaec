use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Which side of an exchange a party plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Holder / prover in a proof exchange, holder in an issuance exchange.
    Holder,
    /// Verifier in a proof exchange.
    Verifier,
    /// Issuer in an issuance exchange.
    Issuer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Holder => write!(f, "Holder"),
            Self::Verifier => write!(f, "Verifier"),
            Self::Issuer => write!(f, "Issuer"),
        }
    }
}

/// The states of a presentation (proof) exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofExchangeState {
    /// Holder sent a presentation proposal.
    ProposalSent,
    /// Verifier received a presentation proposal.
    ProposalReceived,
    /// Verifier sent a presentation request.
    RequestSent,
    /// Holder received a presentation request.
    RequestReceived,
    /// Holder signed and sent a presentation.
    PresentationSent,
    /// Verifier received a presentation.
    PresentationReceived,
    /// Presentation accepted. Final state.
    Done,
    /// Exchange abandoned. Final state.
    Abandoned,
}

impl ProofExchangeState {
    /// Whether this is a final (terminal) state.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Done | Self::Abandoned)
    }

    /// How far along the protocol this state is.
    fn progress(&self) -> u8 {
        match self {
            Self::ProposalSent | Self::ProposalReceived => 1,
            Self::RequestSent | Self::RequestReceived => 2,
            Self::PresentationSent | Self::PresentationReceived => 3,
            Self::Done => 4,
            Self::Abandoned => 5,
        }
    }

    /// The role a party in this state plays, if the state is role-specific.
    fn role(&self) -> Option<Role> {
        match self {
            Self::ProposalSent | Self::RequestReceived | Self::PresentationSent => {
                Some(Role::Holder)
            }
            Self::ProposalReceived | Self::RequestSent | Self::PresentationReceived => {
                Some(Role::Verifier)
            }
            Self::Done | Self::Abandoned => None,
        }
    }
}

impl fmt::Display for ProofExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProposalSent => "ProposalSent",
            Self::ProposalReceived => "ProposalReceived",
            Self::RequestSent => "RequestSent",
            Self::RequestReceived => "RequestReceived",
            Self::PresentationSent => "PresentationSent",
            Self::PresentationReceived => "PresentationReceived",
            Self::Done => "Done",
            Self::Abandoned => "Abandoned",
        };
        write!(f, "{}", name)
    }
}

/// Events that drive a proof exchange.
///
/// `Receive*` events are triggered by inbound messages; the rest are local
/// decisions of the party owning the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofEvent {
    /// Holder proposes a presentation.
    ProposePresentation,
    /// Verifier receives a proposal.
    ReceiveProposal,
    /// Verifier requests a presentation (directly, or by accepting a proposal).
    RequestPresentation,
    /// Holder receives a request.
    ReceiveRequest,
    /// Holder accepts the request, signs and sends the presentation.
    SendPresentation,
    /// Verifier receives a presentation.
    ReceivePresentation,
    /// Verifier accepts a verified presentation.
    AcceptPresentation,
    /// Holder receives the verifier's acknowledgement.
    ReceiveAck,
    /// Either party abandons the exchange.
    Abandon,
    /// Either party receives a problem report.
    ReceiveProblemReport,
}

impl ProofEvent {
    /// Whether this event is triggered by an inbound message.
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            Self::ReceiveProposal
                | Self::ReceiveRequest
                | Self::ReceivePresentation
                | Self::ReceiveAck
                | Self::ReceiveProblemReport
        )
    }

    /// The state an inbound message moves its receiver to, and the role of
    /// that receiver.
    fn inbound_target(&self) -> Option<(ProofExchangeState, Role)> {
        match self {
            Self::ReceiveProposal => Some((ProofExchangeState::ProposalReceived, Role::Verifier)),
            Self::ReceiveRequest => Some((ProofExchangeState::RequestReceived, Role::Holder)),
            Self::ReceivePresentation => {
                Some((ProofExchangeState::PresentationReceived, Role::Verifier))
            }
            Self::ReceiveAck => Some((ProofExchangeState::Done, Role::Holder)),
            _ => None,
        }
    }
}

impl fmt::Display for ProofEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Outbound work a transition asks its caller to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofEffect {
    SendProposal,
    SendRequest,
    SendPresentation,
    SendAck,
    /// Best-effort notification; never awaited for acknowledgement.
    SendProblemReport,
}

/// The outcome of applying an event to a proof exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofTransition {
    /// State before the event.
    pub from: Option<ProofExchangeState>,
    /// State after the event.
    pub to: ProofExchangeState,
    /// Effects the caller must apply, in order.
    pub effects: Vec<ProofEffect>,
    /// The event re-delivered a message the exchange already moved past.
    pub replayed: bool,
}

/// Pure transition function for presentation exchanges.
///
/// Valid transitions:
/// - Start → ProposalSent (ProposePresentation)
/// - Start → ProposalReceived (ReceiveProposal)
/// - Start → RequestSent (RequestPresentation)
/// - Start → RequestReceived (ReceiveRequest)
/// - ProposalSent → RequestReceived (ReceiveRequest)
/// - ProposalReceived → RequestSent (RequestPresentation)
/// - RequestReceived → PresentationSent (SendPresentation)
/// - RequestSent → PresentationReceived (ReceivePresentation)
/// - PresentationReceived → Done (AcceptPresentation)
/// - PresentationSent → Done (ReceiveAck)
/// - any non-final → Abandoned (Abandon, ReceiveProblemReport)
pub struct ProofStateMachine;

impl ProofStateMachine {
    /// Apply `event` to an exchange currently in `current` (`None` = not yet
    /// started).
    pub fn transition(
        current: Option<ProofExchangeState>,
        event: ProofEvent,
    ) -> Result<ProofTransition, CoreError> {
        use ProofEffect as Fx;
        use ProofEvent as Ev;
        use ProofExchangeState as St;

        if let Some(state) = current {
            if Self::is_replay(state, event) {
                tracing::debug!(state = %state, event = %event, "replayed proof message ignored");
                return Ok(ProofTransition {
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
            // From start
            (None, Ev::ProposePresentation) => (St::ProposalSent, vec![Fx::SendProposal]),
            (None, Ev::ReceiveProposal) => (St::ProposalReceived, vec![]),
            (None, Ev::RequestPresentation) => (St::RequestSent, vec![Fx::SendRequest]),
            (None, Ev::ReceiveRequest) => (St::RequestReceived, vec![]),

            // Holder side
            (Some(St::ProposalSent), Ev::ReceiveRequest) => (St::RequestReceived, vec![]),
            (Some(St::RequestReceived), Ev::SendPresentation) => {
                (St::PresentationSent, vec![Fx::SendPresentation])
            }
            (Some(St::PresentationSent), Ev::ReceiveAck) => (St::Done, vec![]),

            // Verifier side
            (Some(St::ProposalReceived), Ev::RequestPresentation) => {
                (St::RequestSent, vec![Fx::SendRequest])
            }
            (Some(St::RequestSent), Ev::ReceivePresentation) => (St::PresentationReceived, vec![]),
            (Some(St::PresentationReceived), Ev::AcceptPresentation) => {
                (St::Done, vec![Fx::SendAck])
            }

            // Abandonment from any non-final state
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
            "proof exchange state transition"
        );

        Ok(ProofTransition {
            from: current,
            to,
            effects,
            replayed: false,
        })
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: Option<ProofExchangeState>, event: ProofEvent) -> bool {
        matches!(Self::transition(current, event), Ok(t) if !t.replayed)
    }

    /// An inbound message is a replay when the receiver already reached (or
    /// passed) the state that message would move it to on its own path.
    fn is_replay(state: ProofExchangeState, event: ProofEvent) -> bool {
        let Some((target, receiver)) = event.inbound_target() else {
            return false;
        };
        if state == ProofExchangeState::Abandoned {
            return false;
        }
        let same_path = state.role().map_or(true, |role| role == receiver);
        same_path && state.progress() >= target.progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProofEvent as Ev;
    use ProofExchangeState as St;

    fn step(state: Option<St>, event: Ev) -> St {
        ProofStateMachine::transition(state, event).unwrap().to
    }

    #[test]
    fn test_holder_happy_path() {
        let s = step(None, Ev::ProposePresentation);
        assert_eq!(s, St::ProposalSent);
        let s = step(Some(s), Ev::ReceiveRequest);
        assert_eq!(s, St::RequestReceived);
        let s = step(Some(s), Ev::SendPresentation);
        assert_eq!(s, St::PresentationSent);
        let s = step(Some(s), Ev::ReceiveAck);
        assert_eq!(s, St::Done);
        assert!(s.is_final());
    }

    #[test]
    fn test_verifier_happy_path() {
        let s = step(None, Ev::RequestPresentation);
        assert_eq!(s, St::RequestSent);
        let s = step(Some(s), Ev::ReceivePresentation);
        assert_eq!(s, St::PresentationReceived);
        let s = step(Some(s), Ev::AcceptPresentation);
        assert_eq!(s, St::Done);
    }

    #[test]
    fn test_verifier_accepts_proposal() {
        let s = step(None, Ev::ReceiveProposal);
        assert_eq!(s, St::ProposalReceived);
        let t = ProofStateMachine::transition(Some(s), Ev::RequestPresentation).unwrap();
        assert_eq!(t.to, St::RequestSent);
        assert_eq!(t.effects, vec![ProofEffect::SendRequest]);
    }

    #[test]
    fn test_effects() {
        let t = ProofStateMachine::transition(None, Ev::ProposePresentation).unwrap();
        assert_eq!(t.effects, vec![ProofEffect::SendProposal]);
        let t = ProofStateMachine::transition(Some(St::RequestReceived), Ev::SendPresentation)
            .unwrap();
        assert_eq!(t.effects, vec![ProofEffect::SendPresentation]);
        let t = ProofStateMachine::transition(Some(St::PresentationReceived), Ev::AcceptPresentation)
            .unwrap();
        assert_eq!(t.effects, vec![ProofEffect::SendAck]);
        let t = ProofStateMachine::transition(Some(St::RequestSent), Ev::Abandon).unwrap();
        assert_eq!(t.effects, vec![ProofEffect::SendProblemReport]);
    }

    #[test]
    fn test_abandon_from_every_non_final_state() {
        for state in [
            St::ProposalSent,
            St::ProposalReceived,
            St::RequestSent,
            St::RequestReceived,
            St::PresentationSent,
            St::PresentationReceived,
        ] {
            assert_eq!(step(Some(state), Ev::Abandon), St::Abandoned);
            assert_eq!(step(Some(state), Ev::ReceiveProblemReport), St::Abandoned);
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for state in [St::Done, St::Abandoned] {
            for event in [
                Ev::ProposePresentation,
                Ev::RequestPresentation,
                Ev::SendPresentation,
                Ev::AcceptPresentation,
                Ev::Abandon,
                Ev::ReceiveProblemReport,
            ] {
                let result = ProofStateMachine::transition(Some(state), event);
                assert!(
                    matches!(result, Err(CoreError::TerminalState(_))),
                    "{state} accepted {event}"
                );
            }
        }
    }

    #[test]
    fn test_abandoned_rejects_inbound_messages() {
        let result = ProofStateMachine::transition(Some(St::Abandoned), Ev::ReceivePresentation);
        assert!(matches!(result, Err(CoreError::TerminalState(_))));
    }

    #[test]
    fn test_duplicate_request_is_noop() {
        for state in [St::RequestReceived, St::PresentationSent, St::Done] {
            let t = ProofStateMachine::transition(Some(state), Ev::ReceiveRequest).unwrap();
            assert!(t.replayed);
            assert_eq!(t.to, state);
            assert!(t.effects.is_empty());
        }
    }

    #[test]
    fn test_duplicate_presentation_is_noop() {
        for state in [St::PresentationReceived, St::Done] {
            let t = ProofStateMachine::transition(Some(state), Ev::ReceivePresentation).unwrap();
            assert!(t.replayed);
            assert!(t.effects.is_empty());
        }
    }

    #[test]
    fn test_message_for_other_role_is_rejected() {
        let result = ProofStateMachine::transition(Some(St::RequestSent), Ev::ReceiveRequest);
        assert!(matches!(
            result,
            Err(CoreError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_invalid_skips() {
        assert!(!ProofStateMachine::can_transition(None, Ev::SendPresentation));
        assert!(!ProofStateMachine::can_transition(None, Ev::AcceptPresentation));
        assert!(!ProofStateMachine::can_transition(Some(St::RequestSent), Ev::AcceptPresentation));
        assert!(!ProofStateMachine::can_transition(Some(St::ProposalSent), Ev::SendPresentation));
        assert!(!ProofStateMachine::can_transition(None, Ev::Abandon));
    }

    #[test]
    fn test_display() {
        assert_eq!(St::PresentationReceived.to_string(), "PresentationReceived");
        assert_eq!(Role::Verifier.to_string(), "Verifier");
    }
}
