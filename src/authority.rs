//! Role derivation from room join order.
//!
//! Both ends of a match observe the same transport-provided join order, so
//! role assignment is a pure function of that order and needs no
//! negotiation round-trip. The first identity to join holds authority:
//! restart permission and tie-break rights for terminal presentation.

use crate::game::Mark;
use serde::{Deserialize, Serialize};

/// Identity of a room participant, as reported by the transport.
pub type ParticipantId = String;

/// Role a participant holds for the duration of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Tie-break authority; may initiate restarts.
    Authority,
    /// The other participant.
    Peer,
}

/// The fixed role mapping for one match.
///
/// Derived once when the roster reaches two participants and re-derived
/// verbatim on restart, so authority never flaps mid-match even if the
/// transport re-reports membership transiently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    authority: ParticipantId,
    peer: ParticipantId,
}

impl RoleAssignment {
    /// Derives roles from the room's join order.
    ///
    /// Returns `None` unless exactly two identities are present. The first
    /// identity in join order (the room's creator, per the transport) is
    /// the authority.
    pub fn derive(join_order: &[ParticipantId]) -> Option<Self> {
        match join_order {
            [first, second] => Some(Self {
                authority: first.clone(),
                peer: second.clone(),
            }),
            _ => None,
        }
    }

    /// Returns the authority's identity.
    pub fn authority(&self) -> &ParticipantId {
        &self.authority
    }

    /// Returns the peer's identity.
    pub fn peer(&self) -> &ParticipantId {
        &self.peer
    }

    /// Returns the role held by `identity`, if it is part of the match.
    pub fn role_of(&self, identity: &str) -> Option<Role> {
        if self.authority == identity {
            Some(Role::Authority)
        } else if self.peer == identity {
            Some(Role::Peer)
        } else {
            None
        }
    }

    /// Returns the mark played by `role`.
    ///
    /// The authority always plays the configured authority mark; the peer
    /// plays its opponent.
    pub fn mark_of(&self, role: Role, authority_mark: Mark) -> Mark {
        match role {
            Role::Authority => authority_mark,
            Role::Peer => authority_mark.opponent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join_order() -> Vec<ParticipantId> {
        vec!["alice".to_string(), "bob".to_string()]
    }

    #[test]
    fn first_joiner_is_authority() {
        let roles = RoleAssignment::derive(&join_order()).expect("two participants");

        assert_eq!(roles.role_of("alice"), Some(Role::Authority));
        assert_eq!(roles.role_of("bob"), Some(Role::Peer));
        assert_eq!(roles.role_of("mallory"), None);
    }

    #[test]
    fn derivation_is_deterministic() {
        let first = RoleAssignment::derive(&join_order());
        let second = RoleAssignment::derive(&join_order());

        assert_eq!(first, second);
    }

    #[test]
    fn incomplete_roster_yields_no_assignment() {
        assert_eq!(RoleAssignment::derive(&["solo".to_string()]), None);
        assert_eq!(RoleAssignment::derive(&[]), None);
    }

    #[test]
    fn authority_plays_configured_mark() {
        let roles = RoleAssignment::derive(&join_order()).expect("two participants");

        assert_eq!(roles.mark_of(Role::Authority, Mark::X), Mark::X);
        assert_eq!(roles.mark_of(Role::Peer, Mark::X), Mark::O);
        assert_eq!(roles.mark_of(Role::Authority, Mark::O), Mark::O);
        assert_eq!(roles.mark_of(Role::Peer, Mark::O), Mark::X);
    }
}
