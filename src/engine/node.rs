//! Onboarding node graph — names, edges, completion predicates.
//!
//! Progresses linearly: Greeting → IdentityVerification → ServiceDiscovery →
//! ServiceArea → ProfileReview → PlanSelection → Complete.
//! IdentityVerification self-loops on rejection; ProfileReview exposes edit
//! edges back into earlier nodes. Nodes are stateless descriptors — behavior
//! lives in the handlers.

use serde::{Deserialize, Serialize};

use crate::session::model::Session;

/// The steps of the onboarding graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Greeting,
    IdentityVerification,
    ServiceDiscovery,
    ServiceArea,
    ProfileReview,
    PlanSelection,
    Complete,
}

impl NodeId {
    /// The next node in the linear progression, if any.
    pub fn next(&self) -> Option<NodeId> {
        use NodeId::*;
        match self {
            Greeting => Some(IdentityVerification),
            IdentityVerification => Some(ServiceDiscovery),
            ServiceDiscovery => Some(ServiceArea),
            ServiceArea => Some(ProfileReview),
            ProfileReview => Some(PlanSelection),
            PlanSelection => Some(Complete),
            Complete => None,
        }
    }

    /// Check if a forward transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: NodeId) -> bool {
        self.next() == Some(target)
    }

    /// Valid edit-edge targets from ProfileReview. Re-entry merges into
    /// existing facts, never resets them.
    pub fn edit_targets(&self) -> &'static [NodeId] {
        match self {
            NodeId::ProfileReview => &[
                NodeId::IdentityVerification,
                NodeId::ServiceDiscovery,
                NodeId::ServiceArea,
            ],
            _ => &[],
        }
    }

    /// Whether this node is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Whether this node's handler can act without fresh user input. Nodes
    /// that open by asking the user something (identity search) break the
    /// auto-chain instead.
    pub fn runs_unprompted(&self) -> bool {
        !matches!(self, Self::IdentityVerification)
    }

    /// Completion predicate over session state. A satisfied node is skipped
    /// when the auto-chain advances past it.
    pub fn is_satisfied(&self, session: &Session) -> bool {
        match self {
            Self::Greeting => session.greeted,
            Self::IdentityVerification => session
                .facts
                .identity
                .as_ref()
                .is_some_and(|i| i.verified),
            Self::ServiceDiscovery => session
                .facts
                .services
                .as_ref()
                .is_some_and(|s| s.confirmed),
            Self::ServiceArea => session
                .facts
                .coverage
                .as_ref()
                .is_some_and(|c| c.confirmed),
            Self::ProfileReview => session.reviewed,
            Self::PlanSelection => session.facts.plan.is_some(),
            Self::Complete => session.completed,
        }
    }

    /// The next unsatisfied node along the forward edges, for auto-chain
    /// advancement. Skips nodes whose predicate already holds (an edited
    /// node that re-completes must not re-run its already-confirmed
    /// successors).
    pub fn next_unsatisfied(&self, session: &Session) -> Option<NodeId> {
        let mut cursor = self.next();
        while let Some(node) = cursor {
            if !node.is_satisfied(session) {
                return Some(node);
            }
            cursor = node.next();
        }
        None
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Greeting => "greeting",
            Self::IdentityVerification => "identity_verification",
            Self::ServiceDiscovery => "service_discovery",
            Self::ServiceArea => "service_area",
            Self::ProfileReview => "profile_review",
            Self::PlanSelection => "plan_selection",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}
