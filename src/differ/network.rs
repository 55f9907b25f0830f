//! Network classification.

use super::{ActionKind, ActionPlan, PlanStep};
use crate::desired::{Existence, NetworkSpec};
use crate::model::NetworkSnapshot;

/// Primitive network operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NetworkAction {
    /// Create a network with the given name.
    Create {
        /// Network name.
        name: String,
    },
    /// Delete the network.
    Delete {
        /// Provider identifier.
        uuid: String,
    },
}

impl PlanStep for NetworkAction {
    fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }

    fn removes_resource(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

/// Classifies a network. The provider has no mutable network fields, so an
/// existing network always satisfies `present`.
#[must_use]
pub fn classify_network(
    desired: &NetworkSpec,
    found: Option<&NetworkSnapshot>,
) -> ActionPlan<NetworkAction> {
    match (desired.state, found) {
        (Existence::Present, None) => ActionPlan::single(NetworkAction::Create {
            name: desired.name.clone(),
        }),
        (Existence::Absent, Some(network)) => ActionPlan::single(NetworkAction::Delete {
            uuid: network.uuid.clone(),
        }),
        (Existence::Present, Some(_)) | (Existence::Absent, None) => ActionPlan::empty(),
    }
}
