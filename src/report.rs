//! Reconciliation outcome in a stable, serialisable schema.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::LiveResource;

/// Outcome of one reconciliation.
///
/// `changed == false` always comes with an empty `actions` list and
/// `after == before`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReconcileResult {
    /// Whether any mutating call was issued (or would be, in check mode).
    pub changed: bool,
    /// Resource as located before the plan ran.
    pub before: Option<LiveResource>,
    /// Resource as re-fetched after the plan ran.
    pub after: Option<LiveResource>,
    /// Flat attribute map of `after`, or of `before` once deleted.
    pub attributes: Map<String, Value>,
    /// Labels of the primitive actions executed or planned.
    pub actions: Vec<String>,
}

impl ReconcileResult {
    /// The resource already matched its desired state.
    #[must_use]
    pub fn unchanged(before: Option<LiveResource>) -> Self {
        Self::assemble(false, before.clone(), before, Vec::new())
    }

    /// A plan ran to completion.
    #[must_use]
    pub fn applied(
        before: Option<LiveResource>,
        after: Option<LiveResource>,
        actions: Vec<String>,
    ) -> Self {
        let changed = !actions.is_empty();
        Self::assemble(changed, before, after, actions)
    }

    /// A plan was computed but not executed.
    ///
    /// `after` is only known when the plan is empty.
    #[must_use]
    pub fn planned(before: Option<LiveResource>, actions: Vec<String>) -> Self {
        if actions.is_empty() {
            return Self::unchanged(before);
        }
        Self::assemble(true, before, None, actions)
    }

    /// A plan aborted after executing `actions`.
    ///
    /// The failing step may have issued some of its calls, so the result is
    /// also marked changed when the re-fetched `after` differs from `before`.
    #[must_use]
    pub fn partial(
        before: Option<LiveResource>,
        after: Option<LiveResource>,
        actions: Vec<String>,
    ) -> Self {
        let changed = !actions.is_empty() || before != after;
        Self::assemble(changed, before, after, actions)
    }

    fn assemble(
        changed: bool,
        before: Option<LiveResource>,
        after: Option<LiveResource>,
        actions: Vec<String>,
    ) -> Self {
        let attributes = after
            .as_ref()
            .or(before.as_ref())
            .map(LiveResource::attributes)
            .unwrap_or_default();
        Self {
            changed,
            before,
            after,
            attributes,
            actions,
        }
    }
}
