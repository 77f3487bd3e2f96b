//! The product adapter boundary.
//!
//! RULE: The engine never looks inside a product state. It clones the
//! initial state per persona, hands it to the adapter, and stores
//! whatever comes back.

use crate::{emotion::EmotionalDelta, persona::PersonaProfile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Behavioural tags an adapter attaches to an action.
/// Variants are only appended, never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTag {
    /// Can go wrong in ways a cautious persona avoids.
    Risky,
    /// Failure here can trigger abandonment.
    Critical,
    /// Uninstall, cancel, or any explicit "I'm leaving" action.
    Abandon,
    /// Designed to delight; counts as recovery for at-risk personas.
    Delight,
    Advanced,
    NewFeature,
    Social,
}

/// One action offered by the adapter for the current persona and state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: String,
    pub name: String,
    /// Base selection weight. Absent means 1.0.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub tags: BTreeSet<ActionTag>,
    /// Declared probability the action succeeds. Absent means 1.0.
    #[serde(default)]
    pub expected_success: Option<f64>,
}

impl Action {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            weight: None,
            tags: BTreeSet::new(),
            expected_success: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_tag(mut self, tag: ActionTag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn expecting(mut self, expected_success: f64) -> Self {
        self.expected_success = Some(expected_success);
        self
    }

    pub fn has_tag(&self, tag: ActionTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn base_weight(&self) -> f64 {
        match self.weight {
            Some(w) if w.is_finite() => w.max(0.0),
            Some(_) => 0.0,
            None => 1.0,
        }
    }

    pub fn expected(&self) -> f64 {
        self.expected_success.unwrap_or(1.0).clamp(0.0, 1.0)
    }
}

/// What the adapter reports after applying an action.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedAction<S> {
    pub state: S,
    pub success: bool,
    /// Optional emotional observations declared by the product.
    /// Present components override the processor's own estimate.
    pub impact: Option<EmotionalDelta>,
    pub notes: BTreeMap<String, serde_json::Value>,
}

impl<S> AppliedAction<S> {
    pub fn succeeded(state: S) -> Self {
        Self { state, success: true, impact: None, notes: BTreeMap::new() }
    }

    pub fn failed(state: S) -> Self {
        Self { state, success: false, impact: None, notes: BTreeMap::new() }
    }

    pub fn with_impact(mut self, impact: EmotionalDelta) -> Self {
        self.impact = Some(impact);
        self
    }

    pub fn with_note(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.notes.insert(key.into(), value);
        self
    }
}

/// The contract every simulated product must fulfill.
///
/// Implementations must be deterministic: the same state and action
/// must always produce the same outcome. Randomness belongs to the
/// engine's RandomSource, never to the adapter.
pub trait ProductAdapter {
    type State: Clone;

    fn get_initial_state(&self) -> anyhow::Result<Self::State>;

    /// Actions open to `persona` in `state`. An empty list is fatal.
    fn get_available_actions(
        &self,
        state: &Self::State,
        persona: &PersonaProfile,
    ) -> anyhow::Result<Vec<Action>>;

    fn apply_action(
        &self,
        state: &Self::State,
        action: &Action,
    ) -> anyhow::Result<AppliedAction<Self::State>>;
}
