//! A data-driven product: actions and their effects come from a JSON
//! catalog, so a simulation can be pointed at a product without code.
//!
//! Outcomes are fully deterministic. An action succeeds iff every flag it
//! `requires` is on and its attempt number is not a multiple of
//! `fail_every`.

use anyhow::{bail, Context, Result};
use personasim_core::{
    adapter::{Action, ActionTag, AppliedAction, ProductAdapter},
    emotion::EmotionalDelta,
    persona::PersonaProfile,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Product state threaded through one persona's run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogState {
    #[serde(default)]
    pub feature_flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub ui_elements:   BTreeMap<String, String>,
    #[serde(default)]
    pub user_data:     BTreeMap<String, Value>,
    #[serde(default)]
    pub system_state:  BTreeMap<String, Value>,
}

impl CatalogState {
    pub fn flag(&self, name: &str) -> bool {
        self.feature_flags.get(name).copied().unwrap_or(false)
    }

    /// How many times `action` has been attempted so far.
    pub fn attempts(&self, action: &str) -> u64 {
        self.system_state
            .get(&attempt_key(action))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

fn attempt_key(action: &str) -> String {
    format!("attempts.{action}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogAction {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub tags: BTreeSet<ActionTag>,
    #[serde(default)]
    pub expected_success: Option<f64>,
    /// Every n-th attempt fails.
    #[serde(default)]
    pub fail_every: Option<u64>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub enables: Vec<String>,
    /// Screen the action lands the persona on.
    #[serde(default)]
    pub screen: Option<String>,
    /// Declared emotional impact, overriding the engine's estimate.
    #[serde(default)]
    pub impact: Option<EmotionalDelta>,
}

impl CatalogAction {
    fn to_action(&self) -> Action {
        Action {
            kind: self.kind.clone(),
            name: self.name.clone(),
            weight: self.weight,
            tags: self.tags.clone(),
            expected_success: self.expected_success,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub initial_state: CatalogState,
    pub actions: Vec<CatalogAction>,
}

pub struct CatalogAdapter {
    catalog: ProductCatalog,
}

impl CatalogAdapter {
    pub fn new(catalog: ProductCatalog) -> Result<Self> {
        if catalog.actions.is_empty() {
            bail!("product catalog has no actions");
        }
        let mut names = BTreeSet::new();
        for action in &catalog.actions {
            if !names.insert(action.name.as_str()) {
                bail!("duplicate catalog action '{}'", action.name);
            }
            if action.fail_every == Some(0) {
                bail!("action '{}': fail_every must be > 0", action.name);
            }
        }
        Ok(Self { catalog })
    }

    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {path}"))?;
        let catalog: ProductCatalog = serde_json::from_str(&content)
            .with_context(|| format!("Cannot parse {path}"))?;
        Self::new(catalog)
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    fn entry(&self, name: &str) -> Option<&CatalogAction> {
        self.catalog.actions.iter().find(|a| a.name == name)
    }
}

impl ProductAdapter for CatalogAdapter {
    type State = CatalogState;

    fn get_initial_state(&self) -> Result<CatalogState> {
        Ok(self.catalog.initial_state.clone())
    }

    fn get_available_actions(&self, _state: &CatalogState, _persona: &PersonaProfile) -> Result<Vec<Action>> {
        Ok(self.catalog.actions.iter().map(CatalogAction::to_action).collect())
    }

    fn apply_action(&self, state: &CatalogState, action: &Action) -> Result<AppliedAction<CatalogState>> {
        let Some(entry) = self.entry(&action.name) else {
            bail!("action '{}' is not in the catalog", action.name);
        };

        let attempt = state.attempts(&entry.name) + 1;
        let missing: Vec<&str> = entry
            .requires
            .iter()
            .filter(|f| !state.flag(f))
            .map(String::as_str)
            .collect();
        let scheduled_failure = entry.fail_every.is_some_and(|n| attempt % n == 0);
        let success = missing.is_empty() && !scheduled_failure;

        let mut next = state.clone();
        next.system_state.insert(attempt_key(&entry.name), json!(attempt));
        if let Some(screen) = &entry.screen {
            next.ui_elements.insert("screen".into(), screen.clone());
        }
        next.user_data.insert("last_action".into(), json!(entry.name));
        if success {
            for flag in &entry.enables {
                next.feature_flags.insert(flag.clone(), true);
            }
            let done = next.user_data.get("completed_actions").and_then(Value::as_u64).unwrap_or(0);
            next.user_data.insert("completed_actions".into(), json!(done + 1));
        }

        let mut applied = if success {
            AppliedAction::succeeded(next)
        } else {
            AppliedAction::failed(next)
        };
        applied = applied.with_note("attempt", json!(attempt));
        if !missing.is_empty() {
            applied = applied.with_note("missing_flags", json!(missing));
        }
        if scheduled_failure {
            applied = applied.with_note("scheduled_failure", json!(true));
        }
        if let Some(impact) = entry.impact {
            applied = applied.with_impact(impact);
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use personasim_core::persona::Archetype;

    fn catalog() -> ProductCatalog {
        serde_json::from_value(json!({
            "actions": [
                { "kind": "onboarding", "name": "connect_repo", "enables": ["repo_connected"] },
                { "kind": "core", "name": "run_report", "requires": ["repo_connected"], "fail_every": 3 }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn required_flags_gate_success() {
        let adapter = CatalogAdapter::new(catalog()).unwrap();
        let report = Action::new("core", "run_report");
        let connect = Action::new("onboarding", "connect_repo");

        let s0 = adapter.get_initial_state().unwrap();
        let blocked = adapter.apply_action(&s0, &report).unwrap();
        assert!(!blocked.success);
        assert_eq!(blocked.notes["missing_flags"], json!(["repo_connected"]));

        let s1 = adapter.apply_action(&s0, &connect).unwrap().state;
        assert!(s1.flag("repo_connected"));
        assert!(adapter.apply_action(&s1, &report).unwrap().success);
    }

    #[test]
    fn fail_every_is_periodic() {
        let adapter = CatalogAdapter::new(catalog()).unwrap();
        let report = Action::new("core", "run_report");
        let mut state = CatalogState::default();
        state.feature_flags.insert("repo_connected".into(), true);

        let mut outcomes = Vec::new();
        for _ in 0..6 {
            let applied = adapter.apply_action(&state, &report).unwrap();
            outcomes.push(applied.success);
            state = applied.state;
        }
        assert_eq!(outcomes, vec![true, true, false, true, true, false]);
        assert_eq!(state.attempts("run_report"), 6);
    }

    #[test]
    fn same_input_same_output() {
        let adapter = CatalogAdapter::new(catalog()).unwrap();
        let persona = PersonaProfile::new("p", Archetype::Casual, 0.5, 0.5);
        let state = adapter.get_initial_state().unwrap();
        assert_eq!(adapter.get_available_actions(&state, &persona).unwrap().len(), 2);

        let a = adapter.apply_action(&state, &Action::new("onboarding", "connect_repo")).unwrap();
        let b = adapter.apply_action(&state, &Action::new("onboarding", "connect_repo")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_or_malformed_catalogs_are_rejected() {
        assert!(CatalogAdapter::new(ProductCatalog { initial_state: CatalogState::default(), actions: vec![] }).is_err());

        let mut bad = catalog();
        bad.actions[1].fail_every = Some(0);
        assert!(CatalogAdapter::new(bad).is_err());
    }
}
