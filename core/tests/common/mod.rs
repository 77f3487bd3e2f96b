//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use personasim_core::{
    adapter::{Action, ActionTag, AppliedAction, ProductAdapter},
    persona::{Archetype, PersonaProfile},
};

// ── Adapters ─────────────────────────────────────────────────────────────────

/// Offers a fixed action list. The state counts applied actions; the
/// first `succeed_first` of them succeed and every later one fails.
#[derive(Debug, Clone)]
pub struct ScriptedAdapter {
    pub actions:       Vec<Action>,
    pub succeed_first: u64,
}

impl ScriptedAdapter {
    pub fn always_succeeds(actions: Vec<Action>) -> Self {
        Self { actions, succeed_first: u64::MAX }
    }
}

impl ProductAdapter for ScriptedAdapter {
    type State = u64;

    fn get_initial_state(&self) -> anyhow::Result<u64> {
        Ok(0)
    }

    fn get_available_actions(&self, _state: &u64, _persona: &PersonaProfile) -> anyhow::Result<Vec<Action>> {
        Ok(self.actions.clone())
    }

    fn apply_action(&self, state: &u64, _action: &Action) -> anyhow::Result<AppliedAction<u64>> {
        let next = state + 1;
        Ok(if *state < self.succeed_first {
            AppliedAction::succeeded(next)
        } else {
            AppliedAction::failed(next)
        })
    }
}

/// Succeeds or fails by action name; every odd attempt at a risky action
/// fails. Used where a varied trace matters more than a scripted one.
#[derive(Debug, Clone)]
pub struct MixedAdapter;

impl ProductAdapter for MixedAdapter {
    type State = Vec<String>;

    fn get_initial_state(&self) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn get_available_actions(&self, state: &Vec<String>, _persona: &PersonaProfile) -> anyhow::Result<Vec<Action>> {
        let mut actions = standard_actions();
        if state.iter().any(|a| a == "configure") {
            actions.push(
                Action::new("social", "invite_teammate")
                    .with_weight(0.4)
                    .with_tag(ActionTag::Social),
            );
        }
        Ok(actions)
    }

    fn apply_action(&self, state: &Vec<String>, action: &Action) -> anyhow::Result<AppliedAction<Vec<String>>> {
        let attempts = state.iter().filter(|a| **a == action.name).count();
        let mut next = state.clone();
        next.push(action.name.clone());
        let success = !(action.has_tag(ActionTag::Risky) && attempts % 2 == 1);
        Ok(if success {
            AppliedAction::succeeded(next)
        } else {
            AppliedAction::failed(next)
        })
    }
}

/// Offers nothing.
#[derive(Debug, Clone)]
pub struct EmptyAdapter;

impl ProductAdapter for EmptyAdapter {
    type State = ();

    fn get_initial_state(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn get_available_actions(&self, _state: &(), _persona: &PersonaProfile) -> anyhow::Result<Vec<Action>> {
        Ok(Vec::new())
    }

    fn apply_action(&self, _state: &(), _action: &Action) -> anyhow::Result<AppliedAction<()>> {
        Ok(AppliedAction::succeeded(()))
    }
}

/// Fails every apply call.
#[derive(Debug, Clone)]
pub struct BrokenAdapter;

impl ProductAdapter for BrokenAdapter {
    type State = ();

    fn get_initial_state(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn get_available_actions(&self, _state: &(), _persona: &PersonaProfile) -> anyhow::Result<Vec<Action>> {
        Ok(vec![Action::new("core", "use_feature")])
    }

    fn apply_action(&self, _state: &(), action: &Action) -> anyhow::Result<AppliedAction<()>> {
        anyhow::bail!("backend unavailable for {}", action.name)
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn basic_actions() -> Vec<Action> {
    vec![
        Action::new("core", "use_feature").with_weight(0.7),
        Action::new("settings", "configure").with_weight(0.3),
    ]
}

pub fn standard_actions() -> Vec<Action> {
    vec![
        Action::new("core", "use_feature").with_weight(0.5),
        Action::new("settings", "configure").with_weight(0.2),
        Action::new("ops", "bulk_import")
            .with_weight(0.2)
            .with_tag(ActionTag::Risky)
            .expecting(0.6),
        Action::new("content", "share_dashboard")
            .with_weight(0.1)
            .with_tag(ActionTag::Delight),
    ]
}

pub fn persona(id: &str) -> PersonaProfile {
    PersonaProfile::new(id, Archetype::Pragmatist, 0.5, 0.5)
}

pub fn population(n: usize) -> Vec<PersonaProfile> {
    let archetypes = [
        Archetype::Explorer,
        Archetype::Pragmatist,
        Archetype::Skeptic,
        Archetype::PowerUser,
        Archetype::Casual,
    ];
    (0..n)
        .map(|i| {
            let risk = (i % 5) as f64 / 4.0;
            let patience = ((i + 2) % 5) as f64 / 4.0;
            PersonaProfile::new(format!("persona-{i:03}"), archetypes[i % archetypes.len()], risk, patience)
                .with_delight_triggers(["share"])
        })
        .collect()
}
