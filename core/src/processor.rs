//! Action processor: applies one chosen action through the adapter and
//! estimates the persona's emotional reaction.
//!
//! RULE: No hidden state and no randomness. Identical inputs must give
//! identical results; the adapter is the only collaborator.

use crate::{
    adapter::{Action, ActionTag, ProductAdapter},
    emotion::EmotionalDelta,
    error::{SimError, SimResult},
    persona::{PersonaProfile, PersonaRuntimeState},
    types::Day,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Where in the run this action happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnContext {
    pub day:     Day,
    pub session: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult<S> {
    pub state:            S,
    pub success:          bool,
    pub turn:             TurnContext,
    pub delta:            EmotionalDelta,
    pub delight_trigger:  bool,
    pub referral_trigger: bool,
    pub context:          BTreeMap<String, Value>,
}

pub struct ActionProcessor<'a, A: ProductAdapter> {
    adapter: &'a A,
}

impl<'a, A: ProductAdapter> ActionProcessor<'a, A> {
    pub fn new(adapter: &'a A) -> Self {
        Self { adapter }
    }

    pub fn process(
        &self,
        persona: &PersonaProfile,
        runtime: &PersonaRuntimeState,
        product_state: &A::State,
        action: &Action,
        turn: TurnContext,
    ) -> SimResult<ActionResult<A::State>> {
        let applied = self
            .adapter
            .apply_action(product_state, action)
            .map_err(SimError::Adapter)?;

        let expected = action.expected();
        let surprise = if applied.success { 1.0 - expected } else { -expected };
        let estimated = estimate_delta(action, applied.success, expected);
        let delta = match &applied.impact {
            Some(declared) => estimated.overlay(declared),
            None => estimated,
        };

        let delight_keyword = persona.delight_trigger_in(&action.name);
        let referral_keyword = persona.referral_trigger_in(&action.name);
        let delight_trigger = delight_keyword.is_some() || action.has_tag(ActionTag::Delight);

        let mut context = applied.notes;
        context.insert("day".into(), json!(turn.day));
        context.insert("session".into(), json!(turn.session));
        context.insert("expected_success".into(), json!(expected));
        context.insert("surprise".into(), json!(surprise));
        context.insert("prior_actions".into(), json!(runtime.action_count));
        if let Some(keyword) = delight_keyword.or(referral_keyword) {
            context.insert("observed_trigger".into(), json!(keyword));
        }

        Ok(ActionResult {
            state: applied.state,
            success: applied.success,
            turn,
            delta,
            delight_trigger,
            referral_trigger: referral_keyword.is_some(),
            context,
        })
    }
}

/// Reaction from expectation versus reality.
///
/// Expected wins are mildly pleasant; unexpected wins delight. Failures
/// sting more the more confidently success was promised, and a failed
/// critical action is maximally frustrating.
pub fn estimate_delta(action: &Action, success: bool, expected: f64) -> EmotionalDelta {
    let (frustration, delight) = if success {
        let surprise = (1.0 - expected).max(0.0);
        (0.1 * (1.0 - expected), (0.4 + 0.6 * surprise).min(1.0))
    } else if action.has_tag(ActionTag::Critical) {
        (1.0, 0.0)
    } else {
        (0.5 + 0.5 * expected, 0.0)
    };
    EmotionalDelta {
        frustration: Some(frustration),
        delight: Some(delight),
        ..EmotionalDelta::default()
    }
}
