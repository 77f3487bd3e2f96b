//! Decision maker: weighted, trait-aware action selection.
//!
//! effective weight = base
//!                  × risk multiplier          (Risky tag)
//!                  × trait multipliers        (Advanced / NewFeature / Social tags)
//!                  × patience multiplier      (remembered frustration with this action)
//!                  × frustration penalty      (exp(-rate × frustrating uses of this kind))
//!                  × referral boost           (referral keyword in the action name)
//!
//! The final pick is a single weighted draw over the adapter's list in
//! the order the adapter returned it.

use crate::{
    adapter::{Action, ActionTag},
    config::DecisionPolicy,
    error::{SimError, SimResult},
    persona::{
        Archetype, CollaborationStyle, ExperienceLevel, PersonaProfile, PersonaRuntimeState,
        TechAdoption,
    },
    rng::RandomSource,
    types::Day,
};

const PATIENCE_FLOOR: f64 = 0.05;

/// The chosen action plus how it was weighed.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action:      Action,
    pub weight:      f64,
    pub probability: f64,
}

pub struct DecisionMaker {
    policy: DecisionPolicy,
}

impl DecisionMaker {
    pub fn new(policy: DecisionPolicy) -> Self {
        Self { policy }
    }

    pub fn choose_action(
        &self,
        persona: &PersonaProfile,
        runtime: &PersonaRuntimeState,
        available: &[Action],
        day: Day,
        rng: &mut RandomSource,
    ) -> SimResult<Decision> {
        if available.is_empty() {
            return Err(SimError::NoActionsAvailable {
                persona_id: persona.id.clone(),
                day,
            });
        }

        let weights = self.score_actions(persona, runtime, available);
        let draw = rescale_if_unbounded(&weights);
        let total: f64 = draw.iter().sum();
        let candidates: Vec<(usize, f64)> = draw.iter().copied().enumerate().collect();
        let picked = *rng.weighted_choice(&candidates)?;

        Ok(Decision {
            action: available[picked].clone(),
            weight: weights[picked],
            probability: draw[picked] / total,
        })
    }

    /// Effective weight of every action, in input order.
    pub fn score_actions(
        &self,
        persona: &PersonaProfile,
        runtime: &PersonaRuntimeState,
        available: &[Action],
    ) -> Vec<f64> {
        available
            .iter()
            .map(|action| self.score(persona, runtime, action))
            .collect()
    }

    fn score(&self, persona: &PersonaProfile, runtime: &PersonaRuntimeState, action: &Action) -> f64 {
        let p = &self.policy;
        let mut weight = action.base_weight();

        if action.has_tag(ActionTag::Risky) {
            weight *= p.risky_floor + (1.0 - p.risky_floor) * persona.risk();
        }

        weight *= trait_multiplier(persona, action);

        if let Some(avg) = runtime.mean_frustration_for(&action.name) {
            let impatience = 1.0 - persona.patience();
            weight *= (1.0 - impatience * avg * p.patience_weight).max(PATIENCE_FLOOR);
        }

        let frustrating = runtime.frustrating_uses_of_kind(&action.kind, p.frustration_threshold);
        if frustrating > 0 {
            weight *= (-p.frustration_penalty_rate * frustrating as f64).exp();
        }

        if persona.referral_trigger_in(&action.name).is_some() {
            weight *= p.referral_boost;
        }

        if weight.is_nan() { 0.0 } else { weight.clamp(0.0, f64::MAX) }
    }
}

/// Weights whose sum overflows are divided by the largest one so the
/// draw keeps their proportions.
fn rescale_if_unbounded(weights: &[f64]) -> Vec<f64> {
    if weights.iter().sum::<f64>().is_finite() {
        return weights.to_vec();
    }
    let max = weights.iter().copied().fold(0.0, f64::max);
    weights.iter().map(|w| w / max).collect()
}

/// Product of the categorical trait multipliers that apply to `action`.
pub fn trait_multiplier(persona: &PersonaProfile, action: &Action) -> f64 {
    let mut m = 1.0;

    if action.has_tag(ActionTag::Advanced) {
        m *= match persona.experience_level {
            ExperienceLevel::Novice       => 0.5,
            ExperienceLevel::Intermediate => 1.0,
            ExperienceLevel::Expert       => 1.4,
            ExperienceLevel::Unknown      => 1.0,
        };
    }

    if action.has_tag(ActionTag::NewFeature) {
        m *= match persona.tech_adoption {
            TechAdoption::Innovator     => 1.6,
            TechAdoption::EarlyAdopter  => 1.3,
            TechAdoption::EarlyMajority => 1.0,
            TechAdoption::LateMajority  => 0.8,
            TechAdoption::Laggard       => 0.5,
            TechAdoption::Unknown       => 1.0,
        };
    }

    if action.has_tag(ActionTag::Social) {
        m *= match persona.collaboration_style {
            CollaborationStyle::Independent   => 0.7,
            CollaborationStyle::Collaborative => 1.3,
            CollaborationStyle::Leader        => 1.5,
            CollaborationStyle::Unknown       => 1.0,
        };
    }

    if action.has_tag(ActionTag::NewFeature) || action.has_tag(ActionTag::Advanced) {
        m *= match persona.archetype {
            Archetype::Explorer   => 1.3,
            Archetype::PowerUser  => 1.2,
            Archetype::Pragmatist => 1.0,
            Archetype::Casual     => 0.9,
            Archetype::Skeptic    => 0.8,
            Archetype::Unknown    => 1.0,
        };
    }

    m
}
