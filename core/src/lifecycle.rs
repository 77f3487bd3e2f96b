//! Persona lifecycle state machine.
//!
//! GRAPH (the only legal edges):
//!   new     -> active      first successful action
//!   active  -> engaged     enough actions and enough recent delight
//!   engaged -> at_risk     sustained high frustration
//!   at_risk -> retained    successful delight action before the deadline
//!   at_risk -> churned     deadline elapsed without recovery
//!   new | active | engaged | at_risk -> churned   abandonment only
//!
//! Abandonment is an explicit abandon action, a failed critical action
//! above the abandonment threshold, or a long enough run of outcomes
//! above that threshold.
//!
//! retained and churned are terminal. Evaluating a terminal persona
//! is a no-op, never an error.

use crate::{
    adapter::{Action, ActionTag},
    config::LifecyclePolicy,
    persona::{PersonaProfile, PersonaRuntimeState},
    types::Day,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    New,
    Active,
    Engaged,
    AtRisk,
    Retained,
    Churned,
}

impl LifecycleStage {
    pub const ALL: [LifecycleStage; 6] = [
        Self::New,
        Self::Active,
        Self::Engaged,
        Self::AtRisk,
        Self::Retained,
        Self::Churned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New      => "new",
            Self::Active   => "active",
            Self::Engaged  => "engaged",
            Self::AtRisk   => "at_risk",
            Self::Retained => "retained",
            Self::Churned  => "churned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Retained | Self::Churned)
    }

    pub fn can_transition_to(&self, next: LifecycleStage) -> bool {
        use LifecycleStage::*;
        matches!(
            (*self, next),
            (New, Active)
                | (Active, Engaged)
                | (Engaged, AtRisk)
                | (AtRisk, Retained)
                | (New | Active | Engaged | AtRisk, Churned)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    FirstSuccess,
    EngagementThreshold,
    SustainedFrustration,
    DelightRecovery,
    DeadlineElapsed,
    Abandonment,
}

impl TransitionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstSuccess         => "first_success",
            Self::EngagementThreshold  => "engagement_threshold",
            Self::SustainedFrustration => "sustained_frustration",
            Self::DelightRecovery      => "delight_recovery",
            Self::DeadlineElapsed      => "deadline_elapsed",
            Self::Abandonment          => "abandonment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from:     LifecycleStage,
    pub to:       LifecycleStage,
    pub day:      Day,
    /// Sequence number of the action that caused it.
    pub sequence: u64,
    pub reason:   TransitionReason,
}

/// The facts about the just-applied action the machine needs.
#[derive(Debug, Clone, Copy)]
pub struct ActionOutcome<'a> {
    pub action:          &'a Action,
    pub success:         bool,
    pub delight_trigger: bool,
}

pub struct StateMachine {
    policy: LifecyclePolicy,
}

impl StateMachine {
    pub fn new(policy: LifecyclePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// Decide the transition, if any, caused by the action just applied.
    /// `runtime` must already reflect the action's emotional update.
    pub fn evaluate(
        &self,
        persona: &PersonaProfile,
        runtime: &PersonaRuntimeState,
        outcome: ActionOutcome<'_>,
        day: Day,
    ) -> Option<StageTransition> {
        let from = runtime.stage;
        if from.is_terminal() {
            return None;
        }

        let p = &self.policy;
        let emit = |to: LifecycleStage, reason: TransitionReason| {
            debug_assert!(from.can_transition_to(to), "illegal edge {from:?} -> {to:?}");
            Some(StageTransition { from, to, day, sequence: runtime.sequence, reason })
        };

        if self.is_abandonment(runtime, &outcome) {
            return emit(LifecycleStage::Churned, TransitionReason::Abandonment);
        }

        match from {
            LifecycleStage::New if outcome.success => {
                emit(LifecycleStage::Active, TransitionReason::FirstSuccess)
            }
            LifecycleStage::Active
                if runtime.action_count > p.engaged_min_actions
                    && runtime.average_recent_delight() > p.engaged_delight_floor =>
            {
                emit(LifecycleStage::Engaged, TransitionReason::EngagementThreshold)
            }
            LifecycleStage::Engaged
                if runtime.consecutive_high_frustration >= p.at_risk_consecutive =>
            {
                emit(LifecycleStage::AtRisk, TransitionReason::SustainedFrustration)
            }
            LifecycleStage::AtRisk => {
                let since = runtime.at_risk_since.unwrap_or(day);
                let elapsed = day.saturating_sub(since);
                let delight_action = outcome.delight_trigger
                    || outcome.action.has_tag(ActionTag::Delight)
                    || persona.delight_trigger_in(&outcome.action.name).is_some();

                if outcome.success && delight_action && elapsed < p.retention_deadline_days {
                    emit(LifecycleStage::Retained, TransitionReason::DelightRecovery)
                } else if elapsed >= p.retention_deadline_days {
                    emit(LifecycleStage::Churned, TransitionReason::DeadlineElapsed)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Commit a transition produced by `evaluate`.
    pub fn apply(&self, runtime: &mut PersonaRuntimeState, transition: &StageTransition) {
        if runtime.stage != transition.from || !transition.from.can_transition_to(transition.to) {
            log::warn!(
                "persona={} ignoring stale transition {:?} -> {:?}",
                runtime.persona_id, transition.from, transition.to
            );
            return;
        }
        runtime.stage = transition.to;
        runtime.at_risk_since = match transition.to {
            LifecycleStage::AtRisk => Some(transition.day),
            _ => None,
        };
        runtime.stage_history.push(transition.clone());
    }

    fn is_abandonment(&self, runtime: &PersonaRuntimeState, outcome: &ActionOutcome<'_>) -> bool {
        let p = &self.policy;
        if outcome.action.has_tag(ActionTag::Abandon) {
            return true;
        }
        if p.abandonment_consecutive > 0
            && runtime.consecutive_severe_frustration >= p.abandonment_consecutive
        {
            return true;
        }
        !outcome.success
            && outcome.action.has_tag(ActionTag::Critical)
            && runtime.emotions.frustration > p.abandonment_frustration
    }
}
