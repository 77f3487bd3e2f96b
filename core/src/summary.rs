//! End-of-run results handed back to the caller.

use crate::{
    event::{EventType, TelemetryEvent},
    lifecycle::{LifecycleStage, StageTransition},
    persona::EmotionalState,
    types::{Day, PersonaIndex, SimulationId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaSummary<S> {
    pub persona_id:    String,
    pub index:         PersonaIndex,
    pub final_stage:   LifecycleStage,
    pub total_actions: u64,
    pub sessions:      u64,
    /// Whether the persona ever hit one of its referral triggers.
    pub referral_seen: bool,
    pub emotions:      EmotionalState,
    pub stage_history: Vec<StageTransition>,
    pub product_state: S,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    pub events:    usize,
    pub successes: usize,
    pub failures:  usize,
    pub abandoned: usize,
    /// Personas per final stage.
    pub by_stage:  BTreeMap<LifecycleStage, usize>,
}

impl RunTotals {
    pub fn tally<S>(events: &[TelemetryEvent], personas: &[PersonaSummary<S>]) -> Self {
        let mut totals = RunTotals { events: events.len(), ..Default::default() };
        for event in events {
            match event.event_type {
                EventType::ActionCompleted => totals.successes += 1,
                EventType::ActionFailed    => totals.failures += 1,
                EventType::Abandoned       => totals.abandoned += 1,
            }
        }
        for stage in LifecycleStage::ALL {
            totals.by_stage.insert(stage, 0);
        }
        for p in personas {
            *totals.by_stage.entry(p.final_stage).or_default() += 1;
        }
        totals
    }

    pub fn count_in(&self, stage: LifecycleStage) -> usize {
        self.by_stage.get(&stage).copied().unwrap_or_default()
    }
}

/// Everything a run produced, in canonical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState<S> {
    pub simulation_id:  SimulationId,
    pub seed:           u64,
    pub days_completed: Day,
    /// Ordered by (day, persona iteration order, intra-day slot).
    pub events:         Vec<TelemetryEvent>,
    /// In the caller's persona order.
    pub personas:       Vec<PersonaSummary<S>>,
    pub totals:         RunTotals,
}

impl<S> SimulationState<S> {
    pub fn persona(&self, persona_id: &str) -> Option<&PersonaSummary<S>> {
        self.personas.iter().find(|p| p.persona_id == persona_id)
    }

    pub fn events_for<'a>(&'a self, persona_id: &'a str) -> impl Iterator<Item = &'a TelemetryEvent> + 'a {
        self.events.iter().filter(move |e| e.persona_id == persona_id)
    }
}
