//! Telemetry events, the engine's only output.
//!
//! RULE: Events are created once and never mutated.
//! Timestamps come from the simulated clock, never the wall clock.
//!
//! Every persona owns a millisecond lane: its timestamps are congruent
//! to its index modulo the population size. Two personas therefore
//! never share a millisecond as long as a slot is at least as wide as
//! the population.

use crate::{
    adapter::ActionTag,
    config::SimConfig,
    decision::Decision,
    error::{SimError, SimResult},
    persona::{EmotionalState, PersonaProfile, PersonaRuntimeState},
    processor::ActionResult,
    rng::RandomSource,
    types::{Day, PersonaIndex},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ActionCompleted,
    ActionFailed,
    Abandoned,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActionCompleted => "action_completed",
            Self::ActionFailed    => "action_failed",
            Self::Abandoned       => "abandoned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub id:              Uuid,
    pub persona_id:      String,
    pub simulation_id:   String,
    pub session_number:  u64,
    /// Per-persona action counter, starting at 1.
    pub sequence:        u64,
    pub day:             Day,
    pub timestamp:       DateTime<Utc>,
    pub event_type:      EventType,
    pub action:          String,
    pub emotional_state: EmotionalState,
    pub metadata:        BTreeMap<String, Value>,
}

/// Builds events and their simulated timestamps for one run.
pub struct EventGenerator {
    simulation_id:   String,
    namespace:       Uuid,
    run_start:       DateTime<Utc>,
    day_duration_ms: u64,
    slot_ms:         u64,
    lanes:           u64,
}

impl EventGenerator {
    pub fn new(config: &SimConfig, population: usize) -> Self {
        let (simulation_id, namespace) = simulation_identity(config);
        let lanes = u64::try_from(population.max(1)).unwrap_or(u64::MAX);
        if lanes > config.slot_ms() {
            log::warn!(
                "{population} personas share {} ms slots; timestamps may collide",
                config.slot_ms()
            );
        }
        Self {
            simulation_id,
            namespace,
            run_start: config.run_start,
            day_duration_ms: config.day_duration_ms,
            slot_ms: config.slot_ms(),
            lanes,
        }
    }

    pub fn simulation_id(&self) -> &str {
        &self.simulation_id
    }

    /// `run_start + day * day_duration + slot * slot_width + offset`.
    ///
    /// Each of a persona's daily actions gets its own disjoint slot, so
    /// a persona's timestamps can never go backwards. The offset inside
    /// the slot is drawn from the persona's lane.
    pub fn timestamp_for(
        &self,
        day: Day,
        slot: u32,
        lane: PersonaIndex,
        rng: &mut RandomSource,
    ) -> SimResult<DateTime<Utc>> {
        let overflow = || SimError::InvalidConfig {
            reason: format!("timestamp for day {day} slot {slot} overflows the calendar"),
        };
        let slot_start = day
            .checked_mul(self.day_duration_ms)
            .and_then(|ms| ms.checked_add(u64::from(slot).checked_mul(self.slot_ms)?))
            .ok_or_else(overflow)?;
        let ms = slot_start
            .checked_add(self.offset_in_slot(slot_start, lane, rng))
            .ok_or_else(overflow)?;
        let span = i64::try_from(ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .ok_or_else(overflow)?;
        self.run_start.checked_add_signed(span).ok_or_else(overflow)
    }

    /// One draw, always below `slot_ms`. When the slot is wide enough,
    /// `slot_start + offset` lands on the persona's lane.
    fn offset_in_slot(&self, slot_start: u64, lane: PersonaIndex, rng: &mut RandomSource) -> u64 {
        let slot_ms = self.slot_ms.max(1);
        let lanes = self.lanes;
        if lanes <= 1 || lanes > slot_ms {
            return rng.next_u64_below(slot_ms);
        }
        let lane = u64::try_from(lane).unwrap_or(0) % lanes;
        let first = (lane + lanes - slot_start % lanes) % lanes;
        let spans = (slot_ms - first - 1) / lanes + 1;
        first + rng.next_u64_below(spans) * lanes
    }

    pub fn generate<S>(
        &self,
        persona: &PersonaProfile,
        runtime: &PersonaRuntimeState,
        decision: &Decision,
        result: &ActionResult<S>,
        timestamp: DateTime<Utc>,
    ) -> TelemetryEvent {
        let action = &decision.action;
        let event_type = if action.has_tag(ActionTag::Abandon) {
            EventType::Abandoned
        } else if result.success {
            EventType::ActionCompleted
        } else {
            EventType::ActionFailed
        };

        let mut metadata = result.context.clone();
        metadata.insert("stage".into(), json!(runtime.stage.as_str()));
        metadata.insert("action_kind".into(), json!(action.kind));
        metadata.insert("success".into(), json!(result.success));
        metadata.insert("selection_weight".into(), json!(decision.weight));
        metadata.insert("selection_probability".into(), json!(decision.probability));
        if !action.tags.is_empty() {
            metadata.insert("tags".into(), json!(action.tags));
        }

        let id_name = format!("{}:{}", persona.id, runtime.sequence);
        TelemetryEvent {
            id: Uuid::new_v5(&self.namespace, id_name.as_bytes()),
            persona_id: persona.id.clone(),
            simulation_id: self.simulation_id.clone(),
            session_number: result.turn.session,
            sequence: runtime.sequence,
            day: result.turn.day,
            timestamp,
            event_type,
            action: action.name.clone(),
            emotional_state: runtime.emotions,
            metadata,
        }
    }
}

/// Simulation id label plus the UUID namespace event ids hang off.
fn simulation_identity(config: &SimConfig) -> (String, Uuid) {
    match &config.simulation_id {
        Some(label) => {
            let ns = Uuid::parse_str(label)
                .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, label.as_bytes()));
            (label.clone(), ns)
        }
        None => {
            let ns = Uuid::new_v5(
                &Uuid::NAMESPACE_OID,
                format!("personasim:seed:{}", config.seed).as_bytes(),
            );
            (ns.to_string(), ns)
        }
    }
}
