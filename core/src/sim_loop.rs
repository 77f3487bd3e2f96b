//! The day loop that drives every persona through the product.
//!
//! EXECUTION ORDER (per day, fixed):
//!   1. Decay emotions of non-terminal personas (days >= 1 only).
//!   2. Reset per-day counters.
//!   3. Visit personas in the run's shuffled order, in batches.
//!      For each persona, until terminal or the daily cap is hit:
//!        a. get available actions   (adapter)
//!        b. choose one              (DecisionMaker)
//!        c. apply it                (ActionProcessor)
//!        d. update emotions and history
//!        e. emit the telemetry event (EventGenerator)
//!        f. evaluate the lifecycle  (StateMachine)
//!        g. commit product and runtime state
//!
//! RULES:
//!   - All randomness flows through per-persona streams from the SeedBank.
//!   - Each persona owns its own product state thread.
//!   - Batch size only chunks iteration; it never changes results.

use crate::{
    adapter::ProductAdapter,
    config::SimConfig,
    decision::DecisionMaker,
    emotion::{EmotionModel, TrackerContext},
    engine::CancelToken,
    error::{SimError, SimResult},
    event::{EventGenerator, TelemetryEvent},
    lifecycle::{ActionOutcome, StateMachine},
    persona::{HistoryEntry, PersonaProfile, PersonaRuntimeState},
    processor::{ActionProcessor, TurnContext},
    rng::{RandomSource, SeedBank},
    summary::{PersonaSummary, RunTotals, SimulationState},
    types::{Day, PersonaIndex},
};

pub struct SimulationLoop<'a, A: ProductAdapter> {
    config:         &'a SimConfig,
    adapter:        &'a A,
    personas:       &'a [PersonaProfile],
    cancel:         Option<&'a CancelToken>,
    decisions:      DecisionMaker,
    processor:      ActionProcessor<'a, A>,
    events:         EventGenerator,
    lifecycle:      StateMachine,
    emotions:       EmotionModel,
    runtime:        Vec<PersonaRuntimeState>,
    product_states: Vec<A::State>,
    streams:        Vec<RandomSource>,
    order:          Vec<PersonaIndex>,
}

impl<'a, A: ProductAdapter> SimulationLoop<'a, A> {
    pub fn new(
        config: &'a SimConfig,
        adapter: &'a A,
        personas: &'a [PersonaProfile],
        initial_state: &A::State,
    ) -> Self {
        let bank = SeedBank::new(config.seed);

        let mut order: Vec<PersonaIndex> = (0..personas.len()).collect();
        bank.for_scheduler().shuffle(&mut order);

        Self {
            config,
            adapter,
            personas,
            cancel: None,
            decisions: DecisionMaker::new(config.decision.clone()),
            processor: ActionProcessor::new(adapter),
            events: EventGenerator::new(config, personas.len()),
            lifecycle: StateMachine::new(config.lifecycle.clone()),
            emotions: EmotionModel::new(&config.emotion),
            runtime: personas
                .iter()
                .enumerate()
                .map(|(i, p)| PersonaRuntimeState::new(i, p, config))
                .collect(),
            product_states: vec![initial_state.clone(); personas.len()],
            streams: (0..personas.len()).map(|i| bank.for_persona(i)).collect(),
            order,
        }
    }

    pub fn with_cancel_token(mut self, token: Option<&'a CancelToken>) -> Self {
        self.cancel = token;
        self
    }

    pub fn simulation_id(&self) -> &str {
        self.events.simulation_id()
    }

    /// Simulate one day and return its events in canonical order.
    pub fn run_day(&mut self, day: Day) -> SimResult<Vec<TelemetryEvent>> {
        if day > 0 {
            for rt in self.runtime.iter_mut().filter(|rt| !rt.is_terminal()) {
                self.emotions.decay(&mut rt.emotions, 1);
            }
        }
        for rt in &mut self.runtime {
            rt.begin_day();
        }

        let mut out = Vec::new();
        let batch_size = self.config.batch_size.max(1);
        let total = self.order.len();
        let mut start = 0;
        while start < total {
            let end = (start + batch_size).min(total);
            for pos in start..end {
                let index = self.order[pos];
                self.step_persona(index, day, &mut out)?;
            }
            log::debug!("day={day} batch={start}..{end} events_so_far={}", out.len());
            start = end;
        }

        log::debug!("day={day} complete events={}", out.len());
        Ok(out)
    }

    fn step_persona(
        &mut self,
        index: PersonaIndex,
        day: Day,
        out: &mut Vec<TelemetryEvent>,
    ) -> SimResult<()> {
        if self.cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(SimError::Cancelled { day });
        }
        if self.runtime[index].is_terminal() {
            return Ok(());
        }

        self.runtime[index].sessions += 1;
        let cap = self.config.max_actions_per_day;
        while !self.runtime[index].is_terminal() && self.runtime[index].actions_today < cap {
            let event = self.take_turn(index, day)?;
            out.push(event);
        }
        Ok(())
    }

    fn take_turn(&mut self, index: PersonaIndex, day: Day) -> SimResult<TelemetryEvent> {
        let personas = self.personas;
        let persona = &personas[index];

        let available = self
            .adapter
            .get_available_actions(&self.product_states[index], persona)
            .map_err(SimError::Adapter)?;

        let decision = self.decisions.choose_action(
            persona,
            &self.runtime[index],
            &available,
            day,
            &mut self.streams[index],
        )?;

        let turn = TurnContext { day, session: self.runtime[index].sessions };
        let result = self.processor.process(
            persona,
            &self.runtime[index],
            &self.product_states[index],
            &decision.action,
            turn,
        )?;

        let slot = self.runtime[index].actions_today;
        let timestamp = self.events.timestamp_for(day, slot, index, &mut self.streams[index])?;

        {
            let rt = &mut self.runtime[index];
            rt.sequence += 1;
            rt.action_count += 1;

            let ctx = TrackerContext {
                success: result.success,
                patience: persona.patience(),
                delight_trigger: result.delight_trigger,
            };
            self.emotions.update(&mut rt.emotions, &result.delta, &ctx);
            rt.note_frustration(self.lifecycle.policy());

            rt.remember(HistoryEntry {
                day,
                sequence: rt.sequence,
                action_name: decision.action.name.clone(),
                action_kind: decision.action.kind.clone(),
                success: result.success,
                frustration: rt.emotions.frustration,
                delight: rt.emotions.delight,
                delight_trigger: result.delight_trigger,
                referral_trigger: result.referral_trigger,
            });
            rt.last_action = Some(decision.action.name.clone());
            rt.last_action_at = Some(timestamp);
        }

        let event = self
            .events
            .generate(persona, &self.runtime[index], &decision, &result, timestamp);

        let outcome = ActionOutcome {
            action: &decision.action,
            success: result.success,
            delight_trigger: result.delight_trigger,
        };
        if let Some(t) = self.lifecycle.evaluate(persona, &self.runtime[index], outcome, day) {
            log::info!(
                "day={day} persona={} {} -> {} ({})",
                persona.id, t.from.as_str(), t.to.as_str(), t.reason.as_str()
            );
            self.lifecycle.apply(&mut self.runtime[index], &t);
        }

        self.runtime[index].actions_today += 1;
        self.product_states[index] = result.state;
        Ok(event)
    }

    /// Consume the loop and assemble the run's results.
    pub fn finish(self, days_completed: Day, events: Vec<TelemetryEvent>) -> SimulationState<A::State> {
        let simulation_id = self.events.simulation_id().to_string();
        let personas: Vec<PersonaSummary<A::State>> = self
            .runtime
            .into_iter()
            .zip(self.product_states)
            .map(|(rt, product_state)| PersonaSummary {
                persona_id: rt.persona_id,
                index: rt.index,
                final_stage: rt.stage,
                total_actions: rt.action_count,
                sessions: rt.sessions,
                referral_seen: rt.referral_seen,
                emotions: rt.emotions,
                stage_history: rt.stage_history,
                product_state,
            })
            .collect();
        let totals = RunTotals::tally(&events, &personas);

        SimulationState {
            simulation_id,
            seed: self.config.seed,
            days_completed,
            events,
            personas,
            totals,
        }
    }
}
