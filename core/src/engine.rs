//! The simulation engine: validates inputs, owns the adapter, and drives
//! a `SimulationLoop` day by day.
//!
//! RULES:
//!   - Config and personas are validated before any event is generated.
//!   - Any error aborts the whole run. No partial state is returned.
//!   - Runs share nothing; one engine can run many times.

use crate::{
    adapter::ProductAdapter,
    config::SimConfig,
    error::{SimError, SimResult},
    event::TelemetryEvent,
    persona::{validate_personas, PersonaProfile},
    sim_loop::SimulationLoop,
    summary::SimulationState,
    types::Day,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative cancellation flag, checked once per persona-day.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives each day's events as soon as the day completes.
pub trait TelemetrySink {
    fn on_day_complete(&mut self, day: Day, events: &[TelemetryEvent]) -> SimResult<()>;
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn on_day_complete(&mut self, _day: Day, _events: &[TelemetryEvent]) -> SimResult<()> {
        Ok(())
    }
}

impl TelemetrySink for Vec<TelemetryEvent> {
    fn on_day_complete(&mut self, _day: Day, events: &[TelemetryEvent]) -> SimResult<()> {
        self.extend_from_slice(events);
        Ok(())
    }
}

pub struct SimEngine<A: ProductAdapter> {
    config:  SimConfig,
    adapter: A,
    cancel:  Option<CancelToken>,
}

impl<A: ProductAdapter> SimEngine<A> {
    pub fn new(config: SimConfig, adapter: A) -> SimResult<Self> {
        config.validate()?;
        Ok(Self { config, adapter, cancel: None })
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Run for `config.days` days starting from `initial_state`.
    pub fn run(
        &self,
        personas: &[PersonaProfile],
        initial_state: A::State,
    ) -> SimResult<SimulationState<A::State>> {
        self.run_with_sink(personas, initial_state, &mut NullSink)
    }

    /// Like `run`, with the adapter supplying the initial product state.
    pub fn run_default(&self, personas: &[PersonaProfile]) -> SimResult<SimulationState<A::State>> {
        let initial_state = self.adapter.get_initial_state().map_err(SimError::Adapter)?;
        self.run(personas, initial_state)
    }

    pub fn run_with_sink(
        &self,
        personas: &[PersonaProfile],
        initial_state: A::State,
        sink: &mut dyn TelemetrySink,
    ) -> SimResult<SimulationState<A::State>> {
        self.config.validate()?;
        validate_personas(personas)?;

        let mut sim = SimulationLoop::new(&self.config, &self.adapter, personas, &initial_state)
            .with_cancel_token(self.cancel.as_ref());
        log::info!(
            "run={} seed={} personas={} days={}",
            sim.simulation_id(), self.config.seed, personas.len(), self.config.days
        );

        let mut events = Vec::new();
        for day in 0..self.config.days {
            let day_events = sim.run_day(day)?;
            sink.on_day_complete(day, &day_events)?;
            events.extend(day_events);
        }

        let state = sim.finish(self.config.days, events);
        log::info!(
            "run={} complete events={} successes={} failures={}",
            state.simulation_id, state.totals.events, state.totals.successes, state.totals.failures
        );
        Ok(state)
    }
}
