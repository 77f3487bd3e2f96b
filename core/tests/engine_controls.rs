//! Validation, cancellation and sinks.

mod common;

use common::{basic_actions, persona, population, MixedAdapter, ScriptedAdapter};
use personasim_core::{
    config::SimConfig,
    engine::{CancelToken, SimEngine, TelemetrySink},
    error::{SimError, SimResult},
    event::TelemetryEvent,
    persona::{Archetype, PersonaProfile},
    types::Day,
};

/// Records day boundaries and cancels after a chosen day.
struct CancellingSink {
    token:     CancelToken,
    cancel_on: Day,
    days:      Vec<(Day, usize)>,
}

impl TelemetrySink for CancellingSink {
    fn on_day_complete(&mut self, day: Day, events: &[TelemetryEvent]) -> SimResult<()> {
        self.days.push((day, events.len()));
        if day == self.cancel_on {
            self.token.cancel();
        }
        Ok(())
    }
}

struct FailingSink;

impl TelemetrySink for FailingSink {
    fn on_day_complete(&mut self, day: Day, _events: &[TelemetryEvent]) -> SimResult<()> {
        Err(SimError::Sink(format!("disk full on day {day}")))
    }
}

#[test]
fn sink_sees_every_day_in_order() {
    let config = SimConfig::default_test().with_days(6).with_max_actions_per_day(2);
    let engine = SimEngine::new(config, MixedAdapter).unwrap();
    let mut sink: Vec<TelemetryEvent> = Vec::new();

    let state = engine.run_with_sink(&population(4), Vec::new(), &mut sink).unwrap();

    assert_eq!(sink, state.events);
}

#[test]
fn cancelled_before_start_returns_cancelled() {
    let token = CancelToken::new();
    token.cancel();
    let engine = SimEngine::new(SimConfig::default_test(), MixedAdapter)
        .unwrap()
        .with_cancel_token(token);

    let err = engine.run_default(&population(3)).unwrap_err();
    assert!(matches!(err, SimError::Cancelled { day: 0 }), "got {err}");
}

#[test]
fn cancellation_mid_run_stops_at_next_day() {
    let token = CancelToken::new();
    let config = SimConfig::default_test().with_days(10);
    let engine = SimEngine::new(config, MixedAdapter)
        .unwrap()
        .with_cancel_token(token.clone());
    let mut sink = CancellingSink { token, cancel_on: 2, days: Vec::new() };

    let err = engine.run_with_sink(&population(3), Vec::new(), &mut sink).unwrap_err();

    assert!(matches!(err, SimError::Cancelled { day: 3 }), "got {err}");
    let days: Vec<Day> = sink.days.iter().map(|(d, _)| *d).collect();
    assert_eq!(days, vec![0, 1, 2]);
}

#[test]
fn sink_failure_aborts_the_run() {
    let engine = SimEngine::new(SimConfig::default_test(), MixedAdapter).unwrap();
    let err = engine.run_with_sink(&population(2), Vec::new(), &mut FailingSink).unwrap_err();
    assert!(matches!(err, SimError::Sink(ref msg) if msg.contains("day 0")));
}

#[test]
fn persona_without_id_is_rejected_before_any_event() {
    let engine = SimEngine::new(SimConfig::default_test(), ScriptedAdapter::always_succeeds(basic_actions())).unwrap();
    let personas = vec![persona("ok"), PersonaProfile::new("  ", Archetype::Casual, 0.5, 0.5)];
    let mut sink: Vec<TelemetryEvent> = Vec::new();

    let err = engine.run_with_sink(&personas, 0, &mut sink).unwrap_err();

    assert!(matches!(err, SimError::InvalidPersona { .. }), "got {err}");
    assert!(sink.is_empty());
}

#[test]
fn duplicate_and_non_finite_personas_are_rejected() {
    let engine = SimEngine::new(SimConfig::default_test(), ScriptedAdapter::always_succeeds(basic_actions())).unwrap();

    let dupes = vec![persona("same"), persona("same")];
    assert!(matches!(
        engine.run(&dupes, 0),
        Err(SimError::InvalidPersona { persona_id, .. }) if persona_id == "same"
    ));

    let nan = vec![PersonaProfile::new("nan", Archetype::Casual, f64::NAN, 0.5)];
    assert!(matches!(engine.run(&nan, 0), Err(SimError::InvalidPersona { .. })));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let bad = SimConfig::default_test().with_max_actions_per_day(0);
    let err = SimEngine::new(bad, MixedAdapter).err().unwrap();
    assert!(matches!(err, SimError::InvalidConfig { .. }));

    let mut bad_alpha = SimConfig::default_test();
    bad_alpha.emotion.delight.alpha = 0.0;
    assert!(SimEngine::new(bad_alpha, MixedAdapter).is_err());
}

#[test]
fn unrepresentable_calendar_is_rejected_before_running() {
    let mut huge_day = SimConfig::default_test().with_max_actions_per_day(1);
    huge_day.day_duration_ms = u64::MAX;
    let err = SimEngine::new(huge_day, MixedAdapter).err().unwrap();
    assert!(matches!(err, SimError::InvalidConfig { .. }));

    let many_days = SimConfig::default_test().with_days(150_000_000);
    assert!(matches!(
        SimEngine::new(many_days, MixedAdapter).err(),
        Some(SimError::InvalidConfig { .. })
    ));

    let mut huge_window = SimConfig::default_test();
    huge_window.history_window = usize::MAX;
    assert!(SimEngine::new(huge_window, MixedAdapter).is_err());
}

#[test]
fn empty_population_completes_with_no_events() {
    let engine = SimEngine::new(SimConfig::default_test(), MixedAdapter).unwrap();
    let state = engine.run_default(&[]).unwrap();
    assert!(state.events.is_empty());
    assert!(state.personas.is_empty());
    assert_eq!(state.days_completed, 3);
}
