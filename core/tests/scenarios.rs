//! End-to-end scenarios with scripted products.

mod common;

use common::{basic_actions, persona, BrokenAdapter, EmptyAdapter, ScriptedAdapter};
use personasim_core::{
    adapter::Action,
    config::SimConfig,
    engine::SimEngine,
    error::SimError,
    event::{EventType, TelemetryEvent},
    lifecycle::{LifecycleStage, StageTransition, TransitionReason},
};

#[test]
fn basic_run_emits_one_event_per_day() {
    let config = SimConfig::default_test().with_seed(42).with_days(3).with_max_actions_per_day(1);
    let engine = SimEngine::new(config, ScriptedAdapter::always_succeeds(basic_actions())).unwrap();
    let personas = vec![persona("p-1")];

    let state = engine.run(&personas, 0).unwrap();

    assert_eq!(state.events.len(), 3, "expected exactly 3 events");
    assert_eq!(state.days_completed, 3);
    for (day, event) in state.events.iter().enumerate() {
        assert_eq!(event.day, day as u64);
        assert_eq!(event.sequence, day as u64 + 1);
        assert_eq!(event.session_number, day as u64 + 1);
        assert_eq!(event.event_type, EventType::ActionCompleted);
        assert!(event.action == "use_feature" || event.action == "configure");
    }

    let summary = state.persona("p-1").unwrap();
    let first = &summary.stage_history[0];
    assert_eq!((first.from, first.to), (LifecycleStage::New, LifecycleStage::Active));
    assert_eq!(first.sequence, 1, "activation must follow the first event");
    assert_eq!(state.events[0].metadata["stage"], "new");
    assert_eq!(state.events[1].metadata["stage"], "active");
    assert_eq!(summary.total_actions, 3);
    assert_eq!(summary.product_state, 3);

    let rerun = engine.run(&personas, 0).unwrap();
    let names = |events: &[TelemetryEvent]| events.iter().map(|e| e.action.clone()).collect::<Vec<_>>();
    assert_eq!(names(&state.events), names(&rerun.events));
}

#[test]
fn empty_action_list_fails_without_events() {
    let engine = SimEngine::new(SimConfig::default_test(), EmptyAdapter).unwrap();
    let mut sink: Vec<TelemetryEvent> = Vec::new();

    let err = engine
        .run_with_sink(&[persona("p-1")], (), &mut sink)
        .unwrap_err();

    assert!(
        matches!(&err, SimError::NoActionsAvailable { persona_id, day: 0 } if persona_id == "p-1"),
        "unexpected error: {err}"
    );
    assert!(sink.is_empty(), "no event may be emitted for a failed turn");
}

#[test]
fn adapter_failure_aborts_the_run() {
    let engine = SimEngine::new(SimConfig::default_test(), BrokenAdapter).unwrap();

    let err = engine.run_default(&[persona("p-1")]).unwrap_err();

    match err {
        SimError::Adapter(inner) => assert!(inner.to_string().contains("backend unavailable")),
        other => panic!("expected adapter error, got {other}"),
    }
}

/// Longest run of consecutive events whose frustration exceeds `threshold`.
fn longest_run_above(events: &[TelemetryEvent], threshold: f64) -> usize {
    events
        .iter()
        .fold((0, 0), |(run, best), e| {
            let run = if e.emotional_state.frustration > threshold { run + 1 } else { 0 };
            (run, best.max(run))
        })
        .1
}

fn assert_legal_path(history: &[StageTransition]) {
    let mut stage = LifecycleStage::New;
    for t in history {
        assert_eq!(t.from, stage, "transition out of a stage the persona was not in");
        assert!(t.from.can_transition_to(t.to), "illegal edge {:?} -> {:?}", t.from, t.to);
        stage = t.to;
    }
}

#[test]
fn sustained_frustration_leads_to_churn() {
    // All actions of the run fit in day 0.
    let config = SimConfig::default_test().with_days(2).with_max_actions_per_day(32);
    let policy = config.lifecycle.clone();

    // A dozen wins to get engaged, then nothing but failures.
    let adapter = ScriptedAdapter {
        actions: vec![Action::new("core", "use_feature")],
        succeed_first: 12,
    };
    let engine = SimEngine::new(config, adapter).unwrap();
    let state = engine.run(&[persona("p-1")], 0).unwrap();
    let summary = state.persona("p-1").unwrap();

    let path: Vec<_> = summary.stage_history.iter().map(|t| (t.to, t.reason)).collect();
    assert_eq!(
        path,
        vec![
            (LifecycleStage::Active, TransitionReason::FirstSuccess),
            (LifecycleStage::Engaged, TransitionReason::EngagementThreshold),
            (LifecycleStage::AtRisk, TransitionReason::SustainedFrustration),
            (LifecycleStage::Churned, TransitionReason::Abandonment),
        ]
    );
    assert_legal_path(&summary.stage_history);

    let at_risk = &summary.stage_history[2];
    let failures_before_at_risk = state
        .events
        .iter()
        .filter(|e| e.sequence <= at_risk.sequence && e.event_type == EventType::ActionFailed)
        .count();
    assert!(failures_before_at_risk >= policy.at_risk_consecutive as usize);
    assert!(
        longest_run_above(&state.events, policy.abandonment_frustration)
            >= policy.abandonment_consecutive as usize
    );

    let churned = &summary.stage_history[3];
    let last = state.events.last().unwrap();
    assert_eq!(last.sequence, churned.sequence, "no events after churn");
    assert_eq!(state.totals.count_in(LifecycleStage::Churned), 1);
}

#[test]
fn unrecovered_at_risk_persona_churns_at_the_deadline() {
    let mut config = SimConfig::default_test().with_days(10).with_max_actions_per_day(32);
    config.lifecycle.abandonment_consecutive = 0;
    let deadline = config.lifecycle.retention_deadline_days;

    let adapter = ScriptedAdapter {
        actions: vec![Action::new("core", "use_feature")],
        succeed_first: 12,
    };
    let state = SimEngine::new(config, adapter).unwrap().run(&[persona("p-1")], 0).unwrap();
    let summary = state.persona("p-1").unwrap();

    assert_legal_path(&summary.stage_history);
    assert_eq!(summary.final_stage, LifecycleStage::Churned);
    let at_risk = &summary.stage_history[2];
    let churned = &summary.stage_history[3];
    assert_eq!(at_risk.to, LifecycleStage::AtRisk);
    assert_eq!(churned.reason, TransitionReason::DeadlineElapsed);
    assert_eq!(churned.day - at_risk.day, deadline);
    assert_eq!(state.events.last().unwrap().sequence, churned.sequence);
}

#[test]
fn persistently_failing_new_persona_abandons() {
    let config = SimConfig::default_test().with_days(14).with_max_actions_per_day(4);
    let policy = config.lifecycle.clone();
    let adapter = ScriptedAdapter { actions: vec![Action::new("core", "use_feature")], succeed_first: 0 };

    let state = SimEngine::new(config, adapter).unwrap().run(&[persona("p-1")], 0).unwrap();
    let summary = state.persona("p-1").unwrap();

    assert!(state.events.iter().all(|e| e.event_type == EventType::ActionFailed));
    assert!(
        longest_run_above(&state.events, policy.abandonment_frustration)
            >= policy.abandonment_consecutive as usize
    );
    assert_eq!(summary.final_stage, LifecycleStage::Churned);
    assert_legal_path(&summary.stage_history);
    let churned = summary.stage_history.last().unwrap();
    assert_eq!((churned.from, churned.reason), (LifecycleStage::New, TransitionReason::Abandonment));
    assert_eq!(state.events.last().unwrap().sequence, churned.sequence, "no events after churn");
    assert!(state.events.len() < 56);
}

#[test]
fn explicit_abandon_churns_immediately() {
    use personasim_core::adapter::ActionTag;

    let adapter = ScriptedAdapter::always_succeeds(vec![
        Action::new("account", "uninstall").with_tag(ActionTag::Abandon),
    ]);
    let config = SimConfig::default_test().with_days(5).with_max_actions_per_day(3);
    let state = SimEngine::new(config, adapter).unwrap().run(&[persona("p-1")], 0).unwrap();

    assert_eq!(state.events.len(), 1);
    assert_eq!(state.events[0].event_type, EventType::Abandoned);
    assert_eq!(state.totals.abandoned, 1);
    let summary = state.persona("p-1").unwrap();
    assert_eq!(summary.final_stage, LifecycleStage::Churned);
    assert_eq!(summary.sessions, 1);
}
