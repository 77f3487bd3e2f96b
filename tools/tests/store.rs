//! SimStore and SqliteSink against an in-memory database.

use personasim_core::{
    adapter::ActionTag,
    config::SimConfig,
    engine::SimEngine,
    event::TelemetryEvent,
    persona::{Archetype, PersonaProfile},
};
use serde_json::json;
use sim_runner::{
    catalog::{CatalogAdapter, ProductCatalog},
    store::{SimStore, SqliteSink},
};

fn store() -> SimStore {
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

fn adapter() -> CatalogAdapter {
    let catalog: ProductCatalog = serde_json::from_value(json!({
        "actions": [
            { "kind": "onboarding", "name": "connect_repo", "weight": 0.3, "enables": ["repo_connected"] },
            { "kind": "core", "name": "run_report", "weight": 0.5, "requires": ["repo_connected"], "fail_every": 4 },
            { "kind": "content", "name": "share_dashboard", "weight": 0.2, "tags": ["delight", "social"] }
        ]
    }))
    .expect("catalog json");
    CatalogAdapter::new(catalog).expect("valid catalog")
}

fn personas() -> Vec<PersonaProfile> {
    vec![
        PersonaProfile::new("ana", Archetype::Explorer, 0.8, 0.4),
        PersonaProfile::new("ben", Archetype::Skeptic, 0.2, 0.7),
        PersonaProfile::new("cy", Archetype::PowerUser, 0.6, 0.5).with_delight_triggers(["share"]),
    ]
}

#[test]
fn sink_persists_every_event_in_order() {
    let store = store();
    let config = SimConfig::default_test().with_days(5).with_max_actions_per_day(3);
    store.insert_run("store-test", config.seed, "0.1.0-test", "{}").unwrap();

    let engine = SimEngine::new(config, adapter()).unwrap();
    let mut sink = SqliteSink::new(&store, "store-test");
    let state = engine.run_with_sink(&personas(), Default::default(), &mut sink).unwrap();

    assert_eq!(store.event_count("store-test").unwrap(), state.events.len() as u64);

    let mut reloaded = Vec::new();
    for day in 0..state.days_completed {
        reloaded.extend(store.events_for_day("store-test", day).unwrap());
    }
    let key = |e: &TelemetryEvent| (e.id, e.persona_id.clone(), e.sequence, e.action.clone(), e.event_type);
    let stored: Vec<_> = reloaded.iter().map(key).collect();
    let emitted: Vec<_> = state.events.iter().map(key).collect();
    assert_eq!(stored, emitted, "round trip through SQLite changed the events");
}

#[test]
fn event_type_counts_match_totals() {
    let store = store();
    let config = SimConfig::default_test().with_days(8).with_max_actions_per_day(2);
    store.insert_run("counts", config.seed, "0.1.0-test", "{}").unwrap();

    let engine = SimEngine::new(config, adapter()).unwrap();
    let state = engine
        .run_with_sink(&personas(), Default::default(), &mut SqliteSink::new(&store, "counts"))
        .unwrap();

    let counts = store.event_type_counts("counts").unwrap();
    let total: u64 = counts.iter().map(|(_, n)| n).sum();
    assert_eq!(total, state.totals.events as u64);
    let completed = counts
        .iter()
        .find(|(t, _)| t == "action_completed")
        .map(|(_, n)| *n)
        .unwrap_or(0);
    assert_eq!(completed, state.totals.successes as u64);
}

#[test]
fn persona_summaries_are_upserted() {
    let store = store();
    let config = SimConfig::default_test();
    store.insert_run("summaries", config.seed, "0.1.0-test", "{}").unwrap();

    let state = SimEngine::new(config, adapter())
        .unwrap()
        .run_default(&personas())
        .unwrap();
    for summary in &state.personas {
        store.save_persona_summary("summaries", summary).unwrap();
        store.save_persona_summary("summaries", summary).unwrap();
    }

    let stored: u64 = store.stage_counts("summaries").unwrap().iter().map(|(_, n)| n).sum();
    assert_eq!(stored, 3);
}

#[test]
fn events_require_a_known_run() {
    let store = store();
    let event_source = SimEngine::new(SimConfig::default_test(), adapter())
        .unwrap()
        .run_default(&personas())
        .unwrap();

    let err = store.append_event("no-such-run", &event_source.events[0]);
    assert!(err.is_err(), "foreign key on run_id must be enforced");
}

#[test]
fn catalog_tags_reach_the_engine() {
    let a = adapter();
    let share = &a.catalog().actions[2];
    assert!(share.tags.contains(&ActionTag::Delight));
    assert!(share.tags.contains(&ActionTag::Social));
}

#[test]
fn file_database_opens_in_wal_mode() {
    let path = std::env::temp_dir().join(format!("personasim-wal-{}.db", std::process::id()));
    let path_str = path.to_str().expect("utf-8 temp path").to_string();

    let store = SimStore::open(&path_str).expect("file store");
    store.migrate().expect("migration");
    assert_eq!(store.journal_mode().unwrap(), "wal");
    drop(store);

    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path_str}{suffix}"));
    }
}

#[test]
fn memory_databases_skip_wal() {
    for path in [":memory:", "file:personasim-shared?mode=memory&cache=shared"] {
        let store = SimStore::open(path).expect("memory store");
        store.migrate().expect("migration");
        assert_eq!(store.journal_mode().unwrap(), "memory", "{path}");
    }
}

#[test]
fn unopenable_database_is_an_error() {
    let dir = std::env::temp_dir().join(format!("personasim-missing-{}", std::process::id()));
    let path = dir.join("nested").join("run.db");
    assert!(SimStore::open(path.to_str().unwrap()).is_err());
}
