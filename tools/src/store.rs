//! SQLite persistence for run telemetry.
//!
//! RULE: Only store.rs talks to the database.
//! The engine never sees SQL; it hands events to a `SqliteSink`.

use anyhow::{Context, Result};
use personasim_core::{
    engine::TelemetrySink,
    error::{SimError, SimResult},
    event::TelemetryEvent,
    summary::PersonaSummary,
    types::Day,
};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;

pub struct SimStore {
    conn: Connection,
}

/// In-memory databases have no WAL to switch to.
fn is_memory_path(path: &str) -> bool {
    path == ":memory:" || path.contains("mode=memory")
}

impl SimStore {
    /// Open (or create) the telemetry database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .with_context(|| format!("Cannot open database {path}"))?;
        if !is_memory_path(path) {
            let mode: String = conn
                .query_row("PRAGMA journal_mode=WAL;", [], |r| r.get(0))
                .with_context(|| format!("Cannot enable WAL on {path}"))?;
            log::debug!("db={path} journal_mode={mode}");
        }
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Current journal mode, lower-cased (`wal`, `memory`, ...).
    pub fn journal_mode(&self) -> Result<String> {
        let mode: String = self.conn.query_row("PRAGMA journal_mode;", [], |r| r.get(0))?;
        Ok(mode.to_lowercase())
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(include_str!("../migrations/001_telemetry.sql"))
            .context("migration 001_telemetry failed")?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, seed: u64, version: &str, config_json: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, version, config_json, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, seed as i64, version, config_json, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ── Telemetry ──────────────────────────────────────────────

    pub fn append_event(&self, run_id: &str, event: &TelemetryEvent) -> Result<()> {
        self.conn.execute(
            "INSERT INTO telemetry_event
                (run_id, event_id, persona_id, day, sequence, session_number,
                 timestamp, event_type, action, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run_id,
                event.id.to_string(),
                event.persona_id,
                event.day as i64,
                event.sequence as i64,
                event.session_number as i64,
                event.timestamp.to_rfc3339(),
                event.event_type.as_str(),
                event.action,
                serde_json::to_string(event)?,
            ],
        )?;
        Ok(())
    }

    /// Append a whole day in one transaction.
    pub fn append_events(&self, run_id: &str, events: &[TelemetryEvent]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for event in events {
            self.append_event(run_id, event)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn events_for_day(&self, run_id: &str, day: Day) -> Result<Vec<TelemetryEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM telemetry_event
             WHERE run_id = ?1 AND day = ?2
             ORDER BY id ASC",
        )?;
        let payloads = stmt
            .query_map(params![run_id, day as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        payloads
            .iter()
            .map(|p| serde_json::from_str(p).context("corrupt telemetry payload"))
            .collect()
    }

    pub fn event_count(&self, run_id: &str) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM telemetry_event WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    pub fn event_type_counts(&self, run_id: &str) -> Result<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_type, COUNT(*) FROM telemetry_event
             WHERE run_id = ?1 GROUP BY event_type ORDER BY event_type",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Persona summaries ──────────────────────────────────────

    pub fn save_persona_summary<S: Serialize>(&self, run_id: &str, summary: &PersonaSummary<S>) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO persona_summary
                (run_id, persona_id, final_stage, total_actions, sessions, summary_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                summary.persona_id,
                summary.final_stage.as_str(),
                summary.total_actions as i64,
                summary.sessions as i64,
                serde_json::to_string(summary)?,
            ],
        )?;
        Ok(())
    }

    pub fn stage_counts(&self, run_id: &str) -> Result<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT final_stage, COUNT(*) FROM persona_summary
             WHERE run_id = ?1 GROUP BY final_stage ORDER BY final_stage",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Streams each completed day into a `SimStore`.
pub struct SqliteSink<'a> {
    store:  &'a SimStore,
    run_id: String,
}

impl<'a> SqliteSink<'a> {
    pub fn new(store: &'a SimStore, run_id: impl Into<String>) -> Self {
        Self { store, run_id: run_id.into() }
    }
}

impl TelemetrySink for SqliteSink<'_> {
    fn on_day_complete(&mut self, day: Day, events: &[TelemetryEvent]) -> SimResult<()> {
        self.store
            .append_events(&self.run_id, events)
            .map_err(|e| SimError::Sink(format!("day {day}: {e:#}")))?;
        log::debug!("day={day} persisted events={}", events.len());
        Ok(())
    }
}
