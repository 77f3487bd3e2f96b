//! Shared primitive types used across the entire simulation.

/// A simulated day index. Day 0 is the first day of a run.
pub type Day = u64;

/// Stable position of a persona in the caller-supplied persona slice.
/// Runtime state, RNG streams and summaries are all keyed by it.
pub type PersonaIndex = usize;

/// The canonical simulation identifier (a UUID string).
pub type SimulationId = String;

/// Milliseconds in one simulated day.
pub const DAY_MS: u64 = 86_400_000;
