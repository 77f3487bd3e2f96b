//! personasim-core: deterministic persona behavior simulation.
//!
//! A run walks a population of personas through a product, one simulated
//! day at a time, and records what they did and how it made them feel.

pub mod adapter;
pub mod config;
pub mod decision;
pub mod emotion;
pub mod engine;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod persona;
pub mod processor;
pub mod rng;
pub mod sim_loop;
pub mod summary;
pub mod types;

pub use adapter::{Action, ActionTag, AppliedAction, ProductAdapter};
pub use config::SimConfig;
pub use engine::{CancelToken, NullSink, SimEngine, TelemetrySink};
pub use error::{SimError, SimResult};
pub use event::{EventType, TelemetryEvent};
pub use lifecycle::LifecycleStage;
pub use persona::PersonaProfile;
pub use summary::SimulationState;
