use crate::{
    error::{SimError, SimResult},
    types::{Day, DAY_MS},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ── Emotion model ──────────────────────────────────────────────────

/// Update and decay parameters shared by every emotional tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerConfig {
    /// Weight of a new observation in the exponential update.
    pub alpha: f64,
    /// Fraction of the distance to `baseline` closed per simulated day.
    pub decay_rate: f64,
    pub baseline: f64,
}

impl TrackerConfig {
    pub fn new(alpha: f64, decay_rate: f64, baseline: f64) -> Self {
        Self { alpha, decay_rate, baseline }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmotionConfig {
    pub frustration: TrackerConfig,
    pub delight: TrackerConfig,
    pub confidence: TrackerConfig,
    pub confusion: TrackerConfig,
    /// Extra frustration weight applied per unit of impatience.
    pub impatience_gain: f64,
    /// Extra delight weight when an action hits a persona delight trigger.
    pub trigger_gain: f64,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            frustration: TrackerConfig::new(0.30, 0.20, 0.0),
            delight: TrackerConfig::new(0.30, 0.10, 0.0),
            confidence: TrackerConfig::new(0.20, 0.05, 0.5),
            confusion: TrackerConfig::new(0.25, 0.15, 0.1),
            impatience_gain: 0.5,
            trigger_gain: 0.5,
        }
    }
}

// ── Decision weighting ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecisionPolicy {
    /// Multiplier on risky actions for a persona with zero risk tolerance.
    pub risky_floor: f64,
    /// How strongly remembered frustration with an action lowers its weight.
    pub patience_weight: f64,
    /// Frustration above which a history entry counts against its action kind.
    pub frustration_threshold: f64,
    /// Exponential suppression per frustrating history entry.
    pub frustration_penalty_rate: f64,
    /// Multiplier for actions matching a referral trigger keyword.
    pub referral_boost: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            risky_floor: 0.2,
            patience_weight: 1.0,
            frustration_threshold: 0.6,
            frustration_penalty_rate: 0.5,
            referral_boost: 2.0,
        }
    }
}

// ── Lifecycle ──────────────────────────────────────────────────────

/// Transition thresholds for the lifecycle state machine.
///
/// The abandonment threshold is product policy, not an invariant,
/// so it lives here instead of in the state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LifecyclePolicy {
    pub engaged_min_actions: u64,
    pub engaged_delight_floor: f64,
    pub at_risk_frustration: f64,
    pub at_risk_consecutive: u32,
    pub retention_deadline_days: Day,
    pub abandonment_frustration: f64,
    /// Consecutive outcomes above `abandonment_frustration` that churn a
    /// persona from any stage. 0 leaves only the critical-failure rule.
    pub abandonment_consecutive: u32,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            engaged_min_actions: 5,
            engaged_delight_floor: 0.3,
            at_risk_frustration: 0.7,
            at_risk_consecutive: 3,
            retention_deadline_days: 7,
            abandonment_frustration: 0.8,
            abandonment_consecutive: 10,
        }
    }
}

// ── Run configuration ──────────────────────────────────────────────

/// Largest accepted `history_window`.
pub const MAX_HISTORY_WINDOW: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    pub days: Day,
    /// Personas visited per batch. Throughput only; never changes output.
    pub batch_size: usize,
    pub max_actions_per_day: u32,
    pub day_duration_ms: u64,
    pub run_start: DateTime<Utc>,
    /// Explicit simulation id. Derived from the seed when absent.
    pub simulation_id: Option<String>,
    /// Recent actions remembered per persona.
    pub history_window: usize,
    pub emotion: EmotionConfig,
    pub decision: DecisionPolicy,
    pub lifecycle: LifecyclePolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            days: 30,
            batch_size: 64,
            max_actions_per_day: 5,
            day_duration_ms: DAY_MS,
            run_start: default_run_start(),
            simulation_id: None,
            history_window: 10,
            emotion: EmotionConfig::default(),
            decision: DecisionPolicy::default(),
            lifecycle: LifecyclePolicy::default(),
        }
    }
}

fn default_run_start() -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200, 0) // 2024-01-01T00:00:00Z
        .single()
        .unwrap_or_default()
}

impl SimConfig {
    /// Load from a JSON file. Missing sections take their defaults.
    /// In tests, use SimConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SimConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        Self {
            seed: 42,
            days: 3,
            batch_size: 8,
            max_actions_per_day: 1,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_days(mut self, days: Day) -> Self {
        self.days = days;
        self
    }

    pub fn with_max_actions_per_day(mut self, n: u32) -> Self {
        self.max_actions_per_day = n;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    /// Width of one intra-day action slot in milliseconds.
    pub fn slot_ms(&self) -> u64 {
        self.day_duration_ms / u64::from(self.max_actions_per_day.max(1))
    }

    /// `run_start + days * day_duration_ms`, or None when unrepresentable.
    pub fn run_end(&self) -> Option<DateTime<Utc>> {
        let ms = self.days.checked_mul(self.day_duration_ms)?;
        let span = Duration::try_milliseconds(i64::try_from(ms).ok()?)?;
        self.run_start.checked_add_signed(span)
    }

    pub fn validate(&self) -> SimResult<()> {
        let invalid = |reason: String| Err(SimError::InvalidConfig { reason });

        if self.max_actions_per_day == 0 {
            return invalid("max_actions_per_day must be > 0".into());
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be > 0".into());
        }
        if self.history_window == 0 || self.history_window > MAX_HISTORY_WINDOW {
            return invalid(format!(
                "history_window={} must be in 1..={MAX_HISTORY_WINDOW}",
                self.history_window
            ));
        }
        if self.day_duration_ms < u64::from(self.max_actions_per_day) {
            return invalid(format!(
                "day_duration_ms ({}) must cover max_actions_per_day ({}) slots",
                self.day_duration_ms, self.max_actions_per_day
            ));
        }
        if self.run_end().is_none() {
            return invalid(format!(
                "{} days of {} ms past {} overflow the calendar",
                self.days, self.day_duration_ms, self.run_start
            ));
        }

        let trackers = [
            ("frustration", &self.emotion.frustration),
            ("delight", &self.emotion.delight),
            ("confidence", &self.emotion.confidence),
            ("confusion", &self.emotion.confusion),
        ];
        for (name, t) in trackers {
            if !(t.alpha > 0.0 && t.alpha <= 1.0) {
                return invalid(format!("{name}.alpha={} must be in (0, 1]", t.alpha));
            }
            if !(0.0..=1.0).contains(&t.decay_rate) {
                return invalid(format!("{name}.decay_rate={} must be in [0, 1]", t.decay_rate));
            }
            if !(0.0..=1.0).contains(&t.baseline) {
                return invalid(format!("{name}.baseline={} must be in [0, 1]", t.baseline));
            }
        }
        Ok(())
    }
}
