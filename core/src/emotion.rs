//! Emotional state trackers.
//!
//! Every tracker runs the same exponential update,
//! `new = old * (1 - alpha) + observation * alpha`, and decays toward
//! its baseline once per simulated day. Frustration and delight differ
//! only in how context sharpens the observation; confidence and
//! confusion are derived from the other two plus the success flag.

use crate::{
    config::{EmotionConfig, TrackerConfig},
    persona::EmotionalState,
};
use serde::{Deserialize, Serialize};

/// Per-component observations in [0, 1]. `None` leaves a component as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionalDelta {
    #[serde(default)]
    pub frustration: Option<f64>,
    #[serde(default)]
    pub confidence:  Option<f64>,
    #[serde(default)]
    pub delight:     Option<f64>,
    #[serde(default)]
    pub confusion:   Option<f64>,
}

impl EmotionalDelta {
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    /// Components present in `other` win over ours.
    pub fn overlay(self, other: &EmotionalDelta) -> Self {
        Self {
            frustration: other.frustration.or(self.frustration),
            confidence:  other.confidence.or(self.confidence),
            delight:     other.delight.or(self.delight),
            confusion:   other.confusion.or(self.confusion),
        }
    }
}

/// Facts about the current action that modulate an observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerContext {
    pub success: bool,
    /// Persona patience in [0, 1].
    pub patience: f64,
    /// The action hit one of the persona's delight triggers.
    pub delight_trigger: bool,
}

pub trait EmotionTracker {
    fn config(&self) -> &TrackerConfig;

    /// Context-adjusted observation. Identity by default.
    fn signal(&self, delta: f64, _ctx: &TrackerContext) -> f64 {
        delta
    }

    fn apply(&self, current: f64, delta: f64, ctx: &TrackerContext) -> f64 {
        let alpha = self.config().alpha;
        let observed = self.signal(delta, ctx).clamp(0.0, 1.0);
        (current * (1.0 - alpha) + observed * alpha).clamp(0.0, 1.0)
    }

    fn decay(&self, current: f64, days: u64) -> f64 {
        let cfg = self.config();
        let exponent = i32::try_from(days).unwrap_or(i32::MAX);
        let keep = (1.0 - cfg.decay_rate).powi(exponent);
        (cfg.baseline + (current - cfg.baseline) * keep).clamp(0.0, 1.0)
    }
}

/// Impatient personas feel failures harder.
pub struct FrustrationTracker {
    config: TrackerConfig,
    impatience_gain: f64,
}

impl FrustrationTracker {
    pub fn new(config: TrackerConfig, impatience_gain: f64) -> Self {
        Self { config, impatience_gain }
    }
}

impl EmotionTracker for FrustrationTracker {
    fn config(&self) -> &TrackerConfig { &self.config }

    fn signal(&self, delta: f64, ctx: &TrackerContext) -> f64 {
        delta * (1.0 + (1.0 - ctx.patience) * self.impatience_gain)
    }
}

/// Trigger hits land harder than ordinary successes.
pub struct DelightTracker {
    config: TrackerConfig,
    trigger_gain: f64,
}

impl DelightTracker {
    pub fn new(config: TrackerConfig, trigger_gain: f64) -> Self {
        Self { config, trigger_gain }
    }
}

impl EmotionTracker for DelightTracker {
    fn config(&self) -> &TrackerConfig { &self.config }

    fn signal(&self, delta: f64, ctx: &TrackerContext) -> f64 {
        if ctx.delight_trigger && ctx.success {
            delta * (1.0 + self.trigger_gain)
        } else {
            delta
        }
    }
}

/// Plain tracker used for the derived confidence and confusion metrics.
pub struct ResidualTracker {
    config: TrackerConfig,
}

impl ResidualTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config }
    }
}

impl EmotionTracker for ResidualTracker {
    fn config(&self) -> &TrackerConfig { &self.config }
}

/// The four trackers wired together.
pub struct EmotionModel {
    frustration: FrustrationTracker,
    delight:     DelightTracker,
    confidence:  ResidualTracker,
    confusion:   ResidualTracker,
}

impl EmotionModel {
    pub fn new(config: &EmotionConfig) -> Self {
        Self {
            frustration: FrustrationTracker::new(config.frustration.clone(), config.impatience_gain),
            delight:     DelightTracker::new(config.delight.clone(), config.trigger_gain),
            confidence:  ResidualTracker::new(config.confidence.clone()),
            confusion:   ResidualTracker::new(config.confusion.clone()),
        }
    }

    /// Fold one action outcome into `state`.
    pub fn update(&self, state: &mut EmotionalState, delta: &EmotionalDelta, ctx: &TrackerContext) {
        if let Some(f) = delta.frustration {
            state.frustration = self.frustration.apply(state.frustration, f, ctx);
        }
        if let Some(d) = delta.delight {
            state.delight = self.delight.apply(state.delight, d, ctx);
        }

        // A neutral delta is a no-op across the board.
        if delta.is_neutral() {
            return;
        }

        let f = state.frustration;
        let d = state.delight;
        let confidence_signal = delta.confidence.unwrap_or(if ctx.success {
            0.6 + 0.4 * d - 0.3 * f
        } else {
            0.3 * (1.0 - f)
        });
        let confusion_signal = delta.confusion.unwrap_or(if ctx.success {
            0.5 * f * (1.0 - d)
        } else {
            0.4 + 0.6 * f * (1.0 - d)
        });

        state.confidence = self.confidence.apply(state.confidence, confidence_signal, ctx);
        state.confusion = self.confusion.apply(state.confusion, confusion_signal, ctx);
        *state = state.clamped();
    }

    /// Forgetting across `days` day boundaries.
    pub fn decay(&self, state: &mut EmotionalState, days: u64) {
        state.frustration = self.frustration.decay(state.frustration, days);
        state.delight = self.delight.decay(state.delight, days);
        state.confidence = self.confidence.decay(state.confidence, days);
        state.confusion = self.confusion.decay(state.confusion, days);
    }
}
